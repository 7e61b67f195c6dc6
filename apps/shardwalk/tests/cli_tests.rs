//! Command-line parsing, configuration layering and command execution.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use shardwalk::cli::{Cli, Commands, cmd_init, cmd_load, cmd_query, execute, read_fixture};
use shardwalk::config::{AppConfig, Backend};
use shardwalk::ops::Operation;
use shardwalk_core::{GraphError, KvStore};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DEMO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/social.json");

fn redb_config(dir: &TempDir) -> AppConfig {
    AppConfig::default().with_overrides(Some(dir.path().join("graph.redb")), Some(Backend::Redb))
}

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn test_parse_global_flags() {
    let cli = Cli::try_parse_from([
        "shardwalk",
        "-q",
        "-B",
        "memory",
        "-D",
        "x.redb",
        "--json-mode",
        "status",
    ])
    .unwrap();
    assert!(cli.quiet);
    assert!(cli.json_mode);
    assert_eq!(cli.backend.as_deref(), Some("memory"));
    assert_eq!(cli.database, Some(PathBuf::from("x.redb")));
    assert!(matches!(cli.command, Some(Commands::Status)));
}

#[test]
fn test_parse_query_subcommand() {
    let cli = Cli::try_parse_from([
        "shardwalk",
        "query",
        "friends",
        "--person",
        "42",
        "--first-name",
        "Carmen",
    ])
    .unwrap();
    let Some(Commands::Query { fixture, operation }) = cli.command else {
        panic!("expected query");
    };
    assert_eq!(fixture, None);
    assert_eq!(
        operation,
        Operation::Friends {
            person: 42,
            first_name: "Carmen".to_string(),
            limit: 20,
        }
    );
}

#[test]
fn test_parse_traverse_repeated_flags() {
    let cli = Cli::try_parse_from([
        "shardwalk",
        "traverse",
        "-s",
        "Person:1",
        "Person:2",
        "-r",
        "hasCreator",
        "-d",
        "in",
        "-l",
        "Post",
        "-l",
        "Comment",
    ])
    .unwrap();
    let Some(Commands::Traverse { start, label, .. }) = cli.command else {
        panic!("expected traverse");
    };
    assert_eq!(start, vec!["Person:1", "Person:2"]);
    assert_eq!(label, vec!["Post", "Comment"]);
}

#[test]
fn test_parse_rejects_missing_required() {
    assert!(Cli::try_parse_from(["shardwalk", "query", "shortest-path", "--from", "1"]).is_err());
    assert!(Cli::try_parse_from(["shardwalk", "traverse", "-r", "knows"]).is_err());
}

#[test]
fn test_bad_backend_flag_is_configuration_error() {
    let cli = Cli::try_parse_from(["shardwalk", "-B", "tape", "status"]).unwrap();
    assert!(matches!(cli.app_config(), Err(GraphError::Configuration(_))));
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn test_config_file_then_flags() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shardwalk.toml");
    std::fs::write(
        &path,
        "[engine]\nmax_tx_attempts = 5\n\n[store]\nbackend = \"memory\"\nshards = 2\n",
    )
    .unwrap();

    let from_file = AppConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(from_file.engine.max_tx_attempts, 5);
    assert_eq!(from_file.store.backend, Backend::Memory);

    let cli = Cli::try_parse_from([
        "shardwalk",
        "-C",
        path.to_str().unwrap(),
        "-B",
        "redb",
        "status",
    ])
    .unwrap();
    let effective = cli.app_config().unwrap();
    assert_eq!(effective.store.backend, Backend::Redb);
    assert_eq!(effective.store.shards, 2);
    assert_eq!(effective.engine.max_tx_attempts, 5);
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        AppConfig::load(Some(missing.as_path())),
        Err(GraphError::Io(_))
    ));
}

// =============================================================================
// COMMANDS
// =============================================================================

#[test]
fn test_init_refuses_existing_without_force() {
    let dir = TempDir::new().unwrap();
    let config = redb_config(&dir);

    cmd_init(&config, false).unwrap();
    assert!(config.store.path.is_file());
    assert!(cmd_init(&config, false).is_err());
    cmd_init(&config, true).unwrap();
}

#[test]
fn test_load_persists_in_redb() {
    let dir = TempDir::new().unwrap();
    let config = redb_config(&dir);

    cmd_load(&config, true, Path::new(DEMO)).unwrap();

    {
        let graph = config.open_graph().unwrap();
        assert!(graph.store().key_count().unwrap() > 0);
    }

    // redb allows one open handle per file; the block above released it
    cmd_query(
        &config,
        true,
        None,
        &Operation::ShortestPath { from: 1, to: 7 },
    )
    .unwrap();
}

#[test]
fn test_force_init_clears_data() {
    let dir = TempDir::new().unwrap();
    let config = redb_config(&dir);

    cmd_load(&config, true, Path::new(DEMO)).unwrap();
    cmd_init(&config, true).unwrap();

    let graph = config.open_graph().unwrap();
    assert_eq!(graph.store().key_count().unwrap(), 0);
}

#[test]
fn test_read_fixture_rejects_directory() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(read_fixture(dir.path()), Err(GraphError::Io(_))));
}

#[tokio::test]
async fn test_execute_memory_query_with_fixture() {
    let cli = Cli::try_parse_from([
        "shardwalk",
        "-q",
        "-B",
        "memory",
        "--json-mode",
        "query",
        "--fixture",
        DEMO,
        "friend-tags",
        "-p",
        "1",
    ])
    .unwrap();
    execute(cli).await.unwrap();
}

#[tokio::test]
async fn test_execute_bench_on_memory_backend() {
    let cli = Cli::try_parse_from([
        "shardwalk",
        "-q",
        "-B",
        "memory",
        "--json-mode",
        "bench",
        "-f",
        DEMO,
        "-w",
        "2",
        "-o",
        "40",
    ])
    .unwrap();
    execute(cli).await.unwrap();
}
