//! # shardwalk CLI Module
//!
//! This module implements the CLI interface for shardwalk.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `load` - Load a JSON fixture
//! - `status` - Show store status and effective configuration
//! - `traverse` - Expand one hop from a set of vertices
//! - `query` - Run a social-network query composition
//! - `bench` - Run a parallel workload and report store round trips

mod commands;

use crate::config::{AppConfig, Backend};
use crate::ops::Operation;
use clap::{Parser, Subcommand};
use shardwalk_core::GraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// shardwalk - batched multi-hop traversal over a sharded key-value graph
#[derive(Parser, Debug)]
#[command(name = "shardwalk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (persistent) or "memory" (volatile)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Path to a TOML config file (default: ./shardwalk.toml if present)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Load vertices and edges from a JSON fixture
    Load {
        /// Path to the fixture file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show store status
    Status,

    /// Expand one hop from a set of vertices
    Traverse {
        /// Start vertices as Label:id (repeatable)
        #[arg(short, long, required = true, num_args = 1..)]
        start: Vec<String>,

        /// Relationship name
        #[arg(short, long)]
        relationship: String,

        /// Edge direction (out, in)
        #[arg(short, long, default_value = "out")]
        direction: String,

        /// Keep only neighbors with these labels (repeatable)
        #[arg(short, long)]
        label: Vec<String>,

        /// Include edge properties
        #[arg(short, long)]
        edge_props: bool,

        /// Load this fixture first (needed for the memory backend)
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Run a query composition
    Query {
        /// Load this fixture first (needed for the memory backend)
        #[arg(long)]
        fixture: Option<PathBuf>,

        #[command(subcommand)]
        operation: Operation,
    },

    /// Run a parallel workload over a fixture
    Bench {
        /// Fixture providing the data and the person ids to query
        #[arg(short, long)]
        file: PathBuf,

        /// Worker threads
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Total operations
        #[arg(short, long, default_value = "1000")]
        operations: usize,

        /// One operation in this many is an add-friendship update (0 = reads only)
        #[arg(short, long, default_value = "10")]
        update_every: usize,

        /// Skip loading the fixture (redb database already populated)
        #[arg(long)]
        skip_load: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

impl Cli {
    /// Effective configuration: config file, then flag overrides.
    pub fn app_config(&self) -> Result<AppConfig, GraphError> {
        let backend = self
            .backend
            .as_deref()
            .map(str::parse::<Backend>)
            .transpose()?;
        let config = AppConfig::load(self.config.as_deref())?
            .with_overrides(self.database.clone(), backend);
        config.validate()?;
        Ok(config)
    }
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), GraphError> {
    let config = cli.app_config()?;
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(
            backend = %config.store.backend,
            path = %config.store.path.display(),
            "effective configuration"
        );
    }

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Load { file }) => cmd_load(&config, json_mode, &file),
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Traverse {
            start,
            relationship,
            direction,
            label,
            edge_props,
            fixture,
        }) => cmd_traverse(
            &config,
            json_mode,
            fixture.as_deref(),
            &start,
            &relationship,
            &direction,
            &label,
            edge_props,
        ),
        Some(Commands::Query { fixture, operation }) => {
            cmd_query(&config, json_mode, fixture.as_deref(), &operation)
        }
        Some(Commands::Bench {
            file,
            workers,
            operations,
            update_every,
            skip_load,
        }) => {
            cmd_bench(
                &config,
                json_mode,
                &file,
                workers,
                operations,
                update_every,
                skip_load,
            )
            .await
        }
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}
