//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::{AppConfig, AppGraph, Backend};
use crate::fixture::{Fixture, properties_to_json};
use crate::ops::{Operation, OperationOutput};
use crate::schema::{Entity, parse_vertex};
use serde::Serialize;
use shardwalk_core::{
    Direction, GraphError, IngestReport, Ingestor, KvStore, StoreStats, VertexRef,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum fixture file size (500 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_FIXTURE_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), GraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GraphError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(GraphError::InvalidRequest(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and "..") and checks that it
/// names an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        GraphError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GraphError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read and parse a fixture file.
pub fn read_fixture(path: &Path) -> Result<Fixture, GraphError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_FIXTURE_FILE_SIZE)?;

    let contents = std::fs::read(&validated)
        .map_err(|e| GraphError::Io(format!("Read fixture: {}", e)))?;
    Fixture::from_slice(&contents)
}

/// Load a fixture into an open graph.
pub fn load_fixture(graph: &AppGraph, fixture: &Fixture) -> Result<IngestReport, GraphError> {
    Ingestor::load(graph, &fixture.vertices, &fixture.edges)
}

/// Open the configured graph and, if given, load a fixture into it first.
fn open_with_fixture(config: &AppConfig, fixture: Option<&Path>) -> Result<AppGraph, GraphError> {
    let graph = config.open_graph()?;
    if let Some(path) = fixture {
        let fixture = read_fixture(path)?;
        load_fixture(&graph, &fixture)?;
        graph.store().reset();
    }
    Ok(graph)
}

fn vertex_name(vertex: &VertexRef) -> String {
    format!("{}:{}", vertex.label, vertex.local_id())
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), GraphError> {
    let db_path = &config.store.path;

    match config.store.backend {
        Backend::Redb => {
            if db_path.exists() {
                if !force {
                    return Err(GraphError::Configuration(
                        "Database already exists. Use --force to overwrite.".to_string(),
                    ));
                }
                if !db_path.is_file() {
                    return Err(GraphError::Io(format!(
                        "Path '{}' is not a regular file",
                        db_path.display()
                    )));
                }
                std::fs::remove_file(db_path)
                    .map_err(|e| GraphError::Io(format!("Remove old database: {}", e)))?;
            }
            let _graph = config.open_graph()?;
            println!("Initialized new redb database at {:?}", db_path);
        }
        Backend::Memory => {
            println!("Memory backend needs no initialization");
        }
    }

    Ok(())
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// Load a JSON fixture.
pub fn cmd_load(config: &AppConfig, json_mode: bool, file: &Path) -> Result<(), GraphError> {
    tracing::info!("Loading fixture {:?}", file);

    let fixture = read_fixture(file)?;
    let graph = config.open_graph()?;
    let report = load_fixture(&graph, &fixture)?;
    let stats = graph.store().stats();
    let keys = graph.store().key_count()?;

    if config.store.backend == Backend::Memory {
        tracing::warn!("memory backend: loaded data is discarded when the process exits");
    }

    if json_mode {
        print_json(&serde_json::json!({
            "file": file.to_string_lossy(),
            "report": report,
            "store": stats,
            "key_count": keys,
        }));
        return Ok(());
    }

    println!("Loaded {} vertices, {} edges", report.vertices, report.edges);
    println!("Transactions: {}", report.batches);
    println!("Conflicts:    {}", stats.conflicts);
    println!("Store keys:   {}", keys);

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), GraphError> {
    let graph = config.open_graph()?;
    let keys = graph.store().key_count()?;
    let version = graph.store().current_version()?;

    if json_mode {
        print_json(&serde_json::json!({
            "backend": config.store.backend.to_string(),
            "database": config.store.path.to_string_lossy(),
            "key_count": keys,
            "commit_version": version,
            "engine": config.engine,
        }));
        return Ok(());
    }

    println!("shardwalk Store Status");
    println!("======================");
    println!("Backend:  {}", config.store.backend);
    if config.store.backend == Backend::Redb {
        println!("Database: {:?}", config.store.path);
    } else {
        println!("Shards:   {}", config.store.shards);
    }
    println!();
    println!("Keys:           {}", keys);
    println!("Commit version: {}", version);
    println!("Max attempts:   {}", config.engine.max_tx_attempts);
    println!("Read mode:      {:?}", config.engine.read_mode());

    Ok(())
}

// =============================================================================
// TRAVERSE COMMAND
// =============================================================================

/// Expand one hop and print the neighbors of every source.
pub fn cmd_traverse(
    config: &AppConfig,
    json_mode: bool,
    fixture: Option<&Path>,
    start: &[String],
    relationship: &str,
    direction: &str,
    labels: &[String],
    edge_props: bool,
) -> Result<(), GraphError> {
    let sources = start
        .iter()
        .map(|s| parse_vertex(s))
        .collect::<Result<Vec<_>, _>>()?;
    let direction: Direction = direction.parse()?;
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();

    let graph = open_with_fixture(config, fixture)?;
    let result = graph.read_with_retry(|tx| {
        tx.traverse(&sources, relationship, direction, edge_props, &labels)
    })?;
    let stats = graph.store().stats();

    if json_mode {
        let rows: Vec<serde_json::Value> = result
            .sources()
            .map(|source| {
                let props = result.edge_properties(source).unwrap_or_default();
                let neighbors: Vec<serde_json::Value> = result
                    .neighbors(source)
                    .iter()
                    .enumerate()
                    .map(|(idx, neighbor)| {
                        let mut entry = serde_json::json!({ "vertex": vertex_name(neighbor) });
                        if let Some(p) = props.get(idx) {
                            entry["properties"] = properties_to_json(p);
                        }
                        entry
                    })
                    .collect();
                serde_json::json!({ "source": vertex_name(source), "neighbors": neighbors })
            })
            .collect();
        print_json(&serde_json::json!({
            "relationship": relationship,
            "results": rows,
            "distinct_neighbors": result.len(),
            "multi_get_calls": stats.multi_get_calls,
        }));
        return Ok(());
    }

    println!("Traverse {} ({:?})", relationship, direction);
    println!("==================");
    for source in result.sources() {
        let names: Vec<String> = result.neighbors(source).iter().map(vertex_name).collect();
        println!("{} -> {}", vertex_name(source), names.join(", "));
    }
    println!();
    println!("Distinct neighbors: {}", result.len());
    println!("Store requests:     {}", stats.multi_get_calls);

    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Run one query composition.
pub fn cmd_query(
    config: &AppConfig,
    json_mode: bool,
    fixture: Option<&Path>,
    operation: &Operation,
) -> Result<(), GraphError> {
    let graph = open_with_fixture(config, fixture)?;
    let started = Instant::now();
    let output = operation.execute(&graph)?;
    let elapsed_us = started.elapsed().as_micros();
    let stats = graph.store().stats();

    tracing::info!(
        operation = operation.name(),
        rows = output.row_count(),
        elapsed_us = elapsed_us as u64,
        "query complete"
    );

    if json_mode {
        let mut value = serde_json::to_value(&output)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        value["store"] = serde_json::to_value(stats)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    print_output(operation, &output);
    println!();
    println!("Store requests: {}", stats.multi_get_calls);
    println!("Elapsed:        {} us", elapsed_us);

    Ok(())
}

fn print_output(operation: &Operation, output: &OperationOutput) {
    println!("Query: {}", operation.name());
    println!("==================");
    let lines = output.lines();
    if lines.is_empty() {
        println!("(no results)");
    }
    for line in lines {
        println!("{}", line);
    }
}

// =============================================================================
// BENCH COMMAND
// =============================================================================

/// Outcome of a bench run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchReport {
    pub workers: usize,
    pub operations: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed_ms: u128,
    pub ops_per_sec: u128,
    pub per_operation: BTreeMap<&'static str, usize>,
    pub load: Option<IngestReport>,
    /// Transaction attempts abandoned and retried, whether the conflict
    /// surfaced during a read or at commit.
    pub aborted_attempts: u64,
    pub store: StoreStats,
}

#[derive(Debug, Default)]
struct WorkerTally {
    completed: usize,
    failed: usize,
    per_operation: BTreeMap<&'static str, usize>,
}

/// Build a deterministic operation mix over the persons of a fixture.
///
/// Each entry of `persons` is `(id, firstName)`. Every `update_every`-th
/// operation adds a friendship; `0` means reads only.
pub fn build_workload(
    persons: &[(u64, String)],
    operations: usize,
    update_every: usize,
) -> Vec<Operation> {
    if persons.is_empty() {
        return Vec::new();
    }

    (0..operations)
        .map(|i| {
            let (person, _) = &persons[i % persons.len()];
            let (other, name) = &persons[(i * 7 + 3) % persons.len()];

            if update_every > 0 && i % update_every == update_every - 1 && person != other {
                return Operation::AddFriendship {
                    person1: *person,
                    person2: *other,
                    creation_date: i as i64,
                };
            }

            match i % 5 {
                0 => Operation::Friends {
                    person: *person,
                    first_name: name.clone(),
                    limit: 20,
                },
                1 => Operation::RecentMessages {
                    person: *person,
                    max_date: i64::MAX,
                    limit: 20,
                },
                2 => Operation::ForumActivity {
                    person: *person,
                    min_date: 0,
                    limit: 20,
                },
                3 => Operation::FriendTags {
                    person: *person,
                    limit: 10,
                },
                _ => Operation::ShortestPath {
                    from: *person,
                    to: *other,
                },
            }
        })
        .collect()
}

fn persons_of(fixture: &Fixture) -> Vec<(u64, String)> {
    fixture
        .vertices
        .iter()
        .filter(|spec| spec.vertex.id.id_space == Entity::Person.id_space())
        .map(|spec| {
            let name = spec
                .properties
                .get("firstName")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            (spec.vertex.local_id(), name)
        })
        .collect()
}

/// Run a workload on tokio's blocking pool and report throughput and
/// store round trips.
pub async fn run_bench(
    graph: Arc<AppGraph>,
    workload: Vec<Operation>,
    workers: usize,
) -> Result<BenchReport, GraphError> {
    let workers = workers.max(1);
    let operations = workload.len();
    let chunk = operations.div_ceil(workers).max(1);

    graph.store().reset();
    graph.reset_aborted_attempts();
    let started = Instant::now();

    let mut handles = Vec::with_capacity(workers);
    for slice in workload.chunks(chunk) {
        let graph = Arc::clone(&graph);
        let slice = slice.to_vec();
        handles.push(tokio::task::spawn_blocking(move || {
            let mut tally = WorkerTally::default();
            for operation in &slice {
                match operation.execute(&*graph) {
                    Ok(_) => {
                        tally.completed += 1;
                        *tally.per_operation.entry(operation.name()).or_default() += 1;
                    }
                    Err(e) => {
                        tracing::warn!(operation = operation.name(), error = %e, "operation failed");
                        tally.failed += 1;
                    }
                }
            }
            tally
        }));
    }

    let mut report = BenchReport {
        workers,
        operations,
        ..BenchReport::default()
    };
    for handle in handles {
        let tally = handle
            .await
            .map_err(|e| GraphError::Io(format!("bench worker failed: {}", e)))?;
        report.completed += tally.completed;
        report.failed += tally.failed;
        for (name, count) in tally.per_operation {
            *report.per_operation.entry(name).or_default() += count;
        }
    }

    report.elapsed_ms = started.elapsed().as_millis();
    report.ops_per_sec = (report.completed as u128 * 1000) / report.elapsed_ms.max(1);
    report.aborted_attempts = graph.aborted_attempts();
    report.store = graph.store().stats();
    Ok(report)
}

/// Run the benchmark command.
pub async fn cmd_bench(
    config: &AppConfig,
    json_mode: bool,
    file: &Path,
    workers: usize,
    operations: usize,
    update_every: usize,
    skip_load: bool,
) -> Result<(), GraphError> {
    let fixture = read_fixture(file)?;
    let graph = Arc::new(config.open_graph()?);

    let load = if skip_load {
        None
    } else {
        Some(load_fixture(&graph, &fixture)?)
    };

    let workload = build_workload(&persons_of(&fixture), operations, update_every);
    if workload.is_empty() {
        return Err(GraphError::InvalidRequest(
            "fixture contains no Person vertices".to_string(),
        ));
    }

    let mut report = run_bench(graph, workload, workers).await?;
    report.load = load;

    if json_mode {
        let value = serde_json::to_value(&report)
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    println!("shardwalk Bench");
    println!("===============");
    println!("Workers:          {}", report.workers);
    println!("Operations:       {}", report.operations);
    println!("Completed:        {}", report.completed);
    println!("Failed:           {}", report.failed);
    println!("Elapsed:          {} ms", report.elapsed_ms);
    println!("Throughput:       {} ops/s", report.ops_per_sec);
    println!();
    for (name, count) in &report.per_operation {
        println!("  {:<18} {}", name, count);
    }
    println!();
    println!("Store requests:   {}", report.store.multi_get_calls);
    println!("Keys requested:   {}", report.store.keys_requested);
    println!("Commits:          {}", report.store.commits);
    println!("Commit conflicts: {}", report.store.conflicts);
    println!("Aborted attempts: {}", report.aborted_attempts);

    Ok(())
}
