//! Query compositions against the demo fixture.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use shardwalk::cli::{build_workload, load_fixture, read_fixture, run_bench};
use shardwalk::config::{AppConfig, AppGraph, Backend};
use shardwalk::ops::{Operation, OperationOutput};
use std::path::Path;
use std::sync::Arc;

const DEMO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/social.json");

fn demo_graph() -> AppGraph {
    let mut config = AppConfig::default();
    config.store.backend = Backend::Memory;
    config.store.shards = 4;
    let graph = config.open_graph().unwrap();
    let fixture = read_fixture(Path::new(DEMO)).unwrap();
    load_fixture(&graph, &fixture).unwrap();
    graph
}

fn run(graph: &AppGraph, operation: Operation) -> OperationOutput {
    operation.execute(graph).unwrap()
}

// =============================================================================
// FRIENDS
// =============================================================================

#[test]
fn test_friends_ranked_by_distance() {
    let graph = demo_graph();
    let OperationOutput::Friends(rows) = run(
        &graph,
        Operation::Friends {
            person: 1,
            first_name: "Carmen".to_string(),
            limit: 20,
        },
    ) else {
        panic!("wrong output kind");
    };

    let ids: Vec<(u64, u32)> = rows.iter().map(|r| (r.id, r.distance)).collect();
    assert_eq!(ids, vec![(2, 1), (4, 2), (6, 3)]);

    let carmen = &rows[0];
    assert_eq!(carmen.last_name, "Alvarez");
    assert_eq!(carmen.city.as_deref(), Some("Lisbon"));
    assert_eq!(carmen.universities.len(), 1);
    assert_eq!(carmen.universities[0].name, "University of Lisbon");
    assert_eq!(carmen.universities[0].year, 2010);
    assert_eq!(carmen.universities[0].place, "Lisbon");
    assert_eq!(carmen.companies[0].name, "Acme Corp");
    assert_eq!(carmen.companies[0].place, "Berlin");
    assert_eq!(carmen.emails, vec!["carmen2@example.org".to_string()]);
}

#[test]
fn test_friends_limit_stops_early() {
    let graph = demo_graph();
    let OperationOutput::Friends(rows) = run(
        &graph,
        Operation::Friends {
            person: 1,
            first_name: "Carmen".to_string(),
            limit: 1,
        },
    ) else {
        panic!("wrong output kind");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 2);
}

#[test]
fn test_friends_unknown_person_is_empty() {
    let graph = demo_graph();
    let output = run(
        &graph,
        Operation::Friends {
            person: 999,
            first_name: "Carmen".to_string(),
            limit: 20,
        },
    );
    assert_eq!(output.row_count(), 0);
}

// =============================================================================
// RECENT MESSAGES
// =============================================================================

#[test]
fn test_recent_messages_newest_first() {
    let graph = demo_graph();
    let OperationOutput::RecentMessages(rows) = run(
        &graph,
        Operation::RecentMessages {
            person: 1,
            max_date: 2500,
            limit: 10,
        },
    ) else {
        panic!("wrong output kind");
    };

    let ids: Vec<u64> = rows.iter().map(|r| r.message_id).collect();
    assert_eq!(ids, vec![103, 101, 100]);
    assert_eq!(rows[0].first_name, "Bruno");
    // empty content falls back to the image file
    assert_eq!(rows[1].content, "photo.jpg");
    assert_eq!(rows[2].person_id, 2);
}

#[test]
fn test_recent_messages_include_comments() {
    let graph = demo_graph();
    let OperationOutput::RecentMessages(rows) = run(
        &graph,
        Operation::RecentMessages {
            person: 1,
            max_date: i64::MAX,
            limit: 1,
        },
    ) else {
        panic!("wrong output kind");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].message_id, 200);
    assert_eq!(rows[0].content, "nice");
}

// =============================================================================
// FORUM ACTIVITY / FRIEND TAGS
// =============================================================================

#[test]
fn test_forum_activity_filters_old_joins() {
    let graph = demo_graph();
    let OperationOutput::ForumActivity(rows) = run(
        &graph,
        Operation::ForumActivity {
            person: 1,
            min_date: 100,
            limit: 10,
        },
    ) else {
        panic!("wrong output kind");
    };

    let counts: Vec<(u64, usize)> = rows.iter().map(|r| (r.forum_id, r.post_count)).collect();
    assert_eq!(counts, vec![(301, 2), (300, 1)]);
    assert_eq!(rows[0].title, "Cooking");
}

#[test]
fn test_forum_activity_late_cutoff_drops_everything() {
    let graph = demo_graph();
    let output = run(
        &graph,
        Operation::ForumActivity {
            person: 1,
            min_date: 10_000,
            limit: 10,
        },
    );
    assert_eq!(output.row_count(), 0);
}

#[test]
fn test_friend_tags_count_distinct_friends() {
    let graph = demo_graph();
    let OperationOutput::FriendTags(rows) = run(
        &graph,
        Operation::FriendTags {
            person: 1,
            limit: 10,
        },
    ) else {
        panic!("wrong output kind");
    };

    let ranked: Vec<(&str, usize)> = rows
        .iter()
        .map(|r| (r.name.as_str(), r.friend_count))
        .collect();
    assert_eq!(ranked, vec![("rust", 3), ("food", 1), ("travel", 1)]);
}

// =============================================================================
// SHORTEST PATH / UPDATES
// =============================================================================

#[test]
fn test_shortest_path_lengths() {
    let graph = demo_graph();
    let path = |from, to| run(&graph, Operation::ShortestPath { from, to });

    assert_eq!(path(1, 1), OperationOutput::ShortestPath(Some(0)));
    assert_eq!(path(1, 2), OperationOutput::ShortestPath(Some(1)));
    assert_eq!(path(1, 7), OperationOutput::ShortestPath(Some(4)));
    assert_eq!(path(7, 1), OperationOutput::ShortestPath(Some(4)));
    assert_eq!(path(1, 8), OperationOutput::ShortestPath(None));
}

#[test]
fn test_add_friendship_connects_both_ways() {
    let graph = demo_graph();
    let output = run(
        &graph,
        Operation::AddFriendship {
            person1: 1,
            person2: 8,
            creation_date: 42,
        },
    );
    assert_eq!(output, OperationOutput::AddFriendship { edges: 2 });

    assert_eq!(
        run(&graph, Operation::ShortestPath { from: 1, to: 8 }),
        OperationOutput::ShortestPath(Some(1))
    );
    assert_eq!(
        run(&graph, Operation::ShortestPath { from: 8, to: 1 }),
        OperationOutput::ShortestPath(Some(1))
    );
}

#[test]
fn test_add_friendship_unknown_person_fails() {
    let graph = demo_graph();
    let err = Operation::AddFriendship {
        person1: 1,
        person2: 999,
        creation_date: 0,
    }
    .execute(&graph)
    .unwrap_err();
    assert!(matches!(err, shardwalk_core::GraphError::VertexNotFound(_)));
}

#[test]
fn test_output_serializes_with_operation_tag() {
    let graph = demo_graph();
    let output = run(&graph, Operation::ShortestPath { from: 1, to: 3 });
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["operation"], "shortest_path");
    assert_eq!(json["result"], 1);
}

// =============================================================================
// BENCH
// =============================================================================

#[test]
fn test_workload_is_deterministic_and_mixed() {
    let persons: Vec<(u64, String)> = (1..=4).map(|i| (i, format!("p{}", i))).collect();
    let a = build_workload(&persons, 20, 5);
    let b = build_workload(&persons, 20, 5);
    assert_eq!(a, b);
    assert_eq!(a.len(), 20);
    assert_eq!(a.iter().filter(|op| op.is_update()).count(), 4);

    let reads_only = build_workload(&persons, 20, 0);
    assert!(reads_only.iter().all(|op| !op.is_update()));
    assert!(build_workload(&[], 20, 5).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bench_completes_every_operation() {
    let graph = Arc::new(demo_graph());
    let persons: Vec<(u64, String)> = (1..=8).map(|i| (i, "Carmen".to_string())).collect();
    let workload = build_workload(&persons, 60, 6);

    let report = run_bench(Arc::clone(&graph), workload, 4).await.unwrap();
    assert_eq!(report.operations, 60);
    assert_eq!(report.completed, 60);
    assert_eq!(report.failed, 0);
    assert!(report.store.multi_get_calls > 0);
    assert_eq!(report.per_operation.values().sum::<usize>(), 60);
    assert!(report.aborted_attempts >= report.store.conflicts);
}

#[tokio::test]
async fn test_bench_counts_only_its_own_aborts() {
    let graph = Arc::new(demo_graph());
    let mut runs = 0;
    graph
        .with_retry(|_| {
            runs += 1;
            if runs == 1 {
                return Err(shardwalk_core::GraphError::TransactionAborted);
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(graph.aborted_attempts(), 1);

    let persons: Vec<(u64, String)> = (1..=8).map(|i| (i, "Carmen".to_string())).collect();
    let report = run_bench(Arc::clone(&graph), build_workload(&persons, 20, 0), 1)
        .await
        .unwrap();
    assert_eq!(report.completed, 20);
    assert_eq!(report.aborted_attempts, 0);
    assert_eq!(report.store.conflicts, 0);
}
