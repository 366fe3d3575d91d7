//! Command runs against real SQLite files and a stub feed.

use super::helpers::{Workspace, output_json, seed_database};
use super::*;
use crate::query::{QueryConfig, run_query_with};
use crate::state::run_state_with;
use crate::sync::{SyncCommandConfig, SyncArgs, run_sync_with};
use roadnet_core::{BoundingBox, ViewportConfig};
use roadnet_data::FeedError;
use roadnet_data::feed::test_support::{StubSegmentFeed, record_run};
use rstest::{fixture, rstest};
use std::sync::Arc;

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

fn sync_config(workspace: &Workspace) -> SyncCommandConfig {
    SyncCommandConfig {
        database: workspace.database(),
        ..SyncCommandConfig::try_from(SyncArgs::default()).expect("default config")
    }
}

fn unit_square_query(workspace: &Workspace, viewport: ViewportConfig) -> QueryConfig {
    QueryConfig {
        database: workspace.database(),
        bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid bbox"),
        viewport,
    }
}

#[rstest]
fn sync_creates_the_database_and_prints_the_status(workspace: Workspace) {
    let feed = Arc::new(StubSegmentFeed::with_records(record_run(9, 3)));
    let mut output = Vec::new();
    run_sync_with(&sync_config(&workspace), feed, &mut output).expect("sync should succeed");

    let status = output_json(&output);
    assert_eq!(status["phase"], "completed");
    assert_eq!(status["batchCount"], 1);
    assert_eq!(status["isRunning"], false);
    assert_eq!(status["isComplete"], true);
    assert_eq!(status["current"]["sequenceId"], 9);
    assert_eq!(status["current"]["segmentNumber"], 3);
    assert!(workspace.database().is_file());
}

#[rstest]
fn failed_sync_prints_status_and_errors(workspace: Workspace) {
    let feed = StubSegmentFeed::with_records(record_run(9, 3));
    feed.fail_on_call(
        0,
        FeedError::Http {
            url: "https://example.test/stream".to_owned(),
            status: 503,
            message: "service unavailable".to_owned(),
        },
    );
    let mut output = Vec::new();
    let err = run_sync_with(&sync_config(&workspace), Arc::new(feed), &mut output)
        .expect_err("failed run should error");

    match err {
        CliError::SyncFailed { message } => assert!(message.contains("503"), "{message}"),
        other => panic!("expected SyncFailed, found {other:?}"),
    }
    assert_eq!(output_json(&output)["phase"], "failed");
}

#[rstest]
fn state_lists_committed_cursors(workspace: Workspace) {
    seed_database(&workspace.database(), 4);
    let mut output = Vec::new();
    run_state_with(&workspace.database(), &mut output).expect("state should print");

    let cursors = output_json(&output);
    let rows = cursors.as_array().expect("cursor list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["tableName"], roadnet_data::DEFAULT_TABLE_NAME);
    assert_eq!(rows[0]["position"]["segmentNumber"], 4);
}

#[rstest]
fn query_prints_full_features(workspace: Workspace) {
    seed_database(&workspace.database(), 3);
    let mut output = Vec::new();
    run_query_with(
        &unit_square_query(&workspace, ViewportConfig::default()),
        &mut output,
    )
    .expect("query should succeed");

    let collection = output_json(&output);
    assert_eq!(collection["type"], "FeatureCollection");
    let features = collection["features"].as_array().expect("features");
    assert_eq!(features.len(), 3);
    assert_eq!(features[0]["properties"]["sequenceId"], 9);
}

#[rstest]
fn query_simplifies_dense_viewports(workspace: Workspace) {
    seed_database(&workspace.database(), 3);
    let viewport = ViewportConfig::new(2, 10).expect("valid thresholds");
    let mut output = Vec::new();
    run_query_with(&unit_square_query(&workspace, viewport), &mut output)
        .expect("query should succeed");

    let collection = output_json(&output);
    let features = collection["features"].as_array().expect("features");
    assert_eq!(features.len(), 3);
    assert!(
        features
            .iter()
            .all(|feature| feature["properties"]["isPoint"] == true)
    );
}

#[rstest]
fn query_before_sync_reports_missing_database(workspace: Workspace) {
    let mut output = Vec::new();
    let err = run_query_with(
        &unit_square_query(&workspace, ViewportConfig::default()),
        &mut output,
    )
    .expect_err("missing database");
    assert!(matches!(err, CliError::MissingDatabase { .. }));
    assert!(output.is_empty());
}

#[rstest]
fn state_rejects_a_directory(workspace: Workspace) {
    let err = run_state_with(workspace.root(), &mut Vec::new()).expect_err("directory");
    assert!(matches!(err, CliError::DatabaseNotFile { .. }));
}
