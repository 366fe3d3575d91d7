//! Behavioural tests for `SqliteSegmentStore` using rstest-bdd.
#![cfg(feature = "store-sqlite")]

use std::{cell::RefCell, path::PathBuf};

use chrono::Utc;
use roadnet_core::{
    BoundingBox, CursorStore, LinkSegment, SegmentKey, SegmentStore, SqliteSegmentStore,
    SqliteSegmentStoreError,
    test_support::{line_segment, point_segment, retired},
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use rusqlite::Connection;
use tempfile::TempDir;

const TABLE: &str = "link_segments";

/// Shared state for SQLite store scenarios.
struct SegmentStoreWorld {
    temp_dir: TempDir,
    store: RefCell<Option<SqliteSegmentStore>>,
    open_error: RefCell<Option<SqliteSegmentStoreError>>,
    batch: RefCell<Vec<LinkSegment>>,
}

impl SegmentStoreWorld {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
            store: RefCell::new(None),
            open_error: RefCell::new(None),
            batch: RefCell::new(Vec::new()),
        }
    }

    fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("replica.db")
    }

    fn open(&self) {
        // Drop the previous handle first so its connection closes.
        self.store.replace(None);
        match SqliteSegmentStore::open(self.database_path()) {
            Ok(store) => {
                self.store.replace(Some(store));
                self.open_error.replace(None);
            }
            Err(err) => {
                self.open_error.replace(Some(err));
            }
        }
    }

    fn with_store<T>(&self, action: impl FnOnce(&SqliteSegmentStore) -> T) -> T {
        let borrowed = self.store.borrow();
        let store = borrowed
            .as_ref()
            .expect("store should be open for this step");
        action(store)
    }
}

#[fixture]
fn world() -> SegmentStoreWorld {
    SegmentStoreWorld::new()
}

fn batch_extent() -> BoundingBox {
    BoundingBox::new(-1.0, -1.0, 10.0, 10.0).expect("valid bbox")
}

#[given("a fresh SQLite segment store")]
fn given_fresh_store(world: &SegmentStoreWorld) {
    world.open();
}

#[given("a SQLite database written by a newer schema version")]
fn given_newer_schema(world: &SegmentStoreWorld) {
    let connection = Connection::open(world.database_path()).expect("create database");
    connection
        .execute_batch(
            "CREATE TABLE roadnet_schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT ''
            ) WITHOUT ROWID;
            INSERT INTO roadnet_schema_version (version) VALUES (99);",
        )
        .expect("seed schema version");
}

#[when("I upsert a batch of three segments")]
fn upsert_batch(world: &SegmentStoreWorld) {
    let batch = vec![
        line_segment(1, 1, [(0.0, 0.0), (2.0, 0.0)]),
        line_segment(1, 2, [(2.0, 0.0), (4.0, 3.0)]),
        point_segment(2, 1, 8.0, 8.0),
    ];
    world.with_store(|store| store.upsert_batch(&batch).expect("upsert batch"));
    world.batch.replace(batch);
}

#[when("I upsert the same batch again")]
fn upsert_again(world: &SegmentStoreWorld) {
    let batch = world.batch.borrow().clone();
    world.with_store(|store| store.upsert_batch(&batch).expect("replay batch"));
}

#[when("I upsert a superseded version of the first segment")]
fn upsert_superseded(world: &SegmentStoreWorld) {
    let first = world
        .batch
        .borrow()
        .first()
        .cloned()
        .expect("batch should be recorded");
    world.with_store(|store| {
        store
            .upsert_batch(&[retired(first)])
            .expect("upsert superseded row");
    });
}

#[when("I reopen the SQLite segment store")]
fn reopen(world: &SegmentStoreWorld) {
    world.open();
}

#[when("I record the cursor at sequence {sequence_id} and segment {segment_number}")]
fn record_cursor(world: &SegmentStoreWorld, sequence_id: i64, segment_number: i64) {
    world.with_store(|store| {
        store
            .set_cursor(
                TABLE,
                SegmentKey::new(sequence_id, segment_number),
                Utc::now(),
            )
            .expect("write cursor");
    });
}

#[then("the store holds {count} segments inside the batch extent")]
fn then_count(world: &SegmentStoreWorld, count: usize) {
    let found = world.with_store(|store| {
        store
            .count_intersecting(&batch_extent(), true)
            .expect("count segments")
    });
    assert_eq!(found, count);
}

#[then("the first segment is stored as superseded")]
fn then_superseded(world: &SegmentStoreWorld) {
    let rows = world.with_store(|store| {
        store
            .select_intersecting(&batch_extent(), false, false)
            .expect("select segments")
    });
    let first = rows
        .iter()
        .find(|row| row.key == SegmentKey::new(1, 1))
        .expect("first segment should still be stored");
    assert!(!first.is_active());
    assert_eq!(rows.len(), 3);
}

#[then("the stored cursor is at sequence {sequence_id} and segment {segment_number}")]
fn then_cursor(world: &SegmentStoreWorld, sequence_id: i64, segment_number: i64) {
    let position = world.with_store(|store| store.get_cursor(TABLE).expect("read cursor"));
    assert_eq!(position, SegmentKey::new(sequence_id, segment_number));
}

#[then("opening fails with a schema version mismatch")]
fn then_version_mismatch(world: &SegmentStoreWorld) {
    let error = world.open_error.borrow();
    assert!(matches!(
        error.as_ref(),
        Some(SqliteSegmentStoreError::VersionMismatch { found: 99, .. })
    ));
}

#[scenario(path = "tests/features/sqlite_segment_store.feature", index = 0)]
fn replay_is_idempotent(world: SegmentStoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_segment_store.feature", index = 1)]
fn newer_version_replaces_row(world: SegmentStoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_segment_store.feature", index = 2)]
fn reopen_restores_queries(world: SegmentStoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_segment_store.feature", index = 3)]
fn cursor_survives_reopen(world: SegmentStoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sqlite_segment_store.feature", index = 4)]
fn newer_schema_is_refused(world: SegmentStoreWorld) {
    let _ = world;
}
