//! Test helpers for preparing replica databases on disk.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use roadnet_core::test_support::point_segment;
use roadnet_core::{CursorStore, SegmentKey, SegmentStore, SqliteSegmentStore};
use tempfile::TempDir;

/// Temporary directory holding the databases of one test.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("replica/roadnet.db")
    }
}

/// Write `count` points inside the unit square to `path` and commit a cursor.
pub(super) fn seed_database(path: &Utf8Path, count: i64) {
    roadnet_fs::prepare_database_dir(path).expect("create database directory");
    let store = SqliteSegmentStore::open(path.as_std_path()).expect("open store");
    let segments: Vec<_> = (1..=count)
        .map(|number| point_segment(9, number, 0.5, 0.5))
        .collect();
    store.upsert_batch(&segments).expect("seed segments");
    store
        .set_cursor(
            roadnet_data::DEFAULT_TABLE_NAME,
            SegmentKey::new(9, count),
            Utc::now(),
        )
        .expect("seed cursor");
}

/// Decode captured command output.
pub(super) fn output_json(buffer: &[u8]) -> serde_json::Value {
    serde_json::from_slice(buffer).expect("command output should be JSON")
}
