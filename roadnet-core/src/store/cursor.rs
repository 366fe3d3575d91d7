//! Cursor rows for [`SqliteSegmentStore`](super::SqliteSegmentStore).

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::SegmentKey;

use super::sqlite::{SqliteSegmentStoreError, sqlite_error};
use super::{CursorState, CursorStore, SqliteSegmentStore, StoreError};

impl SqliteSegmentStore {
    fn read_cursor(&self, table_name: &str) -> Result<SegmentKey, SqliteSegmentStoreError> {
        let connection = self.lock_connection("read cursor")?;
        let position = connection
            .query_row(
                "SELECT last_sequence_id, last_segment_number
                 FROM sync_state WHERE table_name = ?1",
                [table_name],
                |row| Ok(SegmentKey::new(row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(sqlite_error("read cursor"))?;
        Ok(position.unwrap_or(SegmentKey::ORIGIN))
    }

    fn write_cursor(
        &self,
        table_name: &str,
        position: SegmentKey,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SqliteSegmentStoreError> {
        let connection = self.lock_connection("write cursor")?;
        connection
            .execute(
                "INSERT INTO sync_state (table_name, last_sequence_id, last_segment_number, last_sync)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (table_name) DO UPDATE SET
                     last_sequence_id = excluded.last_sequence_id,
                     last_segment_number = excluded.last_segment_number,
                     last_sync = excluded.last_sync",
                params![
                    table_name,
                    position.sequence_id,
                    position.segment_number,
                    timestamp
                ],
            )
            .map(|_| ())
            .map_err(sqlite_error("write cursor"))
    }

    fn read_all_cursors(&self) -> Result<Vec<CursorState>, SqliteSegmentStoreError> {
        let connection = self.lock_connection("list cursors")?;
        let mut statement = connection
            .prepare_cached(
                "SELECT table_name, last_sequence_id, last_segment_number, last_sync
                 FROM sync_state ORDER BY table_name",
            )
            .map_err(sqlite_error("prepare cursor listing"))?;
        let rows = statement
            .query_map([], |row| {
                Ok(CursorState {
                    table_name: row.get(0)?,
                    position: SegmentKey::new(row.get(1)?, row.get(2)?),
                    last_sync: row.get(3)?,
                })
            })
            .map_err(sqlite_error("list cursors"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(sqlite_error("read cursor row"))
    }
}

impl CursorStore for SqliteSegmentStore {
    fn get_cursor(&self, table_name: &str) -> Result<SegmentKey, StoreError> {
        self.read_cursor(table_name)
            .map_err(|err| StoreError::backend("read sync cursor", err))
    }

    fn set_cursor(
        &self,
        table_name: &str,
        position: SegmentKey,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.write_cursor(table_name, position, timestamp)
            .map_err(|err| StoreError::backend("write sync cursor", err))
    }

    fn list_cursors(&self) -> Result<Vec<CursorState>, StoreError> {
        self.read_all_cursors()
            .map_err(|err| StoreError::backend("list sync cursors", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn store() -> SqliteSegmentStore {
        SqliteSegmentStore::open_in_memory().expect("open in-memory store")
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().expect("valid timestamp")
    }

    #[rstest]
    fn missing_cursor_reads_as_origin(store: SqliteSegmentStore) {
        let position = store.get_cursor("link_segments").expect("read cursor");
        assert_eq!(position, SegmentKey::ORIGIN);
        assert!(store.list_cursors().expect("list").is_empty());
    }

    #[rstest]
    fn cursor_is_upserted_per_table(store: SqliteSegmentStore) {
        store
            .set_cursor("link_segments", SegmentKey::new(5, 1), at(10))
            .expect("first write");
        store
            .set_cursor("link_segments", SegmentKey::new(8, 2), at(20))
            .expect("second write");
        store
            .set_cursor("junctions", SegmentKey::new(1, 1), at(30))
            .expect("other table");

        let cursors = store.list_cursors().expect("list");
        assert_eq!(
            cursors,
            vec![
                CursorState {
                    table_name: "junctions".to_owned(),
                    position: SegmentKey::new(1, 1),
                    last_sync: at(30),
                },
                CursorState {
                    table_name: "link_segments".to_owned(),
                    position: SegmentKey::new(8, 2),
                    last_sync: at(20),
                },
            ]
        );
    }

    #[rstest]
    fn cursor_survives_reopen() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("replica.db");
        {
            let store = SqliteSegmentStore::open(&path).expect("open store");
            store
                .set_cursor("link_segments", SegmentKey::new(42, 7), at(0))
                .expect("write cursor");
        }
        let reopened = SqliteSegmentStore::open(&path).expect("reopen store");
        assert_eq!(
            reopened.get_cursor("link_segments").expect("read cursor"),
            SegmentKey::new(42, 7)
        );
    }
}
