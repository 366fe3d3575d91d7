//! SQLite-backed segment store with an in-memory R\*-tree read model.
//!
//! Rows are the source of truth. The R\*-tree is rebuilt from them on open and
//! updated after each committed batch, so viewport reads never touch SQLite.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::NaiveDate;
use geo::Geometry;
use rusqlite::{Connection, Row, params};
use thiserror::Error;

use crate::{BoundingBox, LinkSegment, LinkSegmentError, LinkSegmentParts, SegmentKey};

use super::schema::{ensure_segment_table, initialise_schema, segment_table_exists};
use super::spatial_index::SegmentIndex;
use super::{SegmentStore, StoreError, project_rows};

const UPSERT_SEGMENT_SQL: &str = "INSERT INTO link_segments (
        sequence_id, segment_number, start_position, end_position,
        start_date, end_date, geometry, municipality, length
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT (sequence_id, segment_number) DO UPDATE SET
        start_position = excluded.start_position,
        end_position = excluded.end_position,
        start_date = excluded.start_date,
        end_date = excluded.end_date,
        geometry = excluded.geometry,
        municipality = excluded.municipality,
        length = excluded.length";

const SELECT_SEGMENTS_SQL: &str = "SELECT
        sequence_id, segment_number, start_position, end_position,
        start_date, end_date, geometry, municipality, length
    FROM link_segments";

/// Errors raised by [`SqliteSegmentStore`].
#[derive(Debug, Error)]
pub enum SqliteSegmentStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    Open {
        /// Location of the database.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A schema statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Schema step that failed.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database was written by a different schema version.
    #[error("expected schema version {expected} but found {found}")]
    VersionMismatch {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
    /// A query or write failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// What the store was doing.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A geometry could not be serialised for storage.
    #[error("failed to encode geometry for segment {key}")]
    EncodeGeometry {
        /// Segment being written.
        key: SegmentKey,
        /// Encoding failure.
        #[source]
        source: bincode::Error,
    },
    /// A stored geometry blob could not be decoded.
    #[error("failed to decode geometry for segment {key}")]
    DecodeGeometry {
        /// Segment being read.
        key: SegmentKey,
        /// Decoding failure.
        #[source]
        source: bincode::Error,
    },
    /// A stored row no longer passes segment validation.
    #[error(transparent)]
    InvalidSegment(#[from] LinkSegmentError),
    /// A lock was poisoned by a panicking thread.
    #[error("store lock poisoned while attempting to {operation}")]
    Poisoned {
        /// What the store was doing.
        operation: &'static str,
    },
}

pub(super) fn sqlite_error(
    operation: &'static str,
) -> impl FnOnce(rusqlite::Error) -> SqliteSegmentStoreError {
    move |source| SqliteSegmentStoreError::Sqlite { operation, source }
}

/// Read-write segment store persisted in a single SQLite file.
///
/// Writes are serialised through one connection. Reads are answered from the
/// in-memory index under a read lock, so viewport queries may run while a
/// batch is being written; they observe the index as of the last commit.
pub struct SqliteSegmentStore {
    connection: Mutex<Connection>,
    index: RwLock<SegmentIndex>,
}

impl fmt::Debug for SqliteSegmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .index
            .read()
            .map_or_else(|poisoned| poisoned.into_inner().len(), |index| index.len());
        f.debug_struct("SqliteSegmentStore")
            .field("entries", &entries)
            .finish_non_exhaustive()
    }
}

impl SqliteSegmentStore {
    /// Open or create a store at `path` and rebuild its spatial index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteSegmentStoreError> {
        let path = path.as_ref();
        let connection =
            Connection::open(path).map_err(|source| SqliteSegmentStoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self, SqliteSegmentStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteSegmentStoreError::Open {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::from_connection(connection)
    }

    fn from_connection(mut connection: Connection) -> Result<Self, SqliteSegmentStoreError> {
        initialise_schema(&mut connection)?;
        let rows = load_segments(&connection)?;
        log::debug!("rebuilt spatial index from {} stored segments", rows.len());
        Ok(Self {
            connection: Mutex::new(connection),
            index: RwLock::new(SegmentIndex::from_segments(rows)),
        })
    }

    pub(super) fn lock_connection(
        &self,
        operation: &'static str,
    ) -> Result<MutexGuard<'_, Connection>, SqliteSegmentStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteSegmentStoreError::Poisoned { operation })
    }

    fn read_index(
        &self,
        operation: &'static str,
    ) -> Result<RwLockReadGuard<'_, SegmentIndex>, SqliteSegmentStoreError> {
        self.index
            .read()
            .map_err(|_| SqliteSegmentStoreError::Poisoned { operation })
    }

    fn write_index(
        &self,
        operation: &'static str,
    ) -> Result<RwLockWriteGuard<'_, SegmentIndex>, SqliteSegmentStoreError> {
        self.index
            .write()
            .map_err(|_| SqliteSegmentStoreError::Poisoned { operation })
    }

    fn write_rows(&self, rows: &[LinkSegment]) -> Result<(), SqliteSegmentStoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let encoded = rows
            .iter()
            .map(|segment| {
                bincode::serialize(&segment.geometry)
                    .map(|blob| (segment, blob))
                    .map_err(|source| SqliteSegmentStoreError::EncodeGeometry {
                        key: segment.key,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut connection = self.lock_connection("upsert segments")?;
        let transaction = connection
            .transaction()
            .map_err(sqlite_error("begin upsert transaction"))?;
        ensure_segment_table(&transaction)?;
        {
            let mut statement = transaction
                .prepare_cached(UPSERT_SEGMENT_SQL)
                .map_err(sqlite_error("prepare segment upsert"))?;
            for (segment, blob) in &encoded {
                statement
                    .execute(params![
                        segment.key.sequence_id,
                        segment.key.segment_number,
                        segment.start_position,
                        segment.end_position,
                        segment.start_date,
                        segment.end_date,
                        blob,
                        segment.municipality,
                        segment.length,
                    ])
                    .map_err(sqlite_error("upsert segment"))?;
            }
        }
        transaction
            .commit()
            .map_err(sqlite_error("commit upsert transaction"))?;

        // Still holding the connection: the index follows commits in order.
        let mut index = self.write_index("update spatial index")?;
        for segment in rows {
            index.upsert(segment.clone());
        }
        Ok(())
    }
}

fn load_segments(connection: &Connection) -> Result<Vec<LinkSegment>, SqliteSegmentStoreError> {
    if !segment_table_exists(connection)? {
        return Ok(Vec::new());
    }
    let mut statement = connection
        .prepare(SELECT_SEGMENTS_SQL)
        .map_err(sqlite_error("prepare segment scan"))?;
    let mut rows = statement
        .query([])
        .map_err(sqlite_error("scan segments"))?;
    let mut segments = Vec::new();
    while let Some(row) = rows.next().map_err(sqlite_error("scan segments"))? {
        segments.push(decode_row(row)?);
    }
    Ok(segments)
}

fn decode_row(row: &Row<'_>) -> Result<LinkSegment, SqliteSegmentStoreError> {
    let read = |source| SqliteSegmentStoreError::Sqlite {
        operation: "read segment row",
        source,
    };
    let key = SegmentKey::new(row.get(0).map_err(read)?, row.get(1).map_err(read)?);
    let blob: Vec<u8> = row.get(6).map_err(read)?;
    let geometry: Geometry<f64> = bincode::deserialize(&blob)
        .map_err(|source| SqliteSegmentStoreError::DecodeGeometry { key, source })?;
    let segment = LinkSegment::new(LinkSegmentParts {
        key,
        start_position: row.get(2).map_err(read)?,
        end_position: row.get(3).map_err(read)?,
        start_date: row.get::<_, NaiveDate>(4).map_err(read)?,
        end_date: row.get::<_, Option<NaiveDate>>(5).map_err(read)?,
        geometry,
        municipality: row.get(7).map_err(read)?,
        length: row.get(8).map_err(read)?,
    })?;
    Ok(segment)
}

impl SegmentStore for SqliteSegmentStore {
    fn upsert_batch(&self, rows: &[LinkSegment]) -> Result<(), StoreError> {
        self.write_rows(rows)
            .map_err(|err| StoreError::backend("upsert segment batch", err))
    }

    fn count_intersecting(
        &self,
        bbox: &BoundingBox,
        active_only: bool,
    ) -> Result<usize, StoreError> {
        let index = self
            .read_index("count segments")
            .map_err(|err| StoreError::backend("count segments", err))?;
        Ok(index.count_intersecting(bbox, active_only))
    }

    fn select_intersecting(
        &self,
        bbox: &BoundingBox,
        active_only: bool,
        simplify: bool,
    ) -> Result<Vec<LinkSegment>, StoreError> {
        let index = self
            .read_index("select segments")
            .map_err(|err| StoreError::backend("select segments", err))?;
        Ok(project_rows(index.intersecting(bbox, active_only), simplify))
    }
}
