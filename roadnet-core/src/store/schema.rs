//! SQLite schema for the segment replica.
//!
//! Opening a store records the schema version and creates the cursor table.
//! The segment table is created by the first committed batch so an untouched
//! replica stays empty.

use rusqlite::{Connection, OptionalExtension, Transaction};

use super::sqlite::SqliteSegmentStoreError;

/// Version of the on-disk layout written by [`super::SqliteSegmentStore`].
pub const SCHEMA_VERSION: i64 = 1;

pub(super) const SEGMENT_TABLE: &str = "link_segments";

/// Prepare `connection` for use, rejecting databases from another version.
pub(super) fn initialise_schema(connection: &mut Connection) -> Result<(), SqliteSegmentStoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SqliteSegmentStoreError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    ensure_schema_version(&transaction)?;
    run_migration_step(
        &transaction,
        "create sync_state",
        "CREATE TABLE IF NOT EXISTS sync_state (
            table_name TEXT PRIMARY KEY,
            last_sequence_id INTEGER NOT NULL,
            last_segment_number INTEGER NOT NULL,
            last_sync TEXT NOT NULL
        ) WITHOUT ROWID",
    )?;

    transaction
        .commit()
        .map_err(|source| SqliteSegmentStoreError::Migration {
            step: "commit schema transaction",
            source,
        })
}

/// Create the segment table if this is the first batch to be written.
pub(super) fn ensure_segment_table(
    transaction: &Transaction<'_>,
) -> Result<(), SqliteSegmentStoreError> {
    run_migration_step(
        transaction,
        "create link_segments",
        "CREATE TABLE IF NOT EXISTS link_segments (
            sequence_id INTEGER NOT NULL,
            segment_number INTEGER NOT NULL,
            start_position REAL NOT NULL,
            end_position REAL NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            geometry BLOB NOT NULL,
            municipality INTEGER NOT NULL,
            length REAL NOT NULL,
            PRIMARY KEY (sequence_id, segment_number)
        ) WITHOUT ROWID",
    )
}

/// Whether the segment table has been created yet.
pub(super) fn segment_table_exists(connection: &Connection) -> Result<bool, SqliteSegmentStoreError> {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [SEGMENT_TABLE],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(|source| SqliteSegmentStoreError::Migration {
            step: "inspect link_segments",
            source,
        })
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SqliteSegmentStoreError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS roadnet_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM roadnet_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SqliteSegmentStoreError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SqliteSegmentStoreError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO roadnet_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SqliteSegmentStoreError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SqliteSegmentStoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SqliteSegmentStoreError::Migration { step, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        let mut connection = Connection::open_in_memory().expect("open in-memory database");
        initialise_schema(&mut connection).expect("initialise schema");
        connection
    }

    #[rstest]
    fn records_the_current_version(connection: Connection) {
        let version: i64 = connection
            .query_row("SELECT version FROM roadnet_schema_version", [], |row| {
                row.get(0)
            })
            .expect("read version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[rstest]
    fn is_idempotent(mut connection: Connection) {
        initialise_schema(&mut connection).expect("second initialisation");
        let rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM roadnet_schema_version", [], |row| {
                row.get(0)
            })
            .expect("count versions");
        assert_eq!(rows, 1);
    }

    #[rstest]
    fn rejects_a_different_version(mut connection: Connection) {
        connection
            .execute(
                "UPDATE roadnet_schema_version SET version = ?1",
                [SCHEMA_VERSION + 1],
            )
            .expect("bump version");
        let err = initialise_schema(&mut connection).expect_err("mismatch should fail");
        assert!(matches!(
            err,
            SqliteSegmentStoreError::VersionMismatch { expected, found }
                if expected == SCHEMA_VERSION && found == SCHEMA_VERSION + 1
        ));
    }

    #[rstest]
    fn segment_table_is_created_on_demand(mut connection: Connection) {
        assert!(!segment_table_exists(&connection).expect("inspect"));
        let transaction = connection.transaction().expect("begin");
        ensure_segment_table(&transaction).expect("create table");
        transaction.commit().expect("commit");
        assert!(segment_table_exists(&connection).expect("inspect"));
    }
}
