//! Command-line interface for the road-network replica.
//!
//! `roadnet sync` replicates the upstream segment stream into a SQLite file,
//! `roadnet query` prints the GeoJSON for a viewport and `roadnet state`
//! prints the persisted sync cursors. Options layer CLI flags over
//! `ROADNET_`-prefixed environment variables and configuration files.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use roadnet_core::SqliteSegmentStore;
use roadnet_fs::DatabaseLocation;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod error;
mod query;
mod state;
mod sync;

pub use error::CliError;

use query::QueryArgs;
use state::StateArgs;
use sync::SyncArgs;

pub(crate) const DEFAULT_DATABASE: &str = "roadnet.db";

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_FEED_URL: &str = "feed-url";
pub(crate) const ARG_PAGE_SIZE: &str = "page-size";
pub(crate) const ARG_MAX_BATCHES: &str = "max-batches";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const ARG_TABLE_NAME: &str = "table-name";
pub(crate) const ARG_BBOX: &str = "bbox";
pub(crate) const ARG_DENSE_THRESHOLD: &str = "dense-threshold";
pub(crate) const ARG_HARD_CAP: &str = "hard-cap";
pub(crate) const ENV_QUERY_BBOX: &str = "ROADNET_CMDS_QUERY_BBOX";

/// Run the roadnet CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse()?;
    init_logging();
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Sync(args) => sync::run_sync(args, &mut stdout),
        Command::Query(args) => query::run_query(args, &mut stdout),
        Command::State(args) => state::run_state(args, &mut stdout),
    }
}

/// Route `log` records and tracing events to stderr, filtered by `RUST_LOG`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber installed by an embedding process takes precedence.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Parser)]
#[command(
    name = "roadnet",
    about = "Maintain and query a local replica of the road network",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replicate the upstream segment stream into the local database.
    Sync(SyncArgs),
    /// Print the segments intersecting a bounding box as GeoJSON.
    Query(QueryArgs),
    /// Print the persisted sync cursors.
    State(StateArgs),
}

/// Open a database that a previous sync must have created.
pub(crate) fn open_existing_store(path: &Utf8Path) -> Result<SqliteSegmentStore, CliError> {
    let location =
        roadnet_fs::inspect_database(path).map_err(|source| CliError::PrepareDatabase {
            path: path.to_path_buf(),
            source,
        })?;
    match location {
        DatabaseLocation::File => Ok(SqliteSegmentStore::open(path.as_std_path())?),
        DatabaseLocation::NotAFile => Err(CliError::DatabaseNotFile {
            path: path.to_path_buf(),
        }),
        DatabaseLocation::Missing => Err(CliError::MissingDatabase {
            path: path.to_path_buf(),
        }),
    }
}

pub(crate) fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
