//! Error types emitted by the roadnet CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use roadnet_core::{
    BoundingBoxError, QueryError, SqliteSegmentStoreError, StoreError, ViewportConfigError,
};
use roadnet_data::{FeedBuildError, SyncStartError};
use thiserror::Error;

/// Errors emitted by the roadnet CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable that can supply the value.
        env: &'static str,
    },
    /// A numeric option was out of range.
    #[error("{field} must be greater than zero")]
    ZeroValue {
        /// Flag name.
        field: &'static str,
    },
    /// The bounding box option did not hold four comma-separated numbers.
    #[error("bbox {value:?} must be four comma-separated numbers: minX,minY,maxX,maxY")]
    MalformedBoundingBox {
        /// Raw option value.
        value: String,
    },
    /// The bounding box numbers were rejected.
    #[error(transparent)]
    InvalidBoundingBox(#[from] BoundingBoxError),
    /// Viewport thresholds were inconsistent.
    #[error(transparent)]
    InvalidViewportConfig(#[from] ViewportConfigError),
    /// The database to read does not exist.
    #[error("database {path:?} does not exist; run `roadnet sync` first")]
    MissingDatabase {
        /// Configured database path.
        path: Utf8PathBuf,
    },
    /// The database path exists but is not a file.
    #[error("database path {path:?} exists but is not a file")]
    DatabaseNotFile {
        /// Configured database path.
        path: Utf8PathBuf,
    },
    /// Inspecting or preparing the database location failed.
    #[error("failed to prepare database location {path:?}: {source}")]
    PrepareDatabase {
        /// Configured database path.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite store failed.
    #[error(transparent)]
    OpenStore(#[from] Box<SqliteSegmentStoreError>),
    /// Reading cursor rows failed.
    #[error("failed to read sync state: {0}")]
    ReadState(#[source] StoreError),
    /// The viewport query failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Constructing the feed client failed.
    #[error(transparent)]
    BuildFeed(#[from] FeedBuildError),
    /// Building the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The sync run refused to start.
    #[error(transparent)]
    StartSync(#[from] SyncStartError),
    /// The sync run ended in failure.
    #[error("sync failed: {message}")]
    SyncFailed {
        /// Failure reported by the sync engine.
        message: String,
    },
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<SqliteSegmentStoreError> for CliError {
    fn from(error: SqliteSegmentStoreError) -> Self {
        Self::OpenStore(Box::new(error))
    }
}
