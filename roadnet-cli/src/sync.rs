//! `sync` command: replicate the upstream stream into the local database.

use std::io::Write;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use roadnet_core::{SqliteSegmentStore, SyncPhase, SyncStatus, ViewportConfig};
use roadnet_data::{
    HttpSegmentFeed, HttpSegmentFeedConfig, Replica, SegmentFeed, SyncConfig,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_FEED_URL, ARG_MAX_BATCHES, ARG_PAGE_SIZE, ARG_TABLE_NAME, ARG_TIMEOUT_SECS,
    CliError, DEFAULT_DATABASE, write_json,
};

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch link segments from the upstream stream, starting at the \
                 last committed cursor, and upsert them into the local SQLite \
                 database. Runs until the stream is exhausted; Ctrl-C stops \
                 after the batch in flight is committed. The final status is \
                 printed as JSON.",
    about = "Replicate the upstream segment stream"
)]
#[ortho_config(prefix = "ROADNET")]
pub(crate) struct SyncArgs {
    /// Path to the SQLite database (default `roadnet.db`).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Stream endpoint for link segments.
    #[arg(long = ARG_FEED_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) feed_url: Option<String>,
    /// Records requested per page.
    #[arg(long = ARG_PAGE_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) page_size: Option<u32>,
    /// Stop after committing this many batches.
    #[arg(long = ARG_MAX_BATCHES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_batches: Option<u64>,
    /// Per-request timeout in seconds; none by default.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Dataset name keying the cursor row.
    #[arg(long = ARG_TABLE_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) table_name: Option<String>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncCommandConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncCommandConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) feed: HttpSegmentFeedConfig,
    pub(crate) sync: SyncConfig,
}

impl TryFrom<SyncArgs> for SyncCommandConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let database = args
            .database
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE));

        let mut feed = args
            .feed_url
            .map_or_else(HttpSegmentFeedConfig::default, HttpSegmentFeedConfig::new);
        if let Some(secs) = args.timeout_secs {
            if secs == 0 {
                return Err(CliError::ZeroValue {
                    field: ARG_TIMEOUT_SECS,
                });
            }
            feed = feed.with_timeout(Duration::from_secs(secs));
        }

        let mut sync = SyncConfig::default();
        if let Some(size) = args.page_size {
            let size = NonZeroU32::new(size).ok_or(CliError::ZeroValue {
                field: ARG_PAGE_SIZE,
            })?;
            sync = sync.with_page_size(size);
        }
        if let Some(cap) = args.max_batches {
            sync = sync.with_max_batches(cap);
        }
        if let Some(table_name) = args.table_name {
            sync = sync.with_table_name(table_name);
        }

        Ok(Self {
            database,
            feed,
            sync,
        })
    }
}

type CliReplica = Replica<dyn SegmentFeed, SqliteSegmentStore>;

pub(crate) fn run_sync(args: SyncArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let feed = HttpSegmentFeed::with_config(config.feed.clone())?;
    run_sync_with(&config, Arc::new(feed), writer)
}

/// Run one sync against `feed`, print the final status and map a failed run
/// to an error.
pub(crate) fn run_sync_with(
    config: &SyncCommandConfig,
    feed: Arc<dyn SegmentFeed>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    roadnet_fs::prepare_database_dir(&config.database).map_err(|source| {
        CliError::PrepareDatabase {
            path: config.database.clone(),
            source,
        }
    })?;
    let store = SqliteSegmentStore::open(config.database.as_std_path())?;
    let replica: CliReplica = Replica::new(
        feed,
        Arc::new(store),
        config.sync.clone(),
        ViewportConfig::default(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let status = runtime.block_on(supervise(&replica))?;
    write_json(writer, &status)?;

    match status.phase {
        SyncPhase::Failed => Err(CliError::SyncFailed {
            message: status.error.unwrap_or_default(),
        }),
        _ => Ok(()),
    }
}

/// Wait for the run, turning Ctrl-C into a cooperative stop.
async fn supervise(replica: &CliReplica) -> Result<SyncStatus, CliError> {
    let finished = replica.start_sync()?.wait();
    tokio::pin!(finished);
    tokio::select! {
        status = &mut finished => return Ok(status),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                log::info!("interrupt received; stopping after the batch in flight");
                replica.stop_sync();
            }
            Err(err) => log::warn!("cannot listen for interrupts: {err}"),
        },
    }
    Ok(finished.await)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SyncCommandConfig, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncCommandConfig::try_from(merged)
}
