//! Incremental replication of the upstream segment stream.
//!
//! A run resumes from the persisted cursor and repeats
//! fetch → parse → upsert → commit cursor until the feed returns an empty
//! page, the optional batch cap is reached, a stop is requested, or a step
//! fails. The cursor is only written after its batch is stored, so a failed or
//! interrupted run leaves the cursor at the last fully committed batch and a
//! later run resumes from there.
//!
//! Only one run may be active per engine. Progress is published through a
//! [`StatusReporter`] that pollers may read at any time.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use roadnet_core::{
    CursorStore, LinkSegment, SegmentKey, SegmentStore, StatusReporter, StoreError, SyncStatus,
};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

use crate::feed::{FeedError, FeedRecord, PageRequest, RecordParseError, SegmentFeed};

/// Default dataset name used for the cursor row.
pub const DEFAULT_TABLE_NAME: &str = "link_segments";

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = match NonZeroU32::new(10_000) {
    Some(size) => size,
    None => NonZeroU32::MIN,
};

/// Configuration for [`SyncEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Dataset name keying the cursor row.
    pub table_name: String,
    /// Records requested per page.
    pub page_size: NonZeroU32,
    /// Stop after this many committed batches.
    pub max_batches: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            max_batches: None,
        }
    }
}

impl SyncConfig {
    /// Set the dataset name keying the cursor row.
    #[must_use]
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: NonZeroU32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Cap the number of batches committed per run.
    #[must_use]
    pub const fn with_max_batches(mut self, max_batches: u64) -> Self {
        self.max_batches = Some(max_batches);
        self
    }
}

/// Reasons [`SyncEngine::start`] refuses to begin a run.
#[derive(Debug, Error)]
pub enum SyncStartError {
    /// A run is already in progress; it is unaffected.
    #[error("a sync run is already in progress")]
    AlreadyRunning,
    /// `start` was called outside a Tokio runtime.
    #[error("sync must be started from within a Tokio runtime")]
    NoRuntime,
    /// The persisted cursor could not be read.
    #[error("cannot read the sync cursor: {0}")]
    ReadCursor(#[from] StoreError),
}

/// Failure that ended a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The feed could not deliver a page.
    #[error(transparent)]
    Fetch(#[from] FeedError),
    /// A record in the page was malformed; the batch was not written.
    #[error(transparent)]
    Parse(#[from] RecordParseError),
    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A blocking store task panicked or was cancelled.
    #[error("sync store task failed: {0}")]
    Task(#[from] JoinError),
}

/// Drives replication from a [`SegmentFeed`] into a store.
#[derive(Debug)]
pub struct SyncEngine<F: ?Sized, S> {
    feed: Arc<F>,
    store: Arc<S>,
    config: SyncConfig,
    status: StatusReporter,
    cancel: Arc<AtomicBool>,
}

impl<F, S> SyncEngine<F, S>
where
    F: SegmentFeed + ?Sized + 'static,
    S: SegmentStore + CursorStore + Send + Sync + 'static,
{
    /// Create an idle engine.
    pub fn new(feed: Arc<F>, store: Arc<S>, config: SyncConfig) -> Self {
        Self {
            feed,
            store,
            config,
            status: StatusReporter::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Configuration in use.
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Reporter publishing this engine's progress.
    pub const fn status(&self) -> &StatusReporter {
        &self.status
    }

    /// Snapshot of the current progress.
    pub fn progress(&self) -> SyncStatus {
        self.status.snapshot()
    }

    /// Begin a run on the current Tokio runtime.
    ///
    /// The persisted cursor is read before the run is published, so the
    /// first running snapshot already reports the resume position. The
    /// running check and the transition to running happen atomically, so of
    /// several concurrent calls exactly one succeeds.
    pub fn start(&self) -> Result<SyncHandle, SyncStartError> {
        let runtime = Handle::try_current().map_err(|_| SyncStartError::NoRuntime)?;
        if self.status.snapshot().is_running() {
            return Err(SyncStartError::AlreadyRunning);
        }
        let resume = self.store.get_cursor(&self.config.table_name)?;
        if !self.status.try_begin(resume) {
            return Err(SyncStartError::AlreadyRunning);
        }
        self.cancel.store(false, Ordering::SeqCst);
        let run = SyncRun {
            feed: Arc::clone(&self.feed),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            status: self.status.clone(),
            cancel: Arc::clone(&self.cancel),
            resume,
        };
        log::info!("starting sync of {} from cursor {resume}", self.config.table_name);
        Ok(SyncHandle {
            task: runtime.spawn(run.execute()),
            status: self.status.clone(),
        })
    }

    /// Ask the running loop to stop before its next fetch.
    ///
    /// An in-flight fetch or batch write is allowed to finish and commit.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Handle to a run started by [`SyncEngine::start`].
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<()>,
    status: StatusReporter,
}

impl SyncHandle {
    /// Wait for the run to finish and return its final status.
    pub async fn wait(self) -> SyncStatus {
        if let Err(err) = self.task.await {
            log::error!("sync task ended abnormally: {err}");
        }
        self.status.snapshot()
    }

    /// Whether the run has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum RunOutcome {
    Completed(String),
    Cancelled,
}

struct SyncRun<F: ?Sized, S> {
    feed: Arc<F>,
    store: Arc<S>,
    config: SyncConfig,
    status: StatusReporter,
    cancel: Arc<AtomicBool>,
    resume: SegmentKey,
}

/// Marks the run failed if its task unwinds while still running.
struct RunningGuard<'a>(&'a StatusReporter);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.0.snapshot().is_running() {
            self.0.fail("sync task ended unexpectedly");
        }
    }
}

impl<F, S> SyncRun<F, S>
where
    F: SegmentFeed + ?Sized + 'static,
    S: SegmentStore + CursorStore + Send + Sync + 'static,
{
    async fn execute(self) {
        let _guard = RunningGuard(&self.status);
        let table = self.config.table_name.as_str();
        match self.drive().await {
            Ok(RunOutcome::Completed(message)) => {
                log::info!("sync of {table} completed: {message}");
                self.status.complete(message);
            }
            Ok(RunOutcome::Cancelled) => {
                log::info!("sync of {table} cancelled");
                self.status.cancel("sync stopped on request");
            }
            Err(err) => {
                log::error!("sync of {table} failed: {err}");
                self.status.fail(err.to_string());
            }
        }
    }

    async fn drive(&self) -> Result<RunOutcome, SyncError> {
        let mut cursor = self.resume;
        let mut batches: u64 = 0;
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(RunOutcome::Cancelled);
            }
            if let Some(cap) = self.config.max_batches
                && batches >= cap
            {
                return Ok(RunOutcome::Completed(format!(
                    "stopped after reaching the limit of {cap} batches"
                )));
            }

            let request = PageRequest {
                start: cursor,
                page_size: self.config.page_size.get(),
            };
            let records = self.feed.fetch_page(&request).await?;
            if records.is_empty() {
                return Ok(RunOutcome::Completed(format!(
                    "feed exhausted after {batches} batches"
                )));
            }

            let segments = parse_batch(records)?;
            let batch_max = segments
                .iter()
                .map(|segment| segment.key)
                .max()
                .unwrap_or(cursor);
            let written = segments.len();
            self.with_store(move |store| store.upsert_batch(&segments))
                .await?;

            if batch_max <= cursor {
                log::warn!(
                    "feed page starting at {cursor} did not advance past it; treating as end of stream"
                );
                return Ok(RunOutcome::Completed(format!(
                    "feed stopped advancing at {cursor}"
                )));
            }

            let table = self.config.table_name.clone();
            self.with_store(move |store| store.set_cursor(&table, batch_max, Utc::now()))
                .await?;
            cursor = batch_max;
            batches += 1;
            self.status.record_batch(cursor);
            log::info!("committed batch {batches} ({written} segments); cursor at {cursor}");
        }
    }

    async fn with_store<T, W>(&self, work: W) -> Result<T, SyncError>
    where
        T: Send + 'static,
        W: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let output = tokio::task::spawn_blocking(move || work(store.as_ref())).await?;
        Ok(output?)
    }
}

/// Parse every record of a page; one malformed record rejects the page.
fn parse_batch(records: Vec<FeedRecord>) -> Result<Vec<LinkSegment>, RecordParseError> {
    records.into_iter().map(FeedRecord::into_segment).collect()
}
