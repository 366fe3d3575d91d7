//! Sync progress shared between the sync engine and its observers.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::SegmentKey;

/// Lifecycle phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum SyncPhase {
    /// No run has started.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The feed was exhausted or the batch cap was reached.
    Completed,
    /// The run stopped on an error.
    Failed,
    /// The run stopped at a caller's request.
    Cancelled,
}

/// Snapshot of the sync engine's progress.
///
/// Serialised snapshots also carry the derived `isRunning` and `isComplete`
/// flags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(rename_all = "camelCase", into = "SyncStatusRecord")
)]
pub struct SyncStatus {
    /// Current lifecycle phase.
    pub phase: SyncPhase,
    /// Last committed cursor position.
    pub current: SegmentKey,
    /// Batches committed during the current run.
    pub batch_count: u64,
    /// Failure message from the most recent run, if it failed.
    pub error: Option<String>,
    /// Human-readable reason the most recent run finished.
    pub completion_message: Option<String>,
}

impl SyncStatus {
    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == SyncPhase::Running
    }

    /// Whether the engine is idle and a new run may start.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.is_running()
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncStatusRecord {
    phase: SyncPhase,
    is_running: bool,
    is_complete: bool,
    current: SegmentKey,
    batch_count: u64,
    error: Option<String>,
    completion_message: Option<String>,
}

#[cfg(feature = "serde")]
impl From<SyncStatus> for SyncStatusRecord {
    fn from(status: SyncStatus) -> Self {
        Self {
            phase: status.phase,
            is_running: status.is_running(),
            is_complete: status.is_complete(),
            current: status.current,
            batch_count: status.batch_count,
            error: status.error,
            completion_message: status.completion_message,
        }
    }
}

/// Shared, thread-safe holder for the current [`SyncStatus`].
///
/// Cloning the reporter shares the underlying status. Reads never fail: a
/// lock poisoned by a panicking writer is recovered.
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    inner: Arc<RwLock<SyncStatus>>,
}

impl StatusReporter {
    /// Create a reporter in the [`SyncPhase::Idle`] phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> SyncStatus {
        self.read().clone()
    }

    /// Atomically move to [`SyncPhase::Running`] from any idle phase.
    ///
    /// Returns `false`, leaving the status untouched, when a run is already
    /// in progress. Otherwise counters and messages from the previous run are
    /// cleared and `current` is set to `start`.
    pub fn try_begin(&self, start: SegmentKey) -> bool {
        let mut status = self.write();
        if status.is_running() {
            return false;
        }
        *status = SyncStatus {
            phase: SyncPhase::Running,
            current: start,
            ..SyncStatus::default()
        };
        true
    }

    /// Record a committed batch ending at `position`.
    pub fn record_batch(&self, position: SegmentKey) {
        let mut status = self.write();
        status.current = position;
        status.batch_count += 1;
    }

    /// Finish the run successfully.
    pub fn complete(&self, message: impl Into<String>) {
        self.finish(SyncPhase::Completed, None, Some(message.into()));
    }

    /// Finish the run with an error.
    pub fn fail(&self, error: impl Into<String>) {
        self.finish(SyncPhase::Failed, Some(error.into()), None);
    }

    /// Finish the run after a stop request.
    pub fn cancel(&self, message: impl Into<String>) {
        self.finish(SyncPhase::Cancelled, None, Some(message.into()));
    }

    fn finish(&self, phase: SyncPhase, error: Option<String>, message: Option<String>) {
        let mut status = self.write();
        status.phase = phase;
        status.error = error;
        status.completion_message = message;
    }

    fn read(&self) -> RwLockReadGuard<'_, SyncStatus> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SyncStatus> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn reporter() -> StatusReporter {
        StatusReporter::new()
    }

    #[rstest]
    fn starts_idle(reporter: StatusReporter) {
        let status = reporter.snapshot();
        assert_eq!(status.phase, SyncPhase::Idle);
        assert!(status.is_complete());
        assert_eq!(status.current, SegmentKey::ORIGIN);
    }

    #[rstest]
    fn second_begin_is_rejected_while_running(reporter: StatusReporter) {
        assert!(reporter.try_begin(SegmentKey::ORIGIN));
        assert!(!reporter.try_begin(SegmentKey::new(9, 9)));
        assert_eq!(reporter.snapshot().current, SegmentKey::ORIGIN);
    }

    #[rstest]
    #[case::completed(SyncPhase::Completed)]
    #[case::failed(SyncPhase::Failed)]
    #[case::cancelled(SyncPhase::Cancelled)]
    fn begin_resets_a_finished_run(reporter: StatusReporter, #[case] phase: SyncPhase) {
        assert!(reporter.try_begin(SegmentKey::ORIGIN));
        reporter.record_batch(SegmentKey::new(3, 1));
        reporter.finish(phase, Some("boom".to_owned()), Some("done".to_owned()));

        assert!(reporter.try_begin(SegmentKey::new(3, 1)));
        let status = reporter.snapshot();
        assert_eq!(status.phase, SyncPhase::Running);
        assert_eq!(status.batch_count, 0);
        assert_eq!(status.error, None);
        assert_eq!(status.completion_message, None);
        assert_eq!(status.current, SegmentKey::new(3, 1));
    }

    #[rstest]
    fn clones_share_state(reporter: StatusReporter) {
        let observer = reporter.clone();
        assert!(reporter.try_begin(SegmentKey::ORIGIN));
        reporter.record_batch(SegmentKey::new(1, 2));
        reporter.fail("feed unreachable");

        let status = observer.snapshot();
        assert_eq!(status.phase, SyncPhase::Failed);
        assert_eq!(status.batch_count, 1);
        assert_eq!(status.error.as_deref(), Some("feed unreachable"));
    }

    #[cfg(feature = "serde")]
    #[rstest]
    #[case::running(SyncPhase::Running, true)]
    #[case::completed(SyncPhase::Completed, false)]
    #[case::idle(SyncPhase::Idle, false)]
    fn serialised_status_carries_running_flags(#[case] phase: SyncPhase, #[case] running: bool) {
        let status = SyncStatus {
            phase,
            current: SegmentKey::new(4, 2),
            batch_count: 3,
            ..SyncStatus::default()
        };
        let value = serde_json::to_value(&status).expect("serialise status");
        assert_eq!(value["isRunning"], running);
        assert_eq!(value["isComplete"], !running);
        assert_eq!(value["batchCount"], 3);

        let decoded: SyncStatus = serde_json::from_value(value).expect("decode status");
        assert_eq!(decoded, status);
    }

    #[rstest]
    fn snapshot_survives_a_poisoned_lock(reporter: StatusReporter) {
        let shared = reporter.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = shared.inner.write().expect("acquire lock");
            panic!("poison the status lock");
        })
        .join();
        assert!(outcome.is_err());
        assert_eq!(reporter.snapshot().phase, SyncPhase::Idle);
    }
}
