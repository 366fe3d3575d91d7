//! Caller-facing facade over the sync engine and viewport queries.

use std::sync::Arc;

use roadnet_core::{
    BoundingBox, CursorState, CursorStore, FeatureCollection, QueryError, SegmentStore,
    StoreError, SyncStatus, ViewportConfig, ViewportQueryEngine,
};

use crate::feed::SegmentFeed;
use crate::sync::{SyncConfig, SyncEngine, SyncHandle, SyncStartError};

/// A local replica of the road network fed by one [`SegmentFeed`].
///
/// The store handle is opened once by the caller and shared between the sync
/// engine, which is its only writer, and viewport queries.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use roadnet_core::BoundingBox;
/// use roadnet_core::test_support::MemorySegmentStore;
/// use roadnet_data::feed::test_support::StubSegmentFeed;
/// use roadnet_data::{Replica, SyncConfig};
///
/// let replica = Replica::new(
///     Arc::new(StubSegmentFeed::default()),
///     Arc::new(MemorySegmentStore::default()),
///     SyncConfig::default(),
///     Default::default(),
/// );
/// let bbox = BoundingBox::new(0.0, 0.0, 0.0, 0.0).unwrap();
/// assert!(replica.query_viewport(&bbox).unwrap().is_empty());
/// assert!(!replica.get_sync_progress().is_running());
/// ```
#[derive(Debug)]
pub struct Replica<F: ?Sized, S> {
    engine: SyncEngine<F, S>,
    store: Arc<S>,
    viewport: ViewportQueryEngine<Arc<S>>,
}

impl<F, S> Replica<F, S>
where
    F: SegmentFeed + ?Sized + 'static,
    S: SegmentStore + CursorStore + Send + Sync + 'static,
{
    /// Assemble a replica from its collaborators.
    pub fn new(
        feed: Arc<F>,
        store: Arc<S>,
        sync_config: SyncConfig,
        viewport_config: ViewportConfig,
    ) -> Self {
        Self {
            engine: SyncEngine::new(feed, Arc::clone(&store), sync_config),
            viewport: ViewportQueryEngine::new(Arc::clone(&store), viewport_config),
            store,
        }
    }

    /// Begin a sync run; fails if one is already running.
    pub fn start_sync(&self) -> Result<SyncHandle, SyncStartError> {
        self.engine.start()
    }

    /// Request cooperative cancellation of the running sync.
    pub fn stop_sync(&self) {
        self.engine.stop();
    }

    /// Snapshot of the sync progress.
    pub fn get_sync_progress(&self) -> SyncStatus {
        self.engine.progress()
    }

    /// Every persisted cursor, ordered by table name.
    pub fn get_sync_state(&self) -> Result<Vec<CursorState>, StoreError> {
        self.store.list_cursors()
    }

    /// Features intersecting `bbox`, degraded by result density.
    pub fn query_viewport(&self, bbox: &BoundingBox) -> Result<FeatureCollection, QueryError> {
        self.viewport.query(bbox)
    }

    /// Underlying sync engine.
    pub const fn engine(&self) -> &SyncEngine<F, S> {
        &self.engine
    }
}
