//! Facade crate for the road-network replica.
//!
//! This crate re-exports the domain types, store traits and viewport queries
//! from `roadnet-core`, and with the `sync` feature the feed client and sync
//! engine from `roadnet-data`.

#![forbid(unsafe_code)]

pub use roadnet_core::{
    BoundingBox, BoundingBoxError, CursorState, CursorStore, Density, Feature, FeatureCollection,
    GeoJsonGeometry, LinkSegment, LinkSegmentError, LinkSegmentParts, QueryError, SegmentKey,
    SegmentStore, StatusReporter, StoreError, SyncPhase, SyncStatus, ViewportConfig,
    ViewportConfigError, ViewportQueryEngine,
};

#[cfg(feature = "store-sqlite")]
pub use roadnet_core::{SCHEMA_VERSION, SqliteSegmentStore, SqliteSegmentStoreError};

#[cfg(feature = "sync")]
pub use roadnet_data::{
    FeedError, FeedRecord, HttpSegmentFeed, HttpSegmentFeedConfig, PageRequest, Replica,
    SegmentFeed, SyncConfig, SyncEngine, SyncError, SyncHandle, SyncStartError,
};
