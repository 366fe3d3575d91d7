//! Ingestion side of the road-network replica.
//!
//! [`feed`] reads pages of link-segment records from the upstream stream,
//! [`sync`] replicates them into a store with a resumable cursor, and
//! [`Replica`] bundles the sync engine with viewport queries behind the
//! operations exposed to callers.

pub mod feed;
mod service;
pub mod sync;

pub use feed::{
    FeedBuildError, FeedError, FeedRecord, HttpSegmentFeed, HttpSegmentFeedConfig, PageRequest,
    RecordParseError, SegmentFeed,
};
pub use service::Replica;
pub use sync::{
    DEFAULT_PAGE_SIZE, DEFAULT_TABLE_NAME, SyncConfig, SyncEngine, SyncError, SyncHandle,
    SyncStartError,
};
