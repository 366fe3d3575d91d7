//! Core domain types for the road-network replica.
//!
//! The crate models versioned link segments and their composite keys,
//! defines the spatial and cursor store traits, and answers
//! density-adaptive viewport queries. With the `store-sqlite` feature the
//! stores are backed by a single SQLite file plus an in-memory R\*-tree.
//! Constructors validate their input and return `Result` so invalid data is
//! rejected before it reaches a store.

mod bbox;
pub mod geojson;
mod segment;
mod status;
pub mod store;
mod viewport;

#[doc(hidden)]
pub mod test_support;

pub use bbox::{BoundingBox, BoundingBoxError};
pub use geojson::{Feature, FeatureCollection, GeoJsonGeometry};
pub use segment::{LinkSegment, LinkSegmentError, LinkSegmentParts, SegmentKey};
pub use status::{StatusReporter, SyncPhase, SyncStatus};
pub use store::{CursorState, CursorStore, SegmentStore, StoreError};
#[cfg(feature = "store-sqlite")]
pub use store::{SCHEMA_VERSION, SqliteSegmentStore, SqliteSegmentStoreError};
pub use viewport::{Density, QueryError, ViewportConfig, ViewportConfigError, ViewportQueryEngine};
