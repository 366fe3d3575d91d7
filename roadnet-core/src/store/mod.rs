//! Persistence traits for link segments and sync cursors.
//!
//! [`SegmentStore`] is the spatial store: it upserts versioned segments and
//! answers bounding-box intersection queries. [`CursorStore`] keeps one
//! resumable cursor per ingested dataset. The SQLite implementation backs
//! both traits with a single database file.

use std::{error::Error as StdError, sync::Arc};

use chrono::{DateTime, Utc};
use geo::{Centroid, Geometry};
use thiserror::Error;

use crate::{BoundingBox, LinkSegment, SegmentKey};

#[cfg(feature = "store-sqlite")]
mod cursor;
#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod spatial_index;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::SCHEMA_VERSION;
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteSegmentStore, SqliteSegmentStoreError};

/// Failure reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("failed to {operation}: {source}")]
    Backend {
        /// What the store was doing when it failed.
        operation: &'static str,
        /// Backend-specific error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a backend error with the operation that produced it.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Last committed ingestion position for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CursorState {
    /// Dataset or table the cursor belongs to.
    pub table_name: String,
    /// Largest key committed so far.
    pub position: SegmentKey,
    /// When the cursor was last written.
    pub last_sync: DateTime<Utc>,
}

/// Versioned geometry storage with bounding-box intersection queries.
///
/// Implementations must be safe to read while a single writer upserts.
/// Intersection includes geometries touching the box boundary.
pub trait SegmentStore {
    /// Insert or overwrite `rows` by primary key.
    ///
    /// Replaying an already stored batch leaves the store unchanged apart
    /// from redundant writes.
    fn upsert_batch(&self, rows: &[LinkSegment]) -> Result<(), StoreError>;

    /// Count segments intersecting `bbox`.
    fn count_intersecting(&self, bbox: &BoundingBox, active_only: bool)
    -> Result<usize, StoreError>;

    /// Return segments intersecting `bbox`, ordered by key.
    ///
    /// With `simplify` set, each segment's geometry is replaced by its
    /// centroid point.
    fn select_intersecting(
        &self,
        bbox: &BoundingBox,
        active_only: bool,
        simplify: bool,
    ) -> Result<Vec<LinkSegment>, StoreError>;
}

/// Resumable cursor persistence, one row per dataset.
pub trait CursorStore {
    /// Return the committed cursor for `table_name`, or
    /// [`SegmentKey::ORIGIN`] when none has been written.
    fn get_cursor(&self, table_name: &str) -> Result<SegmentKey, StoreError>;

    /// Upsert the cursor row for `table_name`.
    fn set_cursor(
        &self,
        table_name: &str,
        position: SegmentKey,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// List every cursor row ordered by table name.
    fn list_cursors(&self) -> Result<Vec<CursorState>, StoreError>;
}

impl<T: SegmentStore + ?Sized> SegmentStore for Arc<T> {
    fn upsert_batch(&self, rows: &[LinkSegment]) -> Result<(), StoreError> {
        (**self).upsert_batch(rows)
    }

    fn count_intersecting(
        &self,
        bbox: &BoundingBox,
        active_only: bool,
    ) -> Result<usize, StoreError> {
        (**self).count_intersecting(bbox, active_only)
    }

    fn select_intersecting(
        &self,
        bbox: &BoundingBox,
        active_only: bool,
        simplify: bool,
    ) -> Result<Vec<LinkSegment>, StoreError> {
        (**self).select_intersecting(bbox, active_only, simplify)
    }
}

impl<T: CursorStore + ?Sized> CursorStore for Arc<T> {
    fn get_cursor(&self, table_name: &str) -> Result<SegmentKey, StoreError> {
        (**self).get_cursor(table_name)
    }

    fn set_cursor(
        &self,
        table_name: &str,
        position: SegmentKey,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).set_cursor(table_name, position, timestamp)
    }

    fn list_cursors(&self) -> Result<Vec<CursorState>, StoreError> {
        (**self).list_cursors()
    }
}

/// Clone `hits` into owned rows, collapsing each geometry to its centroid
/// when `simplify` is set.
pub(crate) fn project_rows<'a, I>(hits: I, simplify: bool) -> Vec<LinkSegment>
where
    I: IntoIterator<Item = &'a LinkSegment>,
{
    hits.into_iter()
        .filter_map(|segment| {
            if !simplify {
                return Some(segment.clone());
            }
            let Some(centre) = segment.geometry.centroid() else {
                log::warn!(
                    "segment {} has no centroid; omitting it from simplified rows",
                    segment.key
                );
                return None;
            };
            Some(LinkSegment {
                geometry: Geometry::Point(centre),
                ..segment.clone()
            })
        })
        .collect()
}
