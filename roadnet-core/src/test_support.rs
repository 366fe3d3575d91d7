//! Test-only, in-memory store implementation and segment builders used by
//! unit and behaviour tests.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, NaiveDate, Utc};
use geo::{Geometry, Intersects, LineString, Point};
use thiserror::Error;

use crate::store::project_rows;
use crate::{
    BoundingBox, CursorState, CursorStore, LinkSegment, LinkSegmentParts, SegmentKey,
    SegmentStore, StoreError,
};

/// Failure injected by [`MemorySegmentStore::fail_writes`].
#[derive(Debug, Error)]
#[error("injected store failure")]
pub struct InjectedFailure;

/// In-memory `SegmentStore` and `CursorStore` used in tests.
///
/// The store performs a linear scan and is intended only for small datasets.
#[derive(Debug, Default)]
pub struct MemorySegmentStore {
    segments: Mutex<BTreeMap<SegmentKey, LinkSegment>>,
    cursors: Mutex<BTreeMap<String, (SegmentKey, DateTime<Utc>)>>,
    fail_writes: AtomicBool,
    upserts: AtomicUsize,
}

impl MemorySegmentStore {
    /// Create a store pre-populated with `segments`.
    pub fn with_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = LinkSegment>,
    {
        let store = Self::default();
        store
            .lock_segments()
            .extend(segments.into_iter().map(|segment| (segment.key, segment)));
        store
    }

    /// Make every subsequent write fail until reset with `false`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `upsert_batch` calls.
    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Snapshot of every stored segment in key order.
    pub fn segments(&self) -> Vec<LinkSegment> {
        self.lock_segments().values().cloned().collect()
    }

    fn lock_segments(&self) -> MutexGuard<'_, BTreeMap<SegmentKey, LinkSegment>> {
        self.segments
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_cursors(&self) -> MutexGuard<'_, BTreeMap<String, (SegmentKey, DateTime<Utc>)>> {
        self.cursors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_writable(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::backend(operation, InjectedFailure))
        } else {
            Ok(())
        }
    }
}

impl SegmentStore for MemorySegmentStore {
    fn upsert_batch(&self, rows: &[LinkSegment]) -> Result<(), StoreError> {
        self.check_writable("upsert segment batch")?;
        let mut segments = self.lock_segments();
        for segment in rows {
            segments.insert(segment.key, segment.clone());
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn count_intersecting(
        &self,
        bbox: &BoundingBox,
        active_only: bool,
    ) -> Result<usize, StoreError> {
        Ok(self.select_intersecting(bbox, active_only, false)?.len())
    }

    fn select_intersecting(
        &self,
        bbox: &BoundingBox,
        active_only: bool,
        simplify: bool,
    ) -> Result<Vec<LinkSegment>, StoreError> {
        let rect = bbox.to_rect();
        let segments = self.lock_segments();
        // `Intersects` treats boundary points as inside the rectangle.
        let hits = segments
            .values()
            .filter(|segment| !active_only || segment.is_active())
            .filter(|segment| segment.geometry.intersects(&rect));
        Ok(project_rows(hits, simplify))
    }
}

impl CursorStore for MemorySegmentStore {
    fn get_cursor(&self, table_name: &str) -> Result<SegmentKey, StoreError> {
        Ok(self
            .lock_cursors()
            .get(table_name)
            .map_or(SegmentKey::ORIGIN, |(position, _)| *position))
    }

    fn set_cursor(
        &self,
        table_name: &str,
        position: SegmentKey,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_writable("write sync cursor")?;
        self.lock_cursors()
            .insert(table_name.to_owned(), (position, timestamp));
        Ok(())
    }

    fn list_cursors(&self) -> Result<Vec<CursorState>, StoreError> {
        Ok(self
            .lock_cursors()
            .iter()
            .map(|(table_name, (position, last_sync))| CursorState {
                table_name: table_name.clone(),
                position: *position,
                last_sync: *last_sync,
            })
            .collect())
    }
}

fn segment_with(sequence_id: i64, segment_number: i64, geometry: Geometry<f64>) -> LinkSegment {
    let parts = LinkSegmentParts {
        key: SegmentKey::new(sequence_id, segment_number),
        start_position: 0.0,
        end_position: 1.0,
        start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
        end_date: None,
        geometry,
        municipality: 301,
        length: 1.0,
    };
    match LinkSegment::new(parts) {
        Ok(segment) => segment,
        Err(err) => panic!("test segment should be valid: {err}"),
    }
}

/// Active line segment through `coords`, in municipality 301.
pub fn line_segment<const N: usize>(
    sequence_id: i64,
    segment_number: i64,
    coords: [(f64, f64); N],
) -> LinkSegment {
    segment_with(
        sequence_id,
        segment_number,
        Geometry::LineString(LineString::from(coords.to_vec())),
    )
}

/// Active point segment at `(x, y)`, in municipality 301.
pub fn point_segment(sequence_id: i64, segment_number: i64, x: f64, y: f64) -> LinkSegment {
    segment_with(
        sequence_id,
        segment_number,
        Geometry::Point(Point::new(x, y)),
    )
}

/// Mark `segment` as superseded.
pub fn retired(segment: LinkSegment) -> LinkSegment {
    LinkSegment {
        end_date: NaiveDate::from_ymd_opt(2024, 6, 30),
        ..segment
    }
}

/// `count` point segments on a grid inside the unit square, keyed
/// `(1, 1)..=(1, count)`.
pub fn dense_grid(count: usize) -> Vec<LinkSegment> {
    let side = grid_side(count);
    (0..count)
        .map(|n| {
            let column = n % side;
            let row = n / side;
            point_segment(
                1,
                i64::try_from(n + 1).unwrap_or(i64::MAX),
                ratio(column, side),
                ratio(row, side),
            )
        })
        .collect()
}

fn grid_side(count: usize) -> usize {
    let mut side = 1;
    while side * side < count {
        side += 1;
    }
    side
}

fn ratio(index: usize, side: usize) -> f64 {
    let index = u32::try_from(index).unwrap_or(u32::MAX);
    let side = u32::try_from(side).unwrap_or(u32::MAX);
    f64::from(index) / f64::from(side)
}
