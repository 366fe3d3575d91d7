//! In-memory R\*-tree over stored segment envelopes.
//!
//! The tree holds only keys and envelopes; segment rows live in a key map.
//! Envelope hits are confirmed with an exact `geo` intersection test so lines
//! whose bounds overlap the viewport without crossing it are excluded.

use std::collections::HashMap;

use geo::{Intersects, Rect};
use rstar::{AABB, RTree, RTreeObject};

use crate::{BoundingBox, LinkSegment, SegmentKey};

/// Tree entry pairing a segment key with its geometry envelope.
#[derive(Debug, Clone, PartialEq)]
struct IndexedSegment {
    key: SegmentKey,
    envelope: AABB<[f64; 2]>,
}

impl IndexedSegment {
    fn from_segment(segment: &LinkSegment) -> Option<Self> {
        segment.bounds().map(|bounds| Self {
            key: segment.key,
            envelope: envelope_of(bounds),
        })
    }
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_of(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Spatial read model kept in step with the persisted segment table.
#[derive(Debug, Default)]
pub(crate) struct SegmentIndex {
    tree: RTree<IndexedSegment>,
    segments: HashMap<SegmentKey, LinkSegment>,
}

impl SegmentIndex {
    /// Bulk-load an index from persisted rows.
    pub(crate) fn from_segments(rows: Vec<LinkSegment>) -> Self {
        let entries = rows
            .iter()
            .filter_map(IndexedSegment::from_segment)
            .collect();
        let segments = rows
            .into_iter()
            .map(|segment| (segment.key, segment))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            segments,
        }
    }

    /// Number of indexed segments.
    pub(crate) fn len(&self) -> usize {
        self.segments.len()
    }

    /// Insert `segment`, replacing any row with the same key.
    pub(crate) fn upsert(&mut self, segment: LinkSegment) {
        if let Some(previous) = self.segments.remove(&segment.key)
            && let Some(entry) = IndexedSegment::from_segment(&previous)
        {
            self.tree.remove(&entry);
        }
        if let Some(entry) = IndexedSegment::from_segment(&segment) {
            self.tree.insert(entry);
        }
        self.segments.insert(segment.key, segment);
    }

    /// Number of segments whose geometry intersects `bbox`.
    pub(crate) fn count_intersecting(&self, bbox: &BoundingBox, active_only: bool) -> usize {
        self.hits(bbox, active_only).count()
    }

    /// Segments whose geometry intersects `bbox`, in key order.
    pub(crate) fn intersecting(&self, bbox: &BoundingBox, active_only: bool) -> Vec<&LinkSegment> {
        let mut hits: Vec<&LinkSegment> = self.hits(bbox, active_only).collect();
        hits.sort_unstable_by_key(|segment| segment.key);
        hits
    }

    fn hits<'a>(
        &'a self,
        bbox: &BoundingBox,
        active_only: bool,
    ) -> impl Iterator<Item = &'a LinkSegment> + 'a {
        let rect = bbox.to_rect();
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(rect))
            .filter_map(move |entry| self.segments.get(&entry.key))
            .filter(move |segment| !active_only || segment.is_active())
            .filter(move |segment| segment.geometry.intersects(&rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{line_segment, point_segment, retired};
    use rstest::{fixture, rstest};

    fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox::new(min_x, min_y, max_x, max_y).expect("valid bbox")
    }

    #[fixture]
    fn index() -> SegmentIndex {
        SegmentIndex::from_segments(vec![
            point_segment(2, 1, 5.0, 5.0),
            line_segment(1, 1, [(0.0, 0.0), (2.0, 2.0)]),
            retired(point_segment(3, 1, 1.0, 1.0)),
        ])
    }

    #[rstest]
    fn returns_hits_in_key_order(index: SegmentIndex) {
        let keys: Vec<_> = index
            .intersecting(&bbox(-10.0, -10.0, 10.0, 10.0), false)
            .into_iter()
            .map(|segment| segment.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                SegmentKey::new(1, 1),
                SegmentKey::new(2, 1),
                SegmentKey::new(3, 1)
            ]
        );
    }

    #[rstest]
    fn active_only_skips_retired_rows(index: SegmentIndex) {
        let hits = index.intersecting(&bbox(0.5, 0.5, 1.5, 1.5), true);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, SegmentKey::new(1, 1));
    }

    #[rstest]
    #[case(bbox(-10.0, -10.0, 10.0, 10.0), false, 3)]
    #[case(bbox(-10.0, -10.0, 10.0, 10.0), true, 2)]
    #[case(bbox(0.5, 0.5, 1.5, 1.5), false, 2)]
    #[case(bbox(20.0, 20.0, 30.0, 30.0), false, 0)]
    fn counts_agree_with_selected_rows(
        index: SegmentIndex,
        #[case] window: BoundingBox,
        #[case] active_only: bool,
        #[case] expected: usize,
    ) {
        assert_eq!(index.count_intersecting(&window, active_only), expected);
        assert_eq!(index.intersecting(&window, active_only).len(), expected);
    }

    #[rstest]
    fn excludes_lines_whose_envelope_overlaps_without_crossing() {
        let index =
            SegmentIndex::from_segments(vec![line_segment(1, 1, [(0.0, 0.0), (10.0, 10.0)])]);
        // The box sits inside the line's envelope but away from the diagonal.
        assert!(index.intersecting(&bbox(8.0, 0.0, 9.0, 1.0), true).is_empty());
    }

    #[rstest]
    fn upsert_moves_the_envelope(mut index: SegmentIndex) {
        index.upsert(point_segment(2, 1, 50.0, 50.0));
        assert_eq!(index.len(), 3);
        assert!(index.intersecting(&bbox(4.0, 4.0, 6.0, 6.0), true).is_empty());
        assert_eq!(
            index.intersecting(&bbox(49.0, 49.0, 51.0, 51.0), true).len(),
            1
        );
    }
}
