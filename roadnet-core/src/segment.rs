//! Versioned road-network link segments and their composite keys.

use std::fmt;

use chrono::NaiveDate;
use geo::{BoundingRect, CoordsIter, Geometry, Rect};
use thiserror::Error;

/// Composite identity of a [`LinkSegment`].
///
/// Keys order lexicographically by `sequence_id` and then by
/// `segment_number`, matching the order in which the upstream feed streams
/// segments. The same type doubles as the resumable sync cursor.
///
/// # Examples
///
/// ```
/// use roadnet_core::SegmentKey;
///
/// let earlier = SegmentKey::new(41, 9);
/// let later = SegmentKey::new(42, 1);
/// assert!(earlier < later);
/// assert_eq!(SegmentKey::ORIGIN, SegmentKey::new(0, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SegmentKey {
    /// Identifier of the reference line the segment belongs to.
    pub sequence_id: i64,
    /// Position of the segment within its reference line.
    pub segment_number: i64,
}

impl SegmentKey {
    /// Cursor position used before anything has been ingested.
    pub const ORIGIN: Self = Self::new(0, 0);

    /// Construct a key from its two components.
    #[must_use]
    pub const fn new(sequence_id: i64, segment_number: i64) -> Self {
        Self {
            sequence_id,
            segment_number,
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.sequence_id, self.segment_number)
    }
}

/// A versioned stretch of road network between two reference points.
///
/// Geometry is two-dimensional and expressed in the dataset's fixed local
/// coordinate system. A segment with no `end_date` is currently valid;
/// superseded versions keep their row and gain an `end_date`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkSegment {
    /// Composite primary key.
    pub key: SegmentKey,
    /// Relative start position along the sequence, in `0.0..=1.0`.
    pub start_position: f64,
    /// Relative end position along the sequence, in `0.0..=1.0`.
    pub end_position: f64,
    /// First day the segment is valid.
    pub start_date: NaiveDate,
    /// Last day of validity, or `None` while the segment is current.
    pub end_date: Option<NaiveDate>,
    /// Point, line or multi-line geometry.
    pub geometry: Geometry<f64>,
    /// Municipality code.
    pub municipality: u32,
    /// Length in metres.
    pub length: f64,
}

/// Errors returned by [`LinkSegment::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkSegmentError {
    /// The geometry is neither a point nor a (multi-)line.
    #[error("segment {key} has unsupported geometry type {kind}")]
    UnsupportedGeometry {
        /// Key of the rejected segment.
        key: SegmentKey,
        /// Name of the geometry variant that was supplied.
        kind: &'static str,
    },
    /// The geometry has no coordinates.
    #[error("segment {key} has an empty geometry")]
    EmptyGeometry {
        /// Key of the rejected segment.
        key: SegmentKey,
    },
    /// A coordinate was NaN or infinite.
    #[error("segment {key} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Key of the rejected segment.
        key: SegmentKey,
    },
    /// A relative position fell outside `0.0..=1.0`.
    #[error("segment {key} has {field} {value} outside 0..=1")]
    PositionOutOfRange {
        /// Key of the rejected segment.
        key: SegmentKey,
        /// Name of the offending field.
        field: &'static str,
        /// Value that was supplied.
        value: f64,
    },
    /// The start position lies after the end position.
    #[error("segment {key} starts at {start_position} after its end at {end_position}")]
    PositionsReversed {
        /// Key of the rejected segment.
        key: SegmentKey,
        /// Supplied start position.
        start_position: f64,
        /// Supplied end position.
        end_position: f64,
    },
    /// The validity period ends before it starts.
    #[error("segment {key} validity ends on {end_date} before it starts on {start_date}")]
    ValidityReversed {
        /// Key of the rejected segment.
        key: SegmentKey,
        /// First day of validity.
        start_date: NaiveDate,
        /// Supplied last day of validity.
        end_date: NaiveDate,
    },
    /// The length was negative or not finite.
    #[error("segment {key} has invalid length {length}")]
    InvalidLength {
        /// Key of the rejected segment.
        key: SegmentKey,
        /// Value that was supplied.
        length: f64,
    },
}

/// Unvalidated attributes used to build a [`LinkSegment`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSegmentParts {
    /// Composite primary key.
    pub key: SegmentKey,
    /// Relative start position along the sequence.
    pub start_position: f64,
    /// Relative end position along the sequence.
    pub end_position: f64,
    /// First day of validity.
    pub start_date: NaiveDate,
    /// Last day of validity.
    pub end_date: Option<NaiveDate>,
    /// Segment geometry.
    pub geometry: Geometry<f64>,
    /// Municipality code.
    pub municipality: u32,
    /// Length in metres.
    pub length: f64,
}

impl LinkSegment {
    /// Validate `parts` and construct a segment.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use geo::{Geometry, LineString};
    /// use roadnet_core::{LinkSegment, LinkSegmentParts, SegmentKey};
    ///
    /// # fn main() -> Result<(), roadnet_core::LinkSegmentError> {
    /// let segment = LinkSegment::new(LinkSegmentParts {
    ///     key: SegmentKey::new(1, 1),
    ///     start_position: 0.0,
    ///     end_position: 1.0,
    ///     start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
    ///     end_date: None,
    ///     geometry: Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)])),
    ///     municipality: 301,
    ///     length: 10.0,
    /// })?;
    /// assert!(segment.is_active());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(parts: LinkSegmentParts) -> Result<Self, LinkSegmentError> {
        let key = parts.key;
        validate_geometry(key, &parts.geometry)?;
        validate_position(key, "start_position", parts.start_position)?;
        validate_position(key, "end_position", parts.end_position)?;
        if parts.start_position > parts.end_position {
            return Err(LinkSegmentError::PositionsReversed {
                key,
                start_position: parts.start_position,
                end_position: parts.end_position,
            });
        }
        if let Some(end_date) = parts.end_date
            && end_date < parts.start_date
        {
            return Err(LinkSegmentError::ValidityReversed {
                key,
                start_date: parts.start_date,
                end_date,
            });
        }
        if !parts.length.is_finite() || parts.length < 0.0 {
            return Err(LinkSegmentError::InvalidLength {
                key,
                length: parts.length,
            });
        }
        Ok(Self {
            key,
            start_position: parts.start_position,
            end_position: parts.end_position,
            start_date: parts.start_date,
            end_date: parts.end_date,
            geometry: parts.geometry,
            municipality: parts.municipality,
            length: parts.length,
        })
    }

    /// Whether the segment is currently valid (it has no end date).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.end_date.is_none()
    }

    /// Axis-aligned bounds of the geometry.
    ///
    /// Returns `None` only for empty geometries, which [`LinkSegment::new`]
    /// rejects.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

fn validate_geometry(key: SegmentKey, geometry: &Geometry<f64>) -> Result<(), LinkSegmentError> {
    let kind = match geometry {
        Geometry::Point(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => None,
        Geometry::Line(_) => Some("Line"),
        Geometry::Polygon(_) => Some("Polygon"),
        Geometry::MultiPoint(_) => Some("MultiPoint"),
        Geometry::MultiPolygon(_) => Some("MultiPolygon"),
        Geometry::GeometryCollection(_) => Some("GeometryCollection"),
        Geometry::Rect(_) => Some("Rect"),
        Geometry::Triangle(_) => Some("Triangle"),
    };
    if let Some(kind) = kind {
        return Err(LinkSegmentError::UnsupportedGeometry { key, kind });
    }
    if geometry.coords_count() == 0 {
        return Err(LinkSegmentError::EmptyGeometry { key });
    }
    if geometry
        .coords_iter()
        .any(|coord| !coord.x.is_finite() || !coord.y.is_finite())
    {
        return Err(LinkSegmentError::NonFiniteCoordinate { key });
    }
    Ok(())
}

fn validate_position(
    key: SegmentKey,
    field: &'static str,
    value: f64,
) -> Result<(), LinkSegmentError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LinkSegmentError::PositionOutOfRange { key, field, value })
    }
}
