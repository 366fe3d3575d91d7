//! GeoJSON output for viewport responses.

use chrono::NaiveDate;
use geo::{Coord, Geometry, LineString};
use thiserror::Error;

use crate::LinkSegment;

/// A GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub struct FeatureCollection {
    /// Features in key order.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// A collection with no features.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A GeoJSON `Feature` describing one segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub struct Feature {
    /// Segment geometry, or its centroid for simplified features.
    pub geometry: GeoJsonGeometry,
    /// Segment attributes.
    pub properties: FeatureProperties,
}

impl Feature {
    /// Full-detail feature carrying every segment attribute.
    pub fn full(segment: &LinkSegment) -> Result<Self, UnsupportedGeometryError> {
        Ok(Self {
            geometry: GeoJsonGeometry::try_from(&segment.geometry)?,
            properties: FeatureProperties::Full(SegmentProperties::from(segment)),
        })
    }

    /// Centroid feature flagged with `isPoint`.
    pub fn simplified(segment: &LinkSegment) -> Result<Self, UnsupportedGeometryError> {
        Ok(Self {
            geometry: GeoJsonGeometry::try_from(&segment.geometry)?,
            properties: FeatureProperties::Simplified(SimplifiedProperties { is_point: true }),
        })
    }
}

/// Geometry shapes a segment can take.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub enum GeoJsonGeometry {
    /// Single position.
    Point {
        /// `[x, y]`.
        coordinates: [f64; 2],
    },
    /// Connected positions.
    LineString {
        /// `[x, y]` positions.
        coordinates: Vec<[f64; 2]>,
    },
    /// Several disconnected lines.
    MultiLineString {
        /// One position list per line.
        coordinates: Vec<Vec<[f64; 2]>>,
    },
}

/// A geometry variant that has no GeoJSON rendering in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("geometry type {kind} cannot be rendered as a segment feature")]
pub struct UnsupportedGeometryError {
    /// Name of the rejected variant.
    pub kind: &'static str,
}

const fn position(coord: Coord<f64>) -> [f64; 2] {
    [coord.x, coord.y]
}

fn positions(line: &LineString<f64>) -> Vec<[f64; 2]> {
    line.coords().copied().map(position).collect()
}

impl TryFrom<&Geometry<f64>> for GeoJsonGeometry {
    type Error = UnsupportedGeometryError;

    fn try_from(geometry: &Geometry<f64>) -> Result<Self, Self::Error> {
        let kind = match geometry {
            Geometry::Point(point) => {
                return Ok(Self::Point {
                    coordinates: position(point.0),
                });
            }
            Geometry::LineString(line) => {
                return Ok(Self::LineString {
                    coordinates: positions(line),
                });
            }
            Geometry::MultiLineString(lines) => {
                return Ok(Self::MultiLineString {
                    coordinates: lines.iter().map(positions).collect(),
                });
            }
            Geometry::Line(_) => "Line",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
            Geometry::Rect(_) => "Rect",
            Geometry::Triangle(_) => "Triangle",
        };
        Err(UnsupportedGeometryError { kind })
    }
}

/// Properties attached to a feature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FeatureProperties {
    /// Every segment attribute.
    Full(SegmentProperties),
    /// Marker for centroid features.
    Simplified(SimplifiedProperties),
}

/// Segment attributes carried by full-detail features.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SegmentProperties {
    /// Reference line identifier.
    pub sequence_id: i64,
    /// Segment number within the reference line.
    pub segment_number: i64,
    /// Relative start position.
    pub start_position: f64,
    /// Relative end position.
    pub end_position: f64,
    /// First day of validity.
    pub start_date: NaiveDate,
    /// Last day of validity, `null` while current.
    pub end_date: Option<NaiveDate>,
    /// Municipality code.
    pub municipality: u32,
    /// Length in metres.
    pub length: f64,
}

impl From<&LinkSegment> for SegmentProperties {
    fn from(segment: &LinkSegment) -> Self {
        Self {
            sequence_id: segment.key.sequence_id,
            segment_number: segment.key.segment_number,
            start_position: segment.start_position,
            end_position: segment.end_position,
            start_date: segment.start_date,
            end_date: segment.end_date,
            municipality: segment.municipality,
            length: segment.length,
        }
    }
}

/// Properties of a simplified centroid feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SimplifiedProperties {
    /// Always `true`.
    pub is_point: bool,
}
