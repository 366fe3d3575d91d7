//! Viewport bounding boxes.

use geo::{Coord, Rect};
use thiserror::Error;

/// Axis-aligned viewport in the store's local coordinate system.
///
/// Boundary points count as inside the box, so a degenerate box with
/// `min == max` still matches geometries passing through that point.
///
/// # Examples
///
/// ```
/// use roadnet_core::BoundingBox;
///
/// # fn main() -> Result<(), roadnet_core::BoundingBoxError> {
/// let bbox = BoundingBox::new(0.0, 0.0, 10.0, 5.0)?;
/// assert_eq!(bbox.max_x(), 10.0);
/// assert!(BoundingBox::new(10.0, 0.0, 0.0, 5.0).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

/// Reasons a bounding box is rejected before any store access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundingBoxError {
    /// A corner coordinate was NaN or infinite.
    #[error("bounding box coordinate {axis} is not finite")]
    NonFinite {
        /// Name of the offending coordinate.
        axis: &'static str,
    },
    /// A minimum exceeded its maximum.
    #[error("bounding box {axis} range is inverted: {min} > {max}")]
    Inverted {
        /// Axis whose range is inverted.
        axis: &'static str,
        /// Supplied minimum.
        min: f64,
        /// Supplied maximum.
        max: f64,
    },
}

impl BoundingBox {
    /// Validate and construct a bounding box.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, BoundingBoxError> {
        for (axis, value) in [
            ("minX", min_x),
            ("minY", min_y),
            ("maxX", max_x),
            ("maxY", max_y),
        ] {
            if !value.is_finite() {
                return Err(BoundingBoxError::NonFinite { axis });
            }
        }
        if min_x > max_x {
            return Err(BoundingBoxError::Inverted {
                axis: "x",
                min: min_x,
                max: max_x,
            });
        }
        if min_y > max_y {
            return Err(BoundingBoxError::Inverted {
                axis: "y",
                min: min_y,
                max: max_y,
            });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Smallest x coordinate.
    #[must_use]
    pub const fn min_x(&self) -> f64 {
        self.min_x
    }

    /// Smallest y coordinate.
    #[must_use]
    pub const fn min_y(&self) -> f64 {
        self.min_y
    }

    /// Largest x coordinate.
    #[must_use]
    pub const fn max_x(&self) -> f64 {
        self.max_x
    }

    /// Largest y coordinate.
    #[must_use]
    pub const fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Convert into a `geo` rectangle for intersection predicates.
    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn accepts_degenerate_box() {
        let bbox = BoundingBox::new(0.0, 0.0, 0.0, 0.0).expect("degenerate box is valid");
        assert_eq!(bbox.to_rect().min(), bbox.to_rect().max());
    }

    #[rstest]
    #[case(1.0, 0.0, 0.0, 1.0, "x")]
    #[case(0.0, 1.0, 1.0, 0.0, "y")]
    fn rejects_inverted_ranges(
        #[case] min_x: f64,
        #[case] min_y: f64,
        #[case] max_x: f64,
        #[case] max_y: f64,
        #[case] expected_axis: &str,
    ) {
        let err = BoundingBox::new(min_x, min_y, max_x, max_y).expect_err("inverted box");
        match err {
            BoundingBoxError::Inverted { axis, .. } => assert_eq!(axis, expected_axis),
            other => panic!("expected inverted error, got {other:?}"),
        }
    }

    #[rstest]
    #[case(f64::NAN, 0.0, 1.0, 1.0)]
    #[case(0.0, f64::NEG_INFINITY, 1.0, 1.0)]
    #[case(0.0, 0.0, f64::INFINITY, 1.0)]
    fn rejects_non_finite_corners(
        #[case] min_x: f64,
        #[case] min_y: f64,
        #[case] max_x: f64,
        #[case] max_y: f64,
    ) {
        let err = BoundingBox::new(min_x, min_y, max_x, max_y).expect_err("non-finite box");
        assert!(matches!(err, BoundingBoxError::NonFinite { .. }));
    }
}
