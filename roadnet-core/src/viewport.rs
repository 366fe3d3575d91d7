//! Density-adaptive viewport queries.
//!
//! A query first counts the active segments intersecting the viewport and
//! then picks a response shape from the count:
//!
//! | count                               | response                      |
//! |-------------------------------------|-------------------------------|
//! | `> hard_cap`                        | empty collection              |
//! | `> dense_threshold`, `<= hard_cap`  | centroid points (`isPoint`)   |
//! | `<= dense_threshold`                | full geometry and attributes  |
//!
//! Both thresholds are exclusive, so a count equal to a threshold stays in
//! the lower band.

use thiserror::Error;

use crate::geojson::{Feature, FeatureCollection, UnsupportedGeometryError};
use crate::{BoundingBox, LinkSegment, SegmentStore, StoreError};

/// Thresholds selecting the response shape.
///
/// # Examples
///
/// ```
/// use roadnet_core::{ViewportConfig, ViewportConfigError};
///
/// let config = ViewportConfig::default();
/// assert_eq!(config.dense_threshold(), 10_000);
/// assert_eq!(config.hard_cap(), 100_000);
/// assert!(matches!(
///     ViewportConfig::new(10, 5),
///     Err(ViewportConfigError::ThresholdAboveCap { .. })
/// ));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportConfig {
    dense_threshold: usize,
    hard_cap: usize,
}

/// Rejected threshold combinations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewportConfigError {
    /// The hard cap was zero.
    #[error("viewport hard cap must be positive")]
    ZeroCap,
    /// The dense threshold exceeded the hard cap.
    #[error("dense threshold {dense_threshold} exceeds hard cap {hard_cap}")]
    ThresholdAboveCap {
        /// Supplied dense threshold.
        dense_threshold: usize,
        /// Supplied hard cap.
        hard_cap: usize,
    },
}

impl ViewportConfig {
    /// Default count above which centroids replace full geometry.
    pub const DEFAULT_DENSE_THRESHOLD: usize = 10_000;
    /// Default count above which the response is empty.
    pub const DEFAULT_HARD_CAP: usize = 100_000;

    /// Validate and construct a configuration.
    pub const fn new(dense_threshold: usize, hard_cap: usize) -> Result<Self, ViewportConfigError> {
        if hard_cap == 0 {
            return Err(ViewportConfigError::ZeroCap);
        }
        if dense_threshold > hard_cap {
            return Err(ViewportConfigError::ThresholdAboveCap {
                dense_threshold,
                hard_cap,
            });
        }
        Ok(Self {
            dense_threshold,
            hard_cap,
        })
    }

    /// Count above which centroids replace full geometry.
    #[must_use]
    pub const fn dense_threshold(&self) -> usize {
        self.dense_threshold
    }

    /// Count above which the response is empty.
    #[must_use]
    pub const fn hard_cap(&self) -> usize {
        self.hard_cap
    }

    /// Response shape for `count` intersecting segments.
    #[must_use]
    pub const fn classify(&self, count: usize) -> Density {
        if count > self.hard_cap {
            Density::OverCap
        } else if count > self.dense_threshold {
            Density::Dense
        } else {
            Density::Sparse
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            dense_threshold: Self::DEFAULT_DENSE_THRESHOLD,
            hard_cap: Self::DEFAULT_HARD_CAP,
        }
    }
}

/// Density band of a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    /// Full features are returned.
    Sparse,
    /// Centroid points are returned.
    Dense,
    /// Nothing is returned.
    OverCap,
}

/// Failures while answering a viewport query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The store failed to count or select segments.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A stored segment could not be rendered.
    #[error(transparent)]
    Geometry(#[from] UnsupportedGeometryError),
}

/// Answers viewport queries against a [`SegmentStore`].
#[derive(Debug, Clone)]
pub struct ViewportQueryEngine<S> {
    store: S,
    config: ViewportConfig,
}

impl<S: SegmentStore> ViewportQueryEngine<S> {
    /// Create an engine over `store`.
    pub const fn new(store: S, config: ViewportConfig) -> Self {
        Self { store, config }
    }

    /// Thresholds in use.
    pub const fn config(&self) -> ViewportConfig {
        self.config
    }

    /// Return the active segments intersecting `bbox` shaped by density.
    ///
    /// Only currently valid segments are counted and returned.
    pub fn query(&self, bbox: &BoundingBox) -> Result<FeatureCollection, QueryError> {
        let count = self.store.count_intersecting(bbox, true)?;
        let density = self.config.classify(count);
        log::debug!("viewport {bbox:?} holds {count} active segments ({density:?})");
        match density {
            Density::OverCap => Ok(FeatureCollection::empty()),
            Density::Dense => {
                let rows = self.store.select_intersecting(bbox, true, true)?;
                collect_features(&rows, Feature::simplified)
            }
            Density::Sparse => {
                let rows = self.store.select_intersecting(bbox, true, false)?;
                collect_features(&rows, Feature::full)
            }
        }
    }
}

fn collect_features(
    rows: &[LinkSegment],
    render: fn(&LinkSegment) -> Result<Feature, UnsupportedGeometryError>,
) -> Result<FeatureCollection, QueryError> {
    let features = rows.iter().map(render).collect::<Result<Vec<_>, _>>()?;
    Ok(FeatureCollection { features })
}
