//! Wire format of one record in the upstream segment stream.

use chrono::NaiveDate;
use geo::Geometry;
use roadnet_core::{LinkSegment, LinkSegmentError, LinkSegmentParts, SegmentKey};
use serde::Deserialize;
use thiserror::Error;
use wkt::TryFromWkt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One newline-delimited record as published by the road-network API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedRecord {
    /// Reference line identifier.
    #[serde(rename = "veglenkesekvensId")]
    pub sequence_id: i64,
    /// Segment number within the reference line.
    #[serde(rename = "veglenkenummer")]
    pub segment_number: i64,
    /// Relative start position.
    #[serde(rename = "startposisjon")]
    pub start_position: f64,
    /// Relative end position.
    #[serde(rename = "sluttposisjon")]
    pub end_position: f64,
    /// Validity window.
    #[serde(rename = "gyldighetsperiode")]
    pub validity: FeedValidity,
    /// Geometry payload.
    #[serde(rename = "geometri")]
    pub geometry: FeedGeometry,
    /// Municipality code.
    #[serde(rename = "kommune")]
    pub municipality: u32,
    /// Length in metres.
    #[serde(rename = "lengde")]
    pub length: f64,
}

/// Validity window of a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedValidity {
    /// First day of validity, `YYYY-MM-DD`.
    #[serde(rename = "startdato")]
    pub start_date: String,
    /// Last day of validity, absent while current.
    #[serde(rename = "sluttdato", default)]
    pub end_date: Option<String>,
}

/// Geometry of a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedGeometry {
    /// Well-known text, possibly with Z ordinates.
    pub wkt: String,
    /// Spatial reference identifier.
    #[serde(default)]
    pub srid: Option<u32>,
}

/// Reasons a record cannot become a [`LinkSegment`].
#[derive(Debug, Error)]
pub enum RecordParseError {
    /// The WKT string did not parse into a geometry.
    #[error("segment {key} has unreadable geometry: {message}")]
    Geometry {
        /// Key of the offending record.
        key: SegmentKey,
        /// Parser message.
        message: String,
    },
    /// A date did not match `YYYY-MM-DD`.
    #[error("segment {key} has malformed {field} '{value}'")]
    Date {
        /// Key of the offending record.
        key: SegmentKey,
        /// Name of the date field.
        field: &'static str,
        /// Value that was supplied.
        value: String,
        /// Parser failure.
        #[source]
        source: chrono::ParseError,
    },
    /// The parsed attributes failed segment validation.
    #[error(transparent)]
    Segment(#[from] LinkSegmentError),
}

impl FeedRecord {
    /// Composite key of the record.
    #[must_use]
    pub const fn key(&self) -> SegmentKey {
        SegmentKey::new(self.sequence_id, self.segment_number)
    }

    /// Convert into a validated [`LinkSegment`].
    ///
    /// Z and M ordinates are discarded.
    pub fn into_segment(self) -> Result<LinkSegment, RecordParseError> {
        let key = self.key();
        let geometry = Geometry::<f64>::try_from_wkt_str(&self.geometry.wkt).map_err(|err| {
            RecordParseError::Geometry {
                key,
                message: err.to_string(),
            }
        })?;
        let start_date = parse_date(key, "startdato", &self.validity.start_date)?;
        let end_date = self
            .validity
            .end_date
            .as_deref()
            .map(|value| parse_date(key, "sluttdato", value))
            .transpose()?;
        Ok(LinkSegment::new(LinkSegmentParts {
            key,
            start_position: self.start_position,
            end_position: self.end_position,
            start_date,
            end_date,
            geometry,
            municipality: self.municipality,
            length: self.length,
        })?)
    }
}

fn parse_date(
    key: SegmentKey,
    field: &'static str,
    value: &str,
) -> Result<NaiveDate, RecordParseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| RecordParseError::Date {
        key,
        field,
        value: value.to_owned(),
        source,
    })
}
