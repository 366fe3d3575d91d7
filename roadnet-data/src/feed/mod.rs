//! Paged access to the upstream road-network segment stream.
//!
//! The stream is sorted by `(sequence_id, segment_number)` and is read in
//! pages starting after a cursor. An empty page marks the end of the stream.
//! [`HttpSegmentFeed`] reads the published newline-delimited JSON endpoint;
//! tests use the stub in [`test_support`].

mod http;
mod record;

#[doc(hidden)]
pub mod test_support;

use async_trait::async_trait;
use roadnet_core::SegmentKey;
use thiserror::Error;

pub use http::{
    DEFAULT_STREAM_URL, DEFAULT_USER_AGENT, FeedBuildError, HttpSegmentFeed, HttpSegmentFeedConfig,
};
pub use record::{FeedGeometry, FeedRecord, FeedValidity, RecordParseError};

/// Request for one page of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Cursor the page starts from.
    pub start: SegmentKey,
    /// Maximum number of records to return.
    pub page_size: u32,
}

/// Failures while fetching a page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The endpoint answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Client error message.
        message: String,
    },
    /// The request did not complete.
    #[error("request to {url} failed: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Client error message.
        message: String,
    },
    /// The request exceeded the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },
    /// A line of the body was not a valid record.
    #[error("line {line} of {url} is not a valid record: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// One-based line number within the page.
        line: usize,
        /// Decoder message.
        message: String,
    },
}

/// Source of paged segment records.
#[async_trait]
pub trait SegmentFeed: Send + Sync {
    /// Fetch the page starting at `request.start`.
    ///
    /// Re-requesting an earlier start returns the same or newer records.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<FeedRecord>, FeedError>;
}

#[async_trait]
impl<T: SegmentFeed + ?Sized> SegmentFeed for std::sync::Arc<T> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<FeedRecord>, FeedError> {
        (**self).fetch_page(request).await
    }
}
