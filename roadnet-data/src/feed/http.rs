//! HTTP client for the newline-delimited segment stream.
//!
//! Pages are requested as `GET {base}?start={seq}-{num}&antall={size}` and the
//! body is decoded one JSON record per line. No request timeout is applied
//! unless one is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use thiserror::Error;
use url::Url;

use super::{FeedError, FeedRecord, PageRequest, SegmentFeed};

/// Published stream of road-network link segments.
pub const DEFAULT_STREAM_URL: &str =
    "https://nvdbapiles.test.atlas.vegvesen.no/uberiket/api/v1/vegnett/veglenker/stream";

/// Default user agent for stream requests.
pub const DEFAULT_USER_AGENT: &str = "roadnet-replica/0.1";

const NDJSON: &str = "application/x-ndjson";

/// Errors raised while constructing an [`HttpSegmentFeed`].
#[derive(Debug, Error)]
pub enum FeedBuildError {
    /// The base URL did not parse.
    #[error("invalid feed URL '{url}': {source}")]
    InvalidUrl {
        /// Configured base URL.
        url: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration for [`HttpSegmentFeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSegmentFeedConfig {
    /// Stream endpoint.
    pub base_url: String,
    /// Optional per-request timeout.
    pub timeout: Option<Duration>,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpSegmentFeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STREAM_URL.to_owned(),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpSegmentFeedConfig {
    /// Create a configuration for the given endpoint.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set a request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// [`SegmentFeed`] backed by the HTTP stream endpoint.
#[derive(Debug, Clone)]
pub struct HttpSegmentFeed {
    client: Client,
    base_url: Url,
}

impl HttpSegmentFeed {
    /// Create a feed for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedBuildError> {
        Self::with_config(HttpSegmentFeedConfig::new(base_url))
    }

    /// Create a feed with explicit configuration.
    pub fn with_config(config: HttpSegmentFeedConfig) -> Result<Self, FeedBuildError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|source| FeedBuildError::InvalidUrl {
                url: config.base_url.clone(),
                source,
            })?;
        let mut builder = Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.connect_timeout(timeout).timeout(timeout);
        }
        let client = builder.build().map_err(FeedBuildError::HttpClient)?;
        Ok(Self { client, base_url })
    }

    fn page_url(&self, request: &PageRequest) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("start", &request.start.to_string())
            .append_pair("antall", &request.page_size.to_string());
        url
    }
}

#[async_trait]
impl SegmentFeed for HttpSegmentFeed {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<FeedRecord>, FeedError> {
        let url = self.page_url(request);
        log::debug!("requesting segment page {url}");
        let body = self
            .client
            .get(url.clone())
            .header(ACCEPT, NDJSON)
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, url.as_str()))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(&err, url.as_str()))?
            .text()
            .await
            .map_err(|err| convert_reqwest_error(&err, url.as_str()))?;
        parse_page(url.as_str(), &body)
    }
}

/// Decode a newline-delimited page body, skipping blank lines.
fn parse_page(url: &str, body: &str) -> Result<Vec<FeedRecord>, FeedError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|err| FeedError::Decode {
                url: url.to_owned(),
                line: index + 1,
                message: err.to_string(),
            })
        })
        .collect()
}

fn convert_reqwest_error(error: &reqwest::Error, url: &str) -> FeedError {
    if error.is_timeout() {
        return FeedError::Timeout {
            url: url.to_owned(),
        };
    }

    if let Some(status) = error.status() {
        return FeedError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    FeedError::Network {
        url: url.to_owned(),
        message: error.to_string(),
    }
}
