//! Test utilities for segment feeds.
//!
//! [`StubSegmentFeed`] serves pages from an in-memory record list without
//! making HTTP requests. It records every request, can fail a chosen call and
//! can hold fetches behind a gate so tests observe a run mid-flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{FeedError, FeedGeometry, FeedRecord, FeedValidity, PageRequest, SegmentFeed};

/// Stub `SegmentFeed` for testing.
///
/// Pages hold the records whose key is strictly greater than the requested
/// start, in key order, truncated to the page size.
///
/// # Example
///
/// ```
/// use roadnet_core::SegmentKey;
/// use roadnet_data::feed::{FeedError, PageRequest, SegmentFeed};
/// use roadnet_data::feed::test_support::{StubSegmentFeed, feed_record};
///
/// let runtime = tokio::runtime::Runtime::new()?;
/// runtime.block_on(async {
///     let feed = StubSegmentFeed::with_records((1..=3).map(|n| feed_record(1, n, 0.0, 0.0)));
///     let page = feed
///         .fetch_page(&PageRequest { start: SegmentKey::new(1, 1), page_size: 10 })
///         .await?;
///     assert_eq!(page.len(), 2);
///     Ok::<(), FeedError>(())
/// })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct StubSegmentFeed {
    records: Mutex<Vec<FeedRecord>>,
    requests: Mutex<Vec<PageRequest>>,
    failure: Mutex<Option<(usize, FeedError)>>,
    inclusive_start: bool,
    gate: Option<Arc<Semaphore>>,
}

impl StubSegmentFeed {
    /// Create a feed serving `records`.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = FeedRecord>,
    {
        let feed = Self::default();
        feed.replace_records(records);
        feed
    }

    /// Treat the requested start as inclusive, repeating the cursor record.
    #[must_use]
    pub fn inclusive_start(mut self) -> Self {
        self.inclusive_start = true;
        self
    }

    /// Hold every fetch until a permit is added to the returned gate.
    #[must_use]
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Fail the `call`-th fetch (zero-based) with `error`.
    pub fn fail_on_call(&self, call: usize, error: FeedError) {
        *lock(&self.failure) = Some((call, error));
    }

    /// Swap the served records, as if the upstream dataset changed.
    pub fn replace_records<I>(&self, records: I)
    where
        I: IntoIterator<Item = FeedRecord>,
    {
        let mut sorted: Vec<_> = records.into_iter().collect();
        sorted.sort_by_key(FeedRecord::key);
        *lock(&self.records) = sorted;
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<PageRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl SegmentFeed for StubSegmentFeed {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<FeedRecord>, FeedError> {
        let call = {
            let mut requests = lock(&self.requests);
            requests.push(*request);
            requests.len() - 1
        };
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some((failing_call, error)) = lock(&self.failure).as_ref()
            && *failing_call == call
        {
            return Err(error.clone());
        }
        let limit = usize::try_from(request.page_size).unwrap_or(usize::MAX);
        Ok(lock(&self.records)
            .iter()
            .filter(|record| {
                if self.inclusive_start {
                    record.key() >= request.start
                } else {
                    record.key() > request.start
                }
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Current point record at `(x, y)` in municipality 301.
pub fn feed_record(sequence_id: i64, segment_number: i64, x: f64, y: f64) -> FeedRecord {
    FeedRecord {
        sequence_id,
        segment_number,
        start_position: 0.0,
        end_position: 1.0,
        validity: FeedValidity {
            start_date: "2020-01-01".to_owned(),
            end_date: None,
        },
        geometry: FeedGeometry {
            wkt: format!("POINT ({x} {y})"),
            srid: Some(5973),
        },
        municipality: 301,
        length: 0.0,
    }
}

/// Record whose geometry is not valid WKT.
pub fn malformed_record(sequence_id: i64, segment_number: i64) -> FeedRecord {
    FeedRecord {
        geometry: FeedGeometry {
            wkt: "LINESTRING (".to_owned(),
            srid: None,
        },
        ..feed_record(sequence_id, segment_number, 0.0, 0.0)
    }
}

/// `count` point records keyed `(sequence_id, 1..=count)`.
pub fn record_run(sequence_id: i64, count: i64) -> Vec<FeedRecord> {
    (1..=count)
        .map(|segment_number| feed_record(sequence_id, segment_number, 0.5, 0.5))
        .collect()
}
