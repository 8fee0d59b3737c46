//! Worker pool and result aggregation for one entity kind.
//!
//! This is the heart of the extraction engine: N workers drain a
//! self-feeding [`OffsetScheduler`], each passing the shared rate limiter
//! before fetching one page and appending its records to the aggregator.
//!
//! # Termination protocol
//!
//! The upstream API returns a full page everywhere except the last page of
//! the collection, so a partial page (fewer records than the limit) is the
//! sole end-of-data signal for a stripe. The worker that observes it retires
//! the stripe and exits; the scheduler closes once every stripe has retired.
//! If the collection is small, workers seeded past the end of data receive
//! partial or empty pages immediately and the pool self-limits, at the cost
//! of up to N-1 probes into the gap.
//!
//! A page that fails outright is different: its offset is logged and
//! permanently skipped (no retry), and the stripe continues at its next
//! scheduled offset. A transient failure therefore leaves a silent gap in
//! the final collection — a documented tradeoff, inherited behavior. Note
//! the converse hazard: a transient error that produced a short but
//! well-formed page would be indistinguishable from end-of-data.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::fetcher::{Fetcher, PageRequest};
use super::scheduler::OffsetScheduler;
use crate::model::Entity;

/// Default worker count per entity kind.
pub const DEFAULT_WORKERS: usize = 3;

/// Default records per page.
pub const DEFAULT_PAGE_LIMIT: usize = 500;

/// Default cap on total page attempts per kind, guarding against an API
/// that fails persistently without ever returning a partial page.
pub const DEFAULT_MAX_PAGES: usize = 100_000;

/// Tuning knobs for one entity kind's extraction.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Number of concurrent workers (and stripes).
    pub workers: usize,
    /// Records requested per page.
    pub page_limit: usize,
    /// Upper bound on page attempts before the pool gives up.
    pub max_pages: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl FetchOptions {
    /// Creates options with the given worker count and page limit.
    #[must_use]
    pub fn new(workers: usize, page_limit: usize) -> Self {
        Self {
            workers,
            page_limit,
            ..Self::default()
        }
    }
}

/// Counters for one kind's extraction run. Updated concurrently by workers.
#[derive(Debug, Default)]
pub struct FetchStats {
    attempted: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl FetchStats {
    /// Creates a stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of page attempts started.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.attempted.load(Ordering::SeqCst)
    }

    /// Returns the number of pages fetched and decoded successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Returns the number of pages permanently skipped due to errors.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Reserves one page attempt, returning the count before this one.
    fn begin_page(&self) -> usize {
        self.attempted.fetch_add(1, Ordering::SeqCst)
    }

    fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records plus run counters for one entity kind.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    /// All records fetched, in arrival order (non-deterministic across runs).
    pub records: Vec<T>,
    /// Page-level counters for the run.
    pub stats: FetchStats,
}

/// Collects records from all workers of one entity kind.
///
/// Arrival order is whatever the workers produce; only the record *set* is
/// deterministic against a deterministic API.
#[derive(Debug)]
struct Aggregator<T> {
    records: std::sync::Mutex<Vec<T>>,
}

impl<T> Aggregator<T> {
    fn new() -> Self {
        Self {
            records: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn append(&self, mut page: Vec<T>) {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .append(&mut page);
    }

    /// Takes the collected records. Called once, after the pool has joined.
    fn drain(&self) -> Vec<T> {
        std::mem::take(
            &mut *self
                .records
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }
}

impl<T: Entity> Fetcher<T> {
    /// Fetches the entire collection of kind `T` with a pool of concurrent
    /// workers.
    ///
    /// Spawns `options.workers` tasks over one scheduler seeded with one
    /// offset per stripe, waits for every stripe to terminate, and returns
    /// the aggregated records. Per-page failures degrade to gaps in the
    /// result; they never fail the call. Cancellation makes workers exit
    /// promptly without enqueueing further offsets, returning whatever was
    /// collected so far.
    #[instrument(skip(self, options, cancel), fields(kind = T::KIND))]
    pub async fn fetch_all(
        &self,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> FetchOutcome<T> {
        let scheduler = Arc::new(OffsetScheduler::new(options.workers, options.page_limit));
        let aggregator = Arc::new(Aggregator::new());
        let stats = Arc::new(FetchStats::new());

        info!(
            workers = options.workers,
            page_limit = options.page_limit,
            "starting extraction"
        );

        let mut handles = Vec::with_capacity(options.workers);
        for worker in 0..options.workers {
            handles.push(tokio::spawn(run_worker(
                worker,
                self.clone(),
                Arc::clone(&scheduler),
                Arc::clone(&aggregator),
                Arc::clone(&stats),
                options.clone(),
                cancel.clone(),
            )));
        }

        for handle in handles {
            // A panicked worker is logged but doesn't fail the kind.
            if let Err(e) = handle.await {
                warn!(error = %e, "extraction worker panicked");
            }
        }

        let records = aggregator.drain();
        info!(
            records = records.len(),
            pages_succeeded = stats.succeeded(),
            pages_failed = stats.failed(),
            "extraction complete"
        );

        let stats = Arc::try_unwrap(stats).unwrap_or_else(|arc_stats| {
            // All workers have joined, so this branch is unreachable in
            // practice; rebuild from the atomic values if it ever isn't.
            let fresh = FetchStats::new();
            fresh
                .attempted
                .store(arc_stats.attempted(), Ordering::SeqCst);
            fresh
                .succeeded
                .store(arc_stats.succeeded(), Ordering::SeqCst);
            fresh.failed.store(arc_stats.failed(), Ordering::SeqCst);
            fresh
        });

        FetchOutcome { records, stats }
    }
}

/// One worker's loop: pull an offset, pass the limiter, fetch, append, and
/// either continue the stripe or retire it.
async fn run_worker<T: Entity>(
    worker: usize,
    fetcher: Fetcher<T>,
    scheduler: Arc<OffsetScheduler>,
    aggregator: Arc<Aggregator<T>>,
    stats: Arc<FetchStats>,
    options: FetchOptions,
    cancel: CancellationToken,
) {
    while let Some(offset) = scheduler.next().await {
        if stats.begin_page() >= options.max_pages {
            warn!(
                worker,
                offset,
                max_pages = options.max_pages,
                "page attempt cap reached; terminating stripe"
            );
            scheduler.complete_stripe();
            return;
        }

        if fetcher.limiter().wait(&cancel).await.is_err() {
            debug!(worker, offset, "cancelled while waiting for rate limiter");
            scheduler.complete_stripe();
            return;
        }

        let request = PageRequest::new(T::QUERY, offset, options.page_limit);
        let fetched = tokio::select! {
            () = cancel.cancelled() => {
                debug!(worker, offset, "cancelled mid-request");
                scheduler.complete_stripe();
                return;
            }
            result = fetcher.fetch_page(&request) => result,
        };

        match fetched {
            Ok(records) => {
                let count = records.len();
                stats.record_success();
                aggregator.append(records);
                debug!(worker, offset, count, "page fetched");

                if count < options.page_limit {
                    debug!(
                        worker,
                        offset, count, "partial page received; stripe terminated"
                    );
                    scheduler.complete_stripe();
                    return;
                }
                scheduler.push(offset + scheduler.stride());
            }
            Err(error) => {
                // No retry: the records at this offset are permanently lost.
                warn!(worker, offset, error = %error, "page fetch failed; offset skipped");
                stats.record_failure();
                scheduler.push(offset + scheduler.stride());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::AuthToken;
    use crate::extract::RateLimiter;
    use crate::model::{Entity, Genre};

    use std::collections::HashSet;

    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dataset(count: usize) -> Vec<Genre> {
        (0..count as u64)
            .map(|id| Genre {
                id,
                name: format!("genre-{id}"),
            })
            .collect()
    }

    /// Mounts one mock per page of `records`, plus an empty-page catch-all
    /// for probes past the end of data.
    async fn mount_pages(server: &MockServer, records: &[Genre], limit: usize) {
        let mut offset = 0;
        while offset <= records.len() {
            let page = &records[offset..records.len().min(offset + limit)];
            Mock::given(method("POST"))
                .and(path("/genres"))
                .and(body_string_contains(format!("offset {offset};")))
                .respond_with(ResponseTemplate::new(200).set_body_json(page))
                .mount(server)
                .await;
            offset += limit;
        }
        Mock::given(method("POST"))
            .and(path("/genres"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Genre>::new()))
            .with_priority(u8::MAX)
            .mount(server)
            .await;
    }

    fn test_fetcher(api_base: &str) -> Fetcher<Genre> {
        Fetcher::new(
            reqwest::Client::new(),
            api_base,
            "cid",
            AuthToken::for_tests("tok"),
            Arc::new(RateLimiter::new(10_000.0, 1)),
        )
    }

    /// Offsets of every page request the mock server saw.
    async fn requested_offsets(server: &MockServer) -> Vec<u64> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path().ends_with("/genres"))
            .map(|request| {
                let body = std::str::from_utf8(&request.body).unwrap();
                let tail = body.split("offset ").nth(1).unwrap();
                tail.trim_end_matches(';').trim().parse::<u64>().unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_exact_fit_collects_every_record() {
        // K=5, L=2, N=2: pages [2, 2, 1]; the stripe that sees the
        // one-record page terminates there.
        let server = MockServer::start().await;
        let records = dataset(5);
        mount_pages(&server, &records, 2).await;

        let outcome = test_fetcher(&server.uri())
            .fetch_all(&FetchOptions::new(2, 2), &CancellationToken::new())
            .await;

        assert_eq!(outcome.records.len(), 5);
        let ids: HashSet<u64> = outcome.records.iter().map(|g| g.id).collect();
        assert_eq!(ids, (0..5).collect());
        assert_eq!(outcome.stats.failed(), 0);
    }

    #[tokio::test]
    async fn test_terminates_for_various_worker_counts() {
        for workers in 1..=4 {
            let server = MockServer::start().await;
            let records = dataset(23);
            mount_pages(&server, &records, 5).await;

            let outcome = test_fetcher(&server.uri())
                .fetch_all(&FetchOptions::new(workers, 5), &CancellationToken::new())
                .await;

            assert_eq!(
                outcome.records.len(),
                23,
                "lost records with {workers} workers"
            );
            let ids: HashSet<u64> = outcome.records.iter().map(|g| g.id).collect();
            assert_eq!(ids.len(), 23, "duplicates with {workers} workers");
        }
    }

    #[tokio::test]
    async fn test_empty_collection_terminates_immediately() {
        let server = MockServer::start().await;
        mount_pages(&server, &[], 10).await;

        let outcome = test_fetcher(&server.uri())
            .fetch_all(&FetchOptions::new(3, 10), &CancellationToken::new())
            .await;

        assert!(outcome.records.is_empty());
        // One probe per stripe into the empty collection.
        assert_eq!(outcome.stats.attempted(), 3);
    }

    #[tokio::test]
    async fn test_offsets_are_striped_without_duplicates() {
        let server = MockServer::start().await;
        let records = dataset(20);
        mount_pages(&server, &records, 2).await;

        test_fetcher(&server.uri())
            .fetch_all(&FetchOptions::new(2, 2), &CancellationToken::new())
            .await;

        let offsets = requested_offsets(&server).await;
        let unique: HashSet<u64> = offsets.iter().copied().collect();
        assert_eq!(unique.len(), offsets.len(), "offset fetched twice: {offsets:?}");

        // Every multiple of L below the data length must have been visited.
        for expected in (0..20).step_by(2) {
            assert!(
                unique.contains(&expected),
                "offset {expected} skipped: {offsets:?}"
            );
        }

        // Each offset belongs to the stripe of its seed residue.
        for offset in &unique {
            assert_eq!(offset % 2, 0);
        }
    }

    #[tokio::test]
    async fn test_failed_page_leaves_gap_but_run_completes() {
        // K=10, L=2: the page at offset 4 fails; its two records are lost
        // and everything else is collected.
        let server = MockServer::start().await;
        let records = dataset(10);

        Mock::given(method("POST"))
            .and(path("/genres"))
            .and(body_string_contains("offset 4;"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_pages(&server, &records, 2).await;

        let outcome = test_fetcher(&server.uri())
            .fetch_all(&FetchOptions::new(2, 2), &CancellationToken::new())
            .await;

        assert_eq!(outcome.records.len(), 8);
        let ids: HashSet<u64> = outcome.records.iter().map(|g| g.id).collect();
        assert!(!ids.contains(&4) && !ids.contains(&5), "gap page leaked: {ids:?}");
        assert_eq!(outcome.stats.failed(), 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_yield_same_record_set() {
        let server = MockServer::start().await;
        let records = dataset(17);
        mount_pages(&server, &records, 4).await;

        let fetcher = test_fetcher(&server.uri());
        let options = FetchOptions::new(3, 4);
        let cancel = CancellationToken::new();

        let first: HashSet<u64> = fetcher
            .fetch_all(&options, &cancel)
            .await
            .records
            .iter()
            .map(|g| g.id)
            .collect();
        let second: HashSet<u64> = fetcher
            .fetch_all(&options, &cancel)
            .await
            .records
            .iter()
            .map(|g| g.id)
            .collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 17);
    }

    #[tokio::test]
    async fn test_first_page_partial_self_limits() {
        // Collection smaller than one page: every stripe probes once and
        // terminates on a partial or empty page.
        let server = MockServer::start().await;
        let records = dataset(3);
        mount_pages(&server, &records, 10).await;

        let outcome = test_fetcher(&server.uri())
            .fetch_all(&FetchOptions::new(3, 10), &CancellationToken::new())
            .await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.stats.attempted(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_workers_promptly() {
        let server = MockServer::start().await;
        let records = dataset(100);
        mount_pages(&server, &records, 2).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            test_fetcher(&server.uri()).fetch_all(&FetchOptions::new(2, 2), &cancel),
        )
        .await
        .expect("cancelled pool must still join");

        // Workers observed cancellation before fetching anything.
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.succeeded(), 0);
    }

    #[tokio::test]
    async fn test_max_pages_cap_halts_persistently_failing_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/genres"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut options = FetchOptions::new(2, 2);
        options.max_pages = 10;

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            test_fetcher(&server.uri()).fetch_all(&options, &CancellationToken::new()),
        )
        .await
        .expect("cap must terminate the pool");

        assert!(outcome.records.is_empty());
        assert!(outcome.stats.attempted() >= 10);
        assert!(outcome.stats.succeeded() == 0);
    }

    #[test]
    fn test_fetch_options_defaults() {
        let options = FetchOptions::default();
        assert_eq!(options.workers, DEFAULT_WORKERS);
        assert_eq!(options.page_limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(options.max_pages, DEFAULT_MAX_PAGES);
    }

    #[test]
    fn test_fetch_stats_counters() {
        let stats = FetchStats::new();
        stats.begin_page();
        stats.begin_page();
        stats.record_success();
        stats.record_failure();

        assert_eq!(stats.attempted(), 2);
        assert_eq!(stats.succeeded(), 1);
        assert_eq!(stats.failed(), 1);
    }

    #[test]
    fn test_query_constant_used_for_requests() {
        // The pool builds requests from the entity's own query template.
        assert!(Genre::QUERY.starts_with("fields "));
    }
}
