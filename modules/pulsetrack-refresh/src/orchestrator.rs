//! Batch orchestrator: load due posts, gate on the circuit breaker, fan out
//! fetches concurrently, collect outcomes, persist successes. One post's
//! failure never aborts the rest; only store unavailability is fatal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use pulsetrack_common::{Config, FetchFailure, FetchOutcome, Platform, TrackedPost};

use crate::breaker::RateLimitBreaker;
use crate::error::Result;
use crate::fetchers::FetcherSet;
use crate::store::MetricsStore;

/// Counters reported by one refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Posts loaded into the working set.
    pub considered: usize,
    /// Posts whose refreshed metrics were persisted.
    pub succeeded: usize,
    /// Posts skipped by the circuit breaker this cycle (eligible next run).
    pub skipped: usize,
    /// Posts whose fetch or persistence failed.
    pub failed: usize,
}

pub struct Refresher {
    store: Arc<dyn MetricsStore>,
    fetchers: FetcherSet,
    breaker: RateLimitBreaker,
    staleness: Duration,
    batch_limit: i64,
    concurrency: usize,
}

impl Refresher {
    pub fn new(store: Arc<dyn MetricsStore>, fetchers: FetcherSet, config: &Config) -> Self {
        let breaker = RateLimitBreaker::new(Arc::clone(&store));
        Self {
            store,
            fetchers,
            breaker,
            staleness: config.staleness,
            batch_limit: config.batch_limit,
            concurrency: config.fetch_concurrency.max(1),
        }
    }

    /// Refresh the due-for-refresh set (the normal scheduled entry point).
    pub async fn run(&self) -> Result<RunStats> {
        self.run_with(Some(self.staleness)).await
    }

    /// Refresh every tracked post regardless of staleness.
    pub async fn run_all(&self) -> Result<RunStats> {
        self.run_with(None).await
    }

    async fn run_with(&self, staleness: Option<Duration>) -> Result<RunStats> {
        let mut stats = RunStats::default();

        let posts = self
            .store
            .posts_due_for_refresh(staleness, self.batch_limit)
            .await?;

        if posts.is_empty() {
            info!("No stale posts to refresh");
            return Ok(stats);
        }
        info!(count = posts.len(), "Loaded posts due for refresh");

        // One breaker read per run; the flag is advisory and rarely written.
        let now = Utc::now();
        let x_blocked = self.breaker.is_open(Platform::X, now).await;

        let mut to_fetch: Vec<(TrackedPost, Platform)> = Vec::new();
        for post in posts {
            stats.considered += 1;

            // Rows created before classification existed carry no platform.
            let platform = post.platform.or_else(|| Platform::from_url(&post.url));
            match platform {
                None => {
                    warn!(post_id = %post.id, url = post.url.as_str(), "Post URL matches no supported platform");
                    stats.failed += 1;
                }
                Some(Platform::X) if x_blocked => {
                    info!(post_id = %post.id, "X rate limit in effect, skipping this cycle");
                    stats.skipped += 1;
                }
                Some(platform) => to_fetch.push((post, platform)),
            }
        }

        let outcomes: Vec<(TrackedPost, FetchOutcome)> =
            stream::iter(to_fetch.into_iter().map(|(post, platform)| {
                let fetcher = self.fetchers.for_platform(platform);
                async move {
                    let outcome = fetcher.fetch(&post).await;
                    (post, outcome)
                }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut successes = Vec::new();
        let mut trip_at = None;
        for (post, outcome) in outcomes {
            match outcome {
                FetchOutcome::Success(snapshot) => successes.push((post.id, snapshot)),
                FetchOutcome::Failure(reason) => {
                    warn!(
                        post_id = %post.id,
                        url = post.url.as_str(),
                        reason = %reason,
                        "Fetch failed, keeping last known metrics"
                    );
                    if let FetchFailure::RateLimited {
                        reset_at: Some(reset_at),
                    } = reason
                    {
                        trip_at = Some(reset_at);
                    }
                    stats.failed += 1;
                }
            }
        }

        if let Some(reset_at) = trip_at {
            self.breaker.trip(Platform::X, reset_at).await;
        }

        if !successes.is_empty() {
            let written = self.store.record_snapshots(&successes, Utc::now()).await?;
            stats.succeeded = written;
            stats.failed += successes.len() - written;
        }

        info!(
            considered = stats.considered,
            succeeded = stats.succeeded,
            skipped = stats.skipped,
            failed = stats.failed,
            "Refresh run complete"
        );
        Ok(stats)
    }
}
