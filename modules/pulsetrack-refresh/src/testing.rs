//! Test doubles for the refresh pipeline's two trait boundaries:
//! - `MemoryStore` (MetricsStore) — stateful in-memory posts + flags
//! - `StubFetcher` (MetricsFetcher) — URL→outcome map with a call counter
//!
//! No network, no database, no Docker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulsetrack_common::{
    EngagementMetrics, FetchFailure, FetchOutcome, Platform, PostSnapshot, TrackedPost,
};

use crate::error::{RefreshError, Result};
use crate::fetchers::MetricsFetcher;
use crate::store::MetricsStore;

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory MetricsStore with the same due-for-refresh semantics as the
/// Postgres adapter. Builder pattern: `.with_post(..)`.
pub struct MemoryStore {
    posts: Mutex<Vec<TrackedPost>>,
    snapshots: Mutex<HashMap<Uuid, PostSnapshot>>,
    flags: Mutex<HashMap<Platform, DateTime<Utc>>>,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            snapshots: Mutex::new(HashMap::new()),
            flags: Mutex::new(HashMap::new()),
            fail_reads: false,
        }
    }

    /// A store whose reads fail, for exercising the fatal-abort path.
    pub fn unavailable() -> Self {
        Self {
            fail_reads: true,
            ..Self::new()
        }
    }

    pub fn with_post(self, post: TrackedPost) -> Self {
        self.posts.lock().unwrap().push(post);
        self
    }

    /// Latest snapshot written for a post, if any.
    pub fn snapshot_for(&self, id: Uuid) -> Option<PostSnapshot> {
        self.snapshots.lock().unwrap().get(&id).cloned()
    }

    pub fn post(&self, id: Uuid) -> Option<TrackedPost> {
        self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn posts_due_for_refresh(
        &self,
        staleness: Option<Duration>,
        limit: i64,
    ) -> Result<Vec<TrackedPost>> {
        if self.fail_reads {
            return Err(RefreshError::Other(anyhow!("store unavailable")));
        }

        let cutoff = staleness.map(|d| {
            Utc::now() - chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
        });

        let posts = self.posts.lock().unwrap();
        let mut due: Vec<TrackedPost> = posts
            .iter()
            .filter(|p| match (cutoff, p.last_refreshed_at) {
                (None, _) => true,
                (_, None) => true,
                (Some(cutoff), Some(refreshed)) => refreshed < cutoff,
            })
            .cloned()
            .collect();

        due.sort_by_key(|p| p.last_refreshed_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn record_snapshots(
        &self,
        snapshots: &[(Uuid, PostSnapshot)],
        refreshed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut posts = self.posts.lock().unwrap();
        let mut stored = self.snapshots.lock().unwrap();
        let mut written = 0;

        for (id, snapshot) in snapshots {
            if let Some(post) = posts.iter_mut().find(|p| p.id == *id) {
                post.metrics = snapshot.metrics;
                post.last_refreshed_at = Some(refreshed_at);
                stored.insert(*id, snapshot.clone());
                written += 1;
            }
        }

        Ok(written)
    }

    async fn rate_limit_reset(&self, platform: Platform) -> Result<Option<DateTime<Utc>>> {
        if self.fail_reads {
            return Err(RefreshError::Other(anyhow!("store unavailable")));
        }
        Ok(self.flags.lock().unwrap().get(&platform).copied())
    }

    async fn set_rate_limit_reset(
        &self,
        platform: Platform,
        reset_at: DateTime<Utc>,
    ) -> Result<()> {
        self.flags.lock().unwrap().insert(platform, reset_at);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StubFetcher
// ---------------------------------------------------------------------------

/// URL→outcome fetcher. Unregistered URLs yield `NotFound`. Counts calls so
/// tests can assert that skipped posts never reach the network layer.
pub struct StubFetcher {
    outcomes: HashMap<String, FetchOutcome>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on(mut self, url: &str, outcome: FetchOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsFetcher for StubFetcher {
    async fn fetch(&self, post: &TrackedPost) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .get(&post.url)
            .cloned()
            .unwrap_or(FetchOutcome::Failure(FetchFailure::NotFound))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A tracked post that has never been refreshed.
pub fn tracked_post(url: &str, platform: Option<Platform>) -> TrackedPost {
    TrackedPost {
        id: Uuid::new_v4(),
        url: url.to_string(),
        platform,
        metrics: EngagementMetrics::default(),
        last_refreshed_at: None,
    }
}

/// A snapshot with the given counters and no author metadata.
pub fn snapshot(views: u64, likes: u64, comments: u64, shares: u64) -> PostSnapshot {
    PostSnapshot {
        metrics: EngagementMetrics {
            views,
            likes,
            comments,
            shares,
        },
        ..PostSnapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn due_filter_matches_postgres_semantics() {
        let fresh = TrackedPost {
            last_refreshed_at: Some(Utc::now()),
            ..tracked_post("https://youtu.be/fresh000001", Some(Platform::Youtube))
        };
        let stale = TrackedPost {
            last_refreshed_at: Some(Utc::now() - chrono::Duration::hours(2)),
            ..tracked_post("https://youtu.be/stale000001", Some(Platform::Youtube))
        };
        let never = tracked_post("https://youtu.be/never000001", Some(Platform::Youtube));
        let (stale_id, never_id) = (stale.id, never.id);

        let store = MemoryStore::new()
            .with_post(fresh)
            .with_post(stale)
            .with_post(never);

        let due = store
            .posts_due_for_refresh(Some(Duration::from_secs(3600)), 20)
            .await
            .unwrap();

        let ids: Vec<Uuid> = due.iter().map(|p| p.id).collect();
        assert_eq!(due.len(), 2);
        assert!(ids.contains(&stale_id));
        assert!(ids.contains(&never_id));

        // Never-refreshed posts sort first, like NULLS FIRST in Postgres.
        assert_eq!(due[0].id, never_id);
    }

    #[tokio::test]
    async fn no_staleness_selects_everything_capped_by_limit() {
        let store = MemoryStore::new()
            .with_post(TrackedPost {
                last_refreshed_at: Some(Utc::now()),
                ..tracked_post("https://youtu.be/a0000000001", Some(Platform::Youtube))
            })
            .with_post(tracked_post("https://youtu.be/b0000000001", Some(Platform::Youtube)));

        assert_eq!(store.posts_due_for_refresh(None, 20).await.unwrap().len(), 2);
        assert_eq!(store.posts_due_for_refresh(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_snapshots_ignores_unknown_post_ids() {
        let post = tracked_post("https://youtu.be/c0000000001", Some(Platform::Youtube));
        let id = post.id;
        let store = MemoryStore::new().with_post(post);

        let written = store
            .record_snapshots(
                &[(id, snapshot(1, 2, 3, 4)), (Uuid::new_v4(), snapshot(9, 9, 9, 9))],
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(store.post(id).unwrap().metrics.views, 1);
    }
}
