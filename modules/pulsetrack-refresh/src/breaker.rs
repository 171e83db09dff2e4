//! Advisory per-platform circuit breaker backed by the store's rate-limit
//! flag. A tripped flag means "do not call this platform before `reset_at`";
//! its absence means no known restriction. The flag is never load-bearing:
//! store errors while reading or writing it degrade to "not blocked" so a
//! flaky flag table can only cost one wasted API call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use pulsetrack_common::Platform;

use crate::store::MetricsStore;

pub struct RateLimitBreaker {
    store: Arc<dyn MetricsStore>,
}

impl RateLimitBreaker {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Whether fetches for `platform` should be skipped at instant `now`.
    pub async fn is_open(&self, platform: Platform, now: DateTime<Utc>) -> bool {
        match self.store.rate_limit_reset(platform).await {
            Ok(reset_at) => flag_blocks(reset_at, now),
            Err(e) => {
                warn!(platform = %platform, error = %e, "Rate limit flag read failed, treating as not blocked");
                false
            }
        }
    }

    /// Persist a reset instant observed from a 429 response. Last writer wins.
    pub async fn trip(&self, platform: Platform, reset_at: DateTime<Utc>) {
        info!(platform = %platform, %reset_at, "Platform rate limit observed, tripping breaker");
        if let Err(e) = self.store.set_rate_limit_reset(platform, reset_at).await {
            warn!(platform = %platform, error = %e, "Failed to persist rate limit flag");
        }
    }
}

/// The flag blocks only while `now` is strictly before `reset_at`; it
/// self-expires after that with no cleanup write needed.
fn flag_blocks(reset_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match reset_at {
        Some(reset_at) => now < reset_at,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::testing::MemoryStore;

    #[test]
    fn absent_flag_never_blocks() {
        assert!(!flag_blocks(None, Utc::now()));
    }

    #[test]
    fn future_reset_blocks_past_reset_does_not() {
        let now = Utc::now();
        assert!(flag_blocks(Some(now + Duration::minutes(5)), now));
        assert!(!flag_blocks(Some(now - Duration::seconds(1)), now));
        assert!(!flag_blocks(Some(now), now));
    }

    #[tokio::test]
    async fn tripped_breaker_opens_until_reset_then_expires() {
        let store = Arc::new(MemoryStore::new());
        let breaker = RateLimitBreaker::new(store);
        let now = Utc::now();
        let reset_at = now + Duration::minutes(10);

        assert!(!breaker.is_open(Platform::X, now).await);

        breaker.trip(Platform::X, reset_at).await;
        assert!(breaker.is_open(Platform::X, now).await);
        assert!(!breaker.is_open(Platform::X, reset_at).await);

        // Flag is per-platform
        assert!(!breaker.is_open(Platform::Youtube, now).await);
    }
}
