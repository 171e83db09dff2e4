//! Instagram fetcher. No public metrics API exists, so this goes through the
//! Apify instagram-scraper actor: submit a run for the post URL, poll on a
//! bounded budget, read the dataset. Anything that prevents a real result
//! degrades to a placeholder snapshot — an unreachable scraper must never
//! fail the batch.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use apify_client::{ApifyClient, PostScrapeInput, ScrapedPost};
use pulsetrack_common::{EngagementMetrics, FetchOutcome, PostSnapshot, TrackedPost};

use super::MetricsFetcher;

/// Status poll budget for one scrape run: 30 attempts, 1 s apart.
const MAX_POLL_ATTEMPTS: u32 = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

const PLACEHOLDER_USERNAME: &str = "Instagram User";

/// Matches the shortcode segment of post and reel URLs.
static RE_SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:p|reel)/([^/?#]+)").unwrap());

pub struct InstagramFetcher {
    client: Option<ApifyClient>,
    session_id: Option<String>,
}

impl InstagramFetcher {
    pub fn new(apify_token: Option<String>, session_id: Option<String>) -> Self {
        Self {
            client: apify_token.map(ApifyClient::new),
            session_id,
        }
    }
}

#[async_trait]
impl MetricsFetcher for InstagramFetcher {
    async fn fetch(&self, post: &TrackedPost) -> FetchOutcome {
        let (Some(client), Some(session_id)) = (&self.client, self.session_id.as_deref()) else {
            debug!(
                url = post.url.as_str(),
                "Apify token or Instagram session not configured, using placeholder"
            );
            return FetchOutcome::Success(placeholder_snapshot(&post.url));
        };

        let input = PostScrapeInput::single_post(&post.url, session_id);
        let result = client
            .scrape_post(&input, MAX_POLL_ATTEMPTS, POLL_INTERVAL)
            .await;

        outcome_from_scrape(result, &post.url)
    }
}

/// Turn a scrape attempt into an outcome. Every failure mode, including a run
/// that never finished within the poll budget, degrades to the placeholder.
pub(crate) fn outcome_from_scrape(
    result: apify_client::Result<Vec<ScrapedPost>>,
    url: &str,
) -> FetchOutcome {
    let items = match result {
        Ok(items) => items,
        Err(e) => {
            warn!(url, error = %e, "Instagram scrape failed, using placeholder");
            return FetchOutcome::Success(placeholder_snapshot(url));
        }
    };

    match items.into_iter().next() {
        Some(scraped) => FetchOutcome::Success(snapshot_from_scraped(scraped)),
        None => {
            warn!(url, "Instagram scrape returned no items, using placeholder");
            FetchOutcome::Success(placeholder_snapshot(url))
        }
    }
}

/// Degraded result when the scraper is unavailable or empty-handed: generic
/// username, best-effort thumbnail guessed from the post shortcode, zeros.
pub(crate) fn placeholder_snapshot(url: &str) -> PostSnapshot {
    PostSnapshot {
        metrics: EngagementMetrics::default(),
        author_username: Some(PLACEHOLDER_USERNAME.to_string()),
        thumbnail_url: extract_shortcode(url)
            .map(|code| format!("https://instagram.com/p/{code}/media/?size=m")),
        posted_at: None,
    }
}

pub(crate) fn snapshot_from_scraped(scraped: ScrapedPost) -> PostSnapshot {
    PostSnapshot {
        metrics: EngagementMetrics {
            views: clamp(scraped.views()),
            likes: clamp(scraped.likes_count.unwrap_or(0)),
            comments: clamp(scraped.comments_count.unwrap_or(0)),
            shares: 0,
        },
        author_username: scraped
            .author()
            .map(String::from)
            .or_else(|| Some(PLACEHOLDER_USERNAME.to_string())),
        thumbnail_url: scraped.thumbnail().map(String::from),
        posted_at: scraped.timestamp,
    }
}

pub(crate) fn extract_shortcode(url: &str) -> Option<&str> {
    RE_SHORTCODE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn clamp(v: i64) -> u64 {
    v.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use apify_client::ApifyError;
    use pulsetrack_common::Platform;
    use uuid::Uuid;

    fn post(url: &str) -> TrackedPost {
        TrackedPost {
            id: Uuid::new_v4(),
            url: url.to_string(),
            platform: Some(Platform::Instagram),
            metrics: EngagementMetrics::default(),
            last_refreshed_at: None,
        }
    }

    #[test]
    fn extracts_shortcode_from_post_and_reel_urls() {
        assert_eq!(
            extract_shortcode("https://www.instagram.com/p/C1234567890/"),
            Some("C1234567890")
        );
        assert_eq!(
            extract_shortcode("https://instagram.com/reel/Xyz_-1/?igsh=a"),
            Some("Xyz_-1")
        );
        assert_eq!(extract_shortcode("https://instagram.com/alexdoe"), None);
    }

    #[tokio::test]
    async fn missing_credentials_degrade_to_placeholder() {
        let fetcher = InstagramFetcher::new(None, None);
        let FetchOutcome::Success(snapshot) = fetcher
            .fetch(&post("https://www.instagram.com/p/C1234567890/"))
            .await
        else {
            panic!("expected degraded success");
        };

        assert_eq!(snapshot.metrics, EngagementMetrics::default());
        assert_eq!(snapshot.author_username.as_deref(), Some("Instagram User"));
        assert_eq!(
            snapshot.thumbnail_url.as_deref(),
            Some("https://instagram.com/p/C1234567890/media/?size=m")
        );
    }

    #[tokio::test]
    async fn token_without_session_still_degrades() {
        let fetcher = InstagramFetcher::new(Some("apify-token".to_string()), None);
        let outcome = fetcher
            .fetch(&post("https://www.instagram.com/p/C1234567890/"))
            .await;

        assert!(outcome.is_success());
    }

    #[test]
    fn exhausted_poll_budget_degrades_to_placeholder() {
        let outcome = outcome_from_scrape(
            Err(ApifyError::PollBudgetExhausted(30)),
            "https://www.instagram.com/p/C1234567890/",
        );

        assert_eq!(
            outcome,
            FetchOutcome::Success(placeholder_snapshot(
                "https://www.instagram.com/p/C1234567890/"
            ))
        );
    }

    #[test]
    fn failed_run_degrades_to_placeholder() {
        let outcome = outcome_from_scrape(
            Err(ApifyError::RunFailed("ABORTED".to_string())),
            "https://www.instagram.com/p/C1234567890/",
        );

        let FetchOutcome::Success(snapshot) = outcome else {
            panic!("expected degraded success");
        };
        assert_eq!(snapshot.metrics, EngagementMetrics::default());
        assert_eq!(snapshot.author_username.as_deref(), Some("Instagram User"));
    }

    #[test]
    fn empty_dataset_degrades_to_placeholder() {
        let outcome =
            outcome_from_scrape(Ok(Vec::new()), "https://www.instagram.com/p/C1234567890/");

        assert_eq!(
            outcome,
            FetchOutcome::Success(placeholder_snapshot(
                "https://www.instagram.com/p/C1234567890/"
            ))
        );
    }

    #[test]
    fn placeholder_has_no_thumbnail_without_shortcode() {
        let snapshot = placeholder_snapshot("https://instagram.com/alexdoe");
        assert_eq!(snapshot.thumbnail_url, None);
    }

    #[test]
    fn maps_scraped_post_counters() {
        let scraped: ScrapedPost = serde_json::from_value(serde_json::json!({
            "ownerUsername": "danafashion",
            "displayUrl": "https://cdn.example/d.jpg",
            "timestamp": "2024-07-17T09:00:00Z",
            "likesCount": 25480,
            "commentsCount": 1230,
            "playCount": 210870
        }))
        .unwrap();

        let snapshot = snapshot_from_scraped(scraped);
        assert_eq!(snapshot.metrics.views, 210_870);
        assert_eq!(snapshot.metrics.likes, 25_480);
        assert_eq!(snapshot.metrics.comments, 1_230);
        assert_eq!(snapshot.author_username.as_deref(), Some("danafashion"));
        assert!(snapshot.posted_at.is_some());
    }

    #[test]
    fn scraped_post_without_author_gets_placeholder_name() {
        let scraped: ScrapedPost =
            serde_json::from_value(serde_json::json!({ "likesCount": 5 })).unwrap();
        let snapshot = snapshot_from_scraped(scraped);
        assert_eq!(snapshot.author_username.as_deref(), Some("Instagram User"));
    }
}
