//! X (Twitter) API v2 fetcher: single-tweet lookup with `public_metrics`.
//!
//! The only platform that advertises a usable rate-limit reset time, so 429
//! handling here feeds the circuit breaker: the reset header becomes a
//! `RateLimited { reset_at }` failure the orchestrator persists.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use pulsetrack_common::{
    EngagementMetrics, ErrorPolicy, FetchFailure, FetchOutcome, PostSnapshot, TrackedPost,
};

use super::MetricsFetcher;

const TWEETS_ENDPOINT: &str = "https://api.twitter.com/2/tweets";
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

static RE_STATUS_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/status/(\d+)").unwrap());

pub struct XFetcher {
    client: reqwest::Client,
    bearer_token: Option<String>,
    policy: ErrorPolicy,
}

impl XFetcher {
    pub fn new(client: reqwest::Client, bearer_token: Option<String>, policy: ErrorPolicy) -> Self {
        Self {
            client,
            bearer_token,
            policy,
        }
    }
}

#[async_trait]
impl MetricsFetcher for XFetcher {
    async fn fetch(&self, post: &TrackedPost) -> FetchOutcome {
        let Some(status_id) = extract_status_id(&post.url) else {
            return FetchOutcome::Failure(FetchFailure::MalformedResponse(
                "no status ID in URL".to_string(),
            ));
        };

        let Some(token) = self.bearer_token.as_deref() else {
            debug!(url = post.url.as_str(), "No X bearer token, returning zero metrics");
            return FetchOutcome::Success(PostSnapshot::zeroed());
        };

        let resp = self
            .client
            .get(format!("{TWEETS_ENDPOINT}/{status_id}"))
            .query(&[
                ("tweet.fields", "public_metrics,created_at"),
                ("expansions", "attachments.media_keys,author_id"),
                ("media.fields", "url,preview_image_url,type"),
                ("user.fields", "username,profile_image_url"),
            ])
            .bearer_auth(token)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                return match self.policy {
                    ErrorPolicy::ZeroFill => {
                        warn!(url = post.url.as_str(), error = %e, "X API request failed, falling back to zero metrics");
                        FetchOutcome::Success(PostSnapshot::zeroed())
                    }
                    ErrorPolicy::Strict => {
                        FetchOutcome::Failure(FetchFailure::TransientNetwork(e.to_string()))
                    }
                };
            }
        };

        let status = resp.status().as_u16();
        let reset_header = resp
            .headers()
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp.text().await.unwrap_or_default();

        outcome_from_response(status, reset_header.as_deref(), &body, self.policy)
    }
}

/// Extract the numeric status ID from `/status/<digits>`.
pub(crate) fn extract_status_id(url: &str) -> Option<&str> {
    RE_STATUS_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Classify an X API response. Pure over (status, reset header, body) so the
/// whole handling table is unit-testable without a network.
pub(crate) fn outcome_from_response(
    status: u16,
    rate_limit_reset: Option<&str>,
    body: &str,
    policy: ErrorPolicy,
) -> FetchOutcome {
    match status {
        429 => {
            let reset_at = rate_limit_reset
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            FetchOutcome::Failure(FetchFailure::RateLimited { reset_at })
        }
        401 => FetchOutcome::Failure(FetchFailure::MissingCredentials),
        s if !(200..300).contains(&s) => match policy {
            ErrorPolicy::ZeroFill => {
                warn!(status = s, "X API error, falling back to zero metrics");
                FetchOutcome::Success(PostSnapshot::zeroed())
            }
            ErrorPolicy::Strict => {
                FetchOutcome::Failure(FetchFailure::TransientNetwork(format!("status {s}")))
            }
        },
        _ => match serde_json::from_str::<TweetResponse>(body) {
            Ok(parsed) => match parsed.data {
                Some(data) => FetchOutcome::Success(snapshot_from_tweet(data, parsed.includes)),
                None => FetchOutcome::Failure(FetchFailure::NotFound),
            },
            Err(e) => FetchOutcome::Failure(FetchFailure::MalformedResponse(e.to_string())),
        },
    }
}

fn snapshot_from_tweet(data: TweetData, includes: Option<Includes>) -> PostSnapshot {
    let m = data.public_metrics.unwrap_or_default();

    // impression_count is not available on all API tiers; fall back to
    // retweet_count so views never silently read as zero for visible posts.
    let views = m.impression_count.or(m.retweet_count).unwrap_or(0);

    let author = includes
        .as_ref()
        .and_then(|i| i.users.as_ref())
        .and_then(|u| u.first());
    let media = includes
        .as_ref()
        .and_then(|i| i.media.as_ref())
        .and_then(|v| v.first());

    // Videos carry a preview image; photos carry the media URL itself.
    let thumbnail = media
        .and_then(|m| match m.media_type.as_deref() {
            Some("video") => m.preview_image_url.clone(),
            _ => m.url.clone().or_else(|| m.preview_image_url.clone()),
        })
        .or_else(|| author.and_then(|u| u.profile_image_url.clone()));

    PostSnapshot {
        metrics: EngagementMetrics {
            views: clamp(views),
            likes: clamp(m.like_count.unwrap_or(0)),
            comments: clamp(m.reply_count.unwrap_or(0)),
            shares: clamp(m.retweet_count.unwrap_or(0) + m.quote_count.unwrap_or(0)),
        },
        author_username: author.and_then(|u| u.username.clone()),
        thumbnail_url: thumbnail,
        posted_at: data.created_at,
    }
}

fn clamp(v: i64) -> u64 {
    v.max(0) as u64
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: Option<TweetData>,
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    public_metrics: Option<PublicMetrics>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    like_count: Option<i64>,
    reply_count: Option<i64>,
    retweet_count: Option<i64>,
    quote_count: Option<i64>,
    impression_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    users: Option<Vec<IncludedUser>>,
    media: Option<Vec<IncludedMedia>>,
}

#[derive(Debug, Deserialize)]
struct IncludedUser {
    username: Option<String>,
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncludedMedia {
    #[serde(rename = "type")]
    media_type: Option<String>,
    url: Option<String>,
    preview_image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn extracts_status_id() {
        assert_eq!(
            extract_status_id("https://x.com/caseydev/status/1234567890123456789"),
            Some("1234567890123456789")
        );
        assert_eq!(extract_status_id("https://x.com/caseydev"), None);
    }

    #[test]
    fn rate_limited_response_carries_reset_instant() {
        let outcome =
            outcome_from_response(429, Some("1700000000"), "", ErrorPolicy::ZeroFill);

        let expected = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Failure(FetchFailure::RateLimited {
                reset_at: Some(expected)
            })
        );
    }

    #[test]
    fn rate_limited_without_header_still_fails_rate_limited() {
        let outcome = outcome_from_response(429, None, "", ErrorPolicy::ZeroFill);
        assert_eq!(
            outcome,
            FetchOutcome::Failure(FetchFailure::RateLimited { reset_at: None })
        );
    }

    #[test]
    fn unauthorized_is_missing_credentials() {
        let outcome = outcome_from_response(401, None, "", ErrorPolicy::ZeroFill);
        assert_eq!(
            outcome,
            FetchOutcome::Failure(FetchFailure::MissingCredentials)
        );
    }

    #[test]
    fn server_error_zero_fills_under_legacy_policy() {
        let outcome = outcome_from_response(500, None, "", ErrorPolicy::ZeroFill);
        assert_eq!(outcome, FetchOutcome::Success(PostSnapshot::zeroed()));
    }

    #[test]
    fn server_error_fails_under_strict_policy() {
        let outcome = outcome_from_response(500, None, "", ErrorPolicy::Strict);
        assert!(matches!(
            outcome,
            FetchOutcome::Failure(FetchFailure::TransientNetwork(_))
        ));
    }

    #[test]
    fn missing_data_field_is_not_found() {
        let outcome = outcome_from_response(
            200,
            None,
            r#"{"errors":[{"detail":"Could not find tweet"}]}"#,
            ErrorPolicy::ZeroFill,
        );
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::NotFound));
    }

    #[test]
    fn maps_public_metrics_with_share_sum() {
        let body = r#"{
            "data": {
                "created_at": "2024-07-18T12:00:00Z",
                "public_metrics": {
                    "like_count": 5200,
                    "reply_count": 312,
                    "retweet_count": 1800,
                    "quote_count": 90,
                    "impression_count": 44000
                }
            },
            "includes": {
                "users": [{"username": "caseydev", "profile_image_url": "https://pbs.example/u.jpg"}]
            }
        }"#;

        let FetchOutcome::Success(snapshot) =
            outcome_from_response(200, None, body, ErrorPolicy::ZeroFill)
        else {
            panic!("expected success");
        };

        assert_eq!(snapshot.metrics.views, 44_000);
        assert_eq!(snapshot.metrics.likes, 5_200);
        assert_eq!(snapshot.metrics.comments, 312);
        assert_eq!(snapshot.metrics.shares, 1_890);
        assert_eq!(snapshot.author_username.as_deref(), Some("caseydev"));
        assert_eq!(
            snapshot.thumbnail_url.as_deref(),
            Some("https://pbs.example/u.jpg")
        );
    }

    #[test]
    fn views_fall_back_to_retweet_count_without_impressions() {
        let body = r#"{
            "data": {
                "public_metrics": { "retweet_count": 230, "like_count": 780, "reply_count": 55 }
            }
        }"#;

        let FetchOutcome::Success(snapshot) =
            outcome_from_response(200, None, body, ErrorPolicy::ZeroFill)
        else {
            panic!("expected success");
        };

        assert_eq!(snapshot.metrics.views, 230);
        assert_eq!(snapshot.metrics.shares, 230);
    }

    #[test]
    fn video_media_preview_wins_over_profile_image() {
        let body = r#"{
            "data": { "public_metrics": {} },
            "includes": {
                "users": [{"username": "u", "profile_image_url": "https://pbs.example/u.jpg"}],
                "media": [{"type": "video", "preview_image_url": "https://pbs.example/v.jpg"}]
            }
        }"#;

        let FetchOutcome::Success(snapshot) =
            outcome_from_response(200, None, body, ErrorPolicy::ZeroFill)
        else {
            panic!("expected success");
        };

        assert_eq!(
            snapshot.thumbnail_url.as_deref(),
            Some("https://pbs.example/v.jpg")
        );
    }
}
