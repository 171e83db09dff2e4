//! YouTube Data API v3 fetcher: one GET against the videos endpoint per post.

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

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Matches the 11-character video ID in watch, embed, and short-link forms.
static RE_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:v=|/embed/|youtu\.be/)([\w-]{11})").unwrap());

pub struct YoutubeFetcher {
    client: reqwest::Client,
    api_key: Option<String>,
    policy: ErrorPolicy,
}

impl YoutubeFetcher {
    pub fn new(client: reqwest::Client, api_key: Option<String>, policy: ErrorPolicy) -> Self {
        Self {
            client,
            api_key,
            policy,
        }
    }

    fn unexpected_error(&self, url: &str, detail: String) -> FetchOutcome {
        match self.policy {
            ErrorPolicy::ZeroFill => {
                warn!(url, detail, "YouTube API error, falling back to zero metrics");
                FetchOutcome::Success(PostSnapshot::zeroed())
            }
            ErrorPolicy::Strict => FetchOutcome::Failure(FetchFailure::TransientNetwork(detail)),
        }
    }
}

#[async_trait]
impl MetricsFetcher for YoutubeFetcher {
    async fn fetch(&self, post: &TrackedPost) -> FetchOutcome {
        let Some(video_id) = extract_video_id(&post.url) else {
            return FetchOutcome::Failure(FetchFailure::MalformedResponse(
                "no video ID in URL".to_string(),
            ));
        };

        let Some(api_key) = self.api_key.as_deref() else {
            debug!(url = post.url.as_str(), "No YouTube API key, returning zero metrics");
            return FetchOutcome::Success(PostSnapshot::zeroed());
        };

        let resp = self
            .client
            .get(VIDEOS_ENDPOINT)
            .query(&[
                ("part", "statistics,snippet"),
                ("id", video_id),
                ("key", api_key),
            ])
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => return self.unexpected_error(&post.url, e.to_string()),
        };

        let status = resp.status();
        if !status.is_success() {
            return self.unexpected_error(&post.url, format!("status {}", status.as_u16()));
        }

        match resp.json::<VideoListResponse>().await {
            Ok(body) => FetchOutcome::Success(snapshot_from_response(body)),
            Err(e) => FetchOutcome::Failure(FetchFailure::MalformedResponse(e.to_string())),
        }
    }
}

/// Extract the 11-character video ID from a YouTube URL.
pub(crate) fn extract_video_id(url: &str) -> Option<&str> {
    RE_VIDEO_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Map the videos-list response to a normalized snapshot. A 2xx response with
/// no items (video deleted or private) degrades to zeros, matching how the
/// tracker has always treated vanished videos.
pub(crate) fn snapshot_from_response(body: VideoListResponse) -> PostSnapshot {
    let Some(video) = body.items.and_then(|mut v| {
        if v.is_empty() {
            None
        } else {
            Some(v.remove(0))
        }
    }) else {
        return PostSnapshot::zeroed();
    };

    let stats = video.statistics.unwrap_or_default();
    let snippet = video.snippet;

    PostSnapshot {
        metrics: EngagementMetrics {
            views: parse_count(stats.view_count.as_deref()),
            likes: parse_count(stats.like_count.as_deref()),
            comments: parse_count(stats.comment_count.as_deref()),
            shares: 0,
        },
        author_username: snippet.as_ref().and_then(|s| s.channel_title.clone()),
        thumbnail_url: snippet
            .as_ref()
            .and_then(|s| s.thumbnails.as_ref())
            .and_then(|t| t.high.as_ref())
            .and_then(|h| h.url.clone()),
        posted_at: snippet.and_then(|s| s.published_at),
    }
}

/// YouTube statistics are string-encoded integers; absent or garbled → 0.
fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoListResponse {
    pub items: Option<Vec<VideoItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoItem {
    pub statistics: Option<VideoStatistics>,
    pub snippet: Option<VideoSnippet>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VideoStatistics {
    #[serde(rename = "viewCount")]
    pub view_count: Option<String>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<String>,
    #[serde(rename = "commentCount")]
    pub comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoSnippet {
    #[serde(rename = "channelTitle")]
    pub channel_title: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thumbnails {
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thumbnail {
    pub url: Option<String>,
}
