use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for the apify/instagram-scraper actor, scoped to specific post URLs.
#[derive(Debug, Clone, Serialize)]
pub struct PostScrapeInput {
    #[serde(rename = "directUrls")]
    pub direct_urls: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: u32,
    #[serde(rename = "sessionConfig", skip_serializing_if = "Option::is_none")]
    pub session_config: Option<SessionConfig>,
    #[serde(rename = "proxyConfig", skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<ProxyConfig>,
}

impl PostScrapeInput {
    /// Input for scraping a single post, authenticated with an Instagram
    /// session cookie and routed through the Apify proxy pool.
    pub fn single_post(url: &str, session_id: &str) -> Self {
        Self {
            direct_urls: vec![url.to_string()],
            results_limit: 1,
            session_config: Some(SessionConfig {
                session_cookies: vec![SessionCookie {
                    name: "sessionid".to_string(),
                    value: session_id.to_string(),
                }],
            }),
            proxy_config: Some(ProxyConfig {
                use_apify_proxy: true,
            }),
        }
    }
}

/// Session cookie configuration passed through to the scraper browser.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    #[serde(rename = "sessionCookies")]
    pub session_cookies: Vec<SessionCookie>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfig {
    #[serde(rename = "useApifyProxy")]
    pub use_apify_proxy: bool,
}

/// A single scraped Instagram post from the Apify dataset. The scraper emits
/// different field sets for images, reels, and videos, so everything is
/// optional and consumers pick the first populated alternative.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedPost {
    pub url: Option<String>,
    #[serde(rename = "ownerUsername")]
    pub owner_username: Option<String>,
    #[serde(rename = "ownerFullName")]
    pub owner_full_name: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "displayUrl")]
    pub display_url: Option<String>,
    #[serde(rename = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,
    pub images: Option<Vec<String>>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "likesCount")]
    pub likes_count: Option<i64>,
    #[serde(rename = "commentsCount")]
    pub comments_count: Option<i64>,
    #[serde(rename = "playCount")]
    pub play_count: Option<i64>,
    #[serde(rename = "videoPlayCount")]
    pub video_play_count: Option<i64>,
    #[serde(rename = "videoViewCount")]
    pub video_view_count: Option<i64>,
}

impl ScrapedPost {
    /// Best available author name.
    pub fn author(&self) -> Option<&str> {
        self.owner_username
            .as_deref()
            .or(self.owner_full_name.as_deref())
            .or(self.username.as_deref())
    }

    /// Best available thumbnail URL.
    pub fn thumbnail(&self) -> Option<&str> {
        self.display_url
            .as_deref()
            .or(self.thumbnail_url.as_deref())
            .or_else(|| self.images.as_ref().and_then(|v| v.first().map(String::as_str)))
    }

    /// Play count for reels/videos, first non-null alternative wins.
    /// Plain image posts report no views at all.
    pub fn views(&self) -> i64 {
        self.play_count
            .or(self.video_play_count)
            .or(self.video_view_count)
            .unwrap_or(0)
    }
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    /// Whether the run finished successfully.
    pub fn succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }

    /// Whether the run has reached a terminal state (success or otherwise).
    pub fn is_terminal(&self) -> bool {
        self.succeeded() || matches!(self.status.as_str(), "FAILED" | "ABORTED" | "TIMED-OUT")
    }
}
