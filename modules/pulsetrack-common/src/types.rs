use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Platform ---

/// Social platforms the tracker can refresh metrics for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Instagram,
    X,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::X => "x",
        }
    }

    /// Parse a stored platform string. Accepts the legacy "twitter" spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "youtube" => Some(Platform::Youtube),
            "instagram" => Some(Platform::Instagram),
            "x" | "twitter" => Some(Platform::X),
            _ => None,
        }
    }

    /// Classify a post URL by hostname. Returns `None` for URLs that don't
    /// parse or don't belong to a supported platform. Pure, no I/O.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();

        if host_matches(&host, "youtube.com") || host_matches(&host, "youtu.be") {
            Some(Platform::Youtube)
        } else if host_matches(&host, "instagram.com") {
            Some(Platform::Instagram)
        } else if host_matches(&host, "x.com") || host_matches(&host, "twitter.com") {
            Some(Platform::X)
        } else {
            None
        }
    }
}

/// True when `host` is `domain` itself or a subdomain of it. Avoids the
/// substring trap where "notyoutube.com" would match "youtube.com".
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Engagement metrics ---

/// Latest known engagement counters for a post. All zero until first refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
}

// --- Tracked post ---

/// One externally-hosted post under tracking. The store owns the id; the
/// refresh pipeline only ever mutates metrics and `last_refreshed_at`.
#[derive(Debug, Clone)]
pub struct TrackedPost {
    pub id: Uuid,
    pub url: String,
    pub platform: Option<Platform>,
    pub metrics: EngagementMetrics,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

// --- Fetch results ---

/// Normalized result of one successful platform fetch. Author, thumbnail and
/// publish date ride along with the counters so stored rows stay fresh, but
/// are best-effort and may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSnapshot {
    pub metrics: EngagementMetrics,
    pub author_username: Option<String>,
    pub thumbnail_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl PostSnapshot {
    /// All-zero snapshot used by the degraded no-credentials path.
    pub fn zeroed() -> Self {
        Self::default()
    }
}

/// Why one fetcher invocation produced no usable snapshot. Always returned,
/// never raised — the orchestrator keeps the batch going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("credentials missing or rejected")]
    MissingCredentials,

    #[error("platform rate limit in effect")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("post not found upstream")]
    NotFound,

    #[error("malformed post URL or response: {0}")]
    MalformedResponse(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),
}

/// Tagged outcome of one fetcher invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(PostSnapshot),
    Failure(FetchFailure),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}
