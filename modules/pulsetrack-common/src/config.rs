use std::env;
use std::time::Duration;

use tracing::info;

/// How an unexpected (non-429, non-2xx) platform API error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Legacy behavior: treat the error as "no data" and persist zero metrics.
    #[default]
    ZeroFill,
    /// Report a failure and leave the post's prior metrics untouched.
    Strict,
}

impl ErrorPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zero_fill" => Some(ErrorPolicy::ZeroFill),
            "strict" => Some(ErrorPolicy::Strict),
            _ => None,
        }
    }
}

/// Per-platform API credentials. All optional: a missing credential puts the
/// matching fetcher into degraded mode rather than failing the batch.
/// Injected into the fetchers so tests can supply doubles instead of reading
/// process-wide environment state.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub youtube_api_key: Option<String>,
    pub x_bearer_token: Option<String>,
    pub apify_api_token: Option<String>,
    pub instagram_session_id: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            youtube_api_key: optional_env("YOUTUBE_API_KEY"),
            x_bearer_token: optional_env("X_BEARER_TOKEN"),
            apify_api_token: optional_env("APIFY_API_TOKEN"),
            instagram_session_id: optional_env("INSTAGRAM_SESSION_ID"),
        }
    }

    /// Log which credentials are configured without exposing their values.
    pub fn log_redacted(&self) {
        info!(
            youtube = self.youtube_api_key.is_some(),
            x = self.x_bearer_token.is_some(),
            apify = self.apify_api_token.is_some(),
            instagram_session = self.instagram_session_id.is_some(),
            "Platform credentials configured"
        );
    }
}

/// Refresh pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Posts refreshed more recently than this are skipped.
    pub staleness: Duration,
    /// Maximum posts considered per run, bounding external API load.
    pub batch_limit: i64,
    /// Concurrent in-flight fetches during a run.
    pub fetch_concurrency: usize,
    pub error_policy: ErrorPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            staleness: Duration::from_secs(
                env::var("REFRESH_STALENESS_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .expect("REFRESH_STALENESS_SECS must be a number"),
            ),
            batch_limit: env::var("REFRESH_BATCH_LIMIT")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("REFRESH_BATCH_LIMIT must be a number"),
            fetch_concurrency: env::var("REFRESH_CONCURRENCY")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .expect("REFRESH_CONCURRENCY must be a number"),
            error_policy: env::var("REFRESH_ERROR_POLICY")
                .ok()
                .map(|s| {
                    ErrorPolicy::parse(&s)
                        .unwrap_or_else(|| panic!("REFRESH_ERROR_POLICY must be zero_fill or strict, got {s:?}"))
                })
                .unwrap_or_default(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
