//! Per-platform metrics fetchers. Each fetcher owns its platform's ID
//! extraction, credential lookup, outbound call, and response normalization,
//! and converts every error into a `FetchOutcome` — nothing raised here may
//! abort a batch.

pub mod instagram;
pub mod x;
pub mod youtube;

use std::sync::Arc;

use async_trait::async_trait;

use pulsetrack_common::{Credentials, ErrorPolicy, FetchOutcome, Platform, TrackedPost};

pub use instagram::InstagramFetcher;
pub use x::XFetcher;
pub use youtube::YoutubeFetcher;

/// One platform strategy: take a tracked post, return a normalized outcome.
#[async_trait]
pub trait MetricsFetcher: Send + Sync {
    async fn fetch(&self, post: &TrackedPost) -> FetchOutcome;
}

/// The full set of platform strategies, selected by classifier output.
#[derive(Clone)]
pub struct FetcherSet {
    youtube: Arc<dyn MetricsFetcher>,
    instagram: Arc<dyn MetricsFetcher>,
    x: Arc<dyn MetricsFetcher>,
}

impl FetcherSet {
    pub fn new(
        youtube: Arc<dyn MetricsFetcher>,
        instagram: Arc<dyn MetricsFetcher>,
        x: Arc<dyn MetricsFetcher>,
    ) -> Self {
        Self {
            youtube,
            instagram,
            x,
        }
    }

    /// Build the production fetchers from injected credentials. A missing
    /// credential puts that platform's fetcher into degraded mode; it never
    /// prevents construction.
    pub fn from_credentials(credentials: &Credentials, policy: ErrorPolicy) -> Self {
        let http = reqwest::Client::new();
        Self {
            youtube: Arc::new(YoutubeFetcher::new(
                http.clone(),
                credentials.youtube_api_key.clone(),
                policy,
            )),
            instagram: Arc::new(InstagramFetcher::new(
                credentials.apify_api_token.clone(),
                credentials.instagram_session_id.clone(),
            )),
            x: Arc::new(XFetcher::new(
                http,
                credentials.x_bearer_token.clone(),
                policy,
            )),
        }
    }

    pub fn for_platform(&self, platform: Platform) -> Arc<dyn MetricsFetcher> {
        match platform {
            Platform::Youtube => Arc::clone(&self.youtube),
            Platform::Instagram => Arc::clone(&self.instagram),
            Platform::X => Arc::clone(&self.x),
        }
    }
}
