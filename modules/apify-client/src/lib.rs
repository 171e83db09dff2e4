pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    ApiResponse, PostScrapeInput, ProxyConfig, RunData, ScrapedPost, SessionConfig, SessionCookie,
};

use std::time::Duration;

use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apify/instagram-scraper (post-URL mode).
const INSTAGRAM_SCRAPER: &str = "apify~instagram-scraper";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    /// Start an Instagram post scrape run. Returns immediately with run metadata.
    pub async fn start_post_scrape(&self, input: &PostScrapeInput) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", BASE_URL, INSTAGRAM_SCRAPER);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll a run on a fixed interval until it reaches a terminal state or the
    /// attempt budget runs out. Returns the run metadata on SUCCEEDED; any
    /// other terminal status is `RunFailed`, and a run still in progress after
    /// `max_attempts` polls is `PollBudgetExhausted`.
    pub async fn wait_for_run(
        &self,
        run_id: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<RunData> {
        let url = format!("{}/actor-runs/{}", BASE_URL, run_id);

        for attempt in 1..=max_attempts {
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            let run = api_resp.data;
            if run.succeeded() {
                return Ok(run);
            }
            if run.is_terminal() {
                return Err(ApifyError::RunFailed(run.status));
            }
            tracing::debug!(run_id, attempt, status = %run.status, "Run still in progress");
            tokio::time::sleep(interval).await;
        }

        Err(ApifyError::PollBudgetExhausted(max_attempts))
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", BASE_URL, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Scrape a single Instagram post end-to-end: start run, poll, fetch results.
    pub async fn scrape_post(
        &self,
        input: &PostScrapeInput,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<Vec<ScrapedPost>> {
        tracing::info!(urls = ?input.direct_urls, "Starting Instagram post scrape");

        let run = self.start_post_scrape(input).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id, max_attempts, interval).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let posts: Vec<ScrapedPost> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        tracing::info!(count = posts.len(), "Fetched scraped posts");

        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_post_input_serializes_actor_fields() {
        let input = PostScrapeInput::single_post("https://instagram.com/p/C123/", "sess-abc");
        let json = serde_json::to_value(&input).unwrap();

        assert_eq!(json["directUrls"][0], "https://instagram.com/p/C123/");
        assert_eq!(json["resultsLimit"], 1);
        assert_eq!(json["sessionConfig"]["sessionCookies"][0]["name"], "sessionid");
        assert_eq!(json["sessionConfig"]["sessionCookies"][0]["value"], "sess-abc");
        assert_eq!(json["proxyConfig"]["useApifyProxy"], true);
    }

    #[test]
    fn scraped_post_fallback_chains() {
        let post: ScrapedPost = serde_json::from_value(serde_json::json!({
            "ownerFullName": "Dana Fashion",
            "thumbnailUrl": "https://cdn.example/t.jpg",
            "likesCount": 25480,
            "commentsCount": 1230,
            "videoViewCount": 210870
        }))
        .unwrap();

        assert_eq!(post.author(), Some("Dana Fashion"));
        assert_eq!(post.thumbnail(), Some("https://cdn.example/t.jpg"));
        assert_eq!(post.views(), 210_870);
    }

    #[test]
    fn scraped_post_views_default_to_zero_for_images() {
        let post: ScrapedPost = serde_json::from_value(serde_json::json!({
            "ownerUsername": "alexdoe",
            "likesCount": 10
        }))
        .unwrap();

        assert_eq!(post.views(), 0);
    }

    #[test]
    fn run_terminal_states() {
        let run = |status: &str| RunData {
            id: "r1".into(),
            status: status.into(),
            default_dataset_id: "d1".into(),
            started_at: None,
            finished_at: None,
        };

        assert!(run("SUCCEEDED").is_terminal());
        assert!(run("FAILED").is_terminal());
        assert!(run("ABORTED").is_terminal());
        assert!(run("TIMED-OUT").is_terminal());
        assert!(!run("RUNNING").is_terminal());
        assert!(!run("READY").is_terminal());

        assert!(run("SUCCEEDED").succeeded());
        assert!(!run("FAILED").succeeded());
    }
}
