use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulsetrack_common::{Config, Credentials};
use pulsetrack_refresh::fetchers::FetcherSet;
use pulsetrack_refresh::{MetricsStore, PgMetricsStore, Refresher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pulsetrack_refresh=info".parse()?),
        )
        .init();

    info!("Pulsetrack metrics refresh starting...");

    // Load config and credentials
    let config = Config::from_env();
    let credentials = Credentials::from_env();
    credentials.log_redacted();

    // Connect to Postgres and run migrations
    let pool = PgPool::connect(&config.database_url).await?;
    let pg_store = PgMetricsStore::new(pool);
    pg_store.migrate().await?;

    let store: Arc<dyn MetricsStore> = Arc::new(pg_store);
    let fetchers = FetcherSet::from_credentials(&credentials, config.error_policy);
    let refresher = Refresher::new(store, fetchers, &config);

    // Scheduling is external (cron invokes this binary); one batch per run.
    let stats = refresher.run().await?;

    info!(
        considered = stats.considered,
        succeeded = stats.succeeded,
        skipped = stats.skipped,
        failed = stats.failed,
        "Pulsetrack refresh finished"
    );

    Ok(())
}
