//! Persistence seam for the refresh pipeline. The trait is the contract;
//! `PgMetricsStore` is the production Postgres adapter, `testing::MemoryStore`
//! the in-memory double.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use pulsetrack_common::{EngagementMetrics, Platform, PostSnapshot, TrackedPost};

use crate::error::Result;

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Posts whose metrics are due for refresh: never refreshed, or last
    /// refreshed before `now - staleness`. `None` staleness selects all
    /// tracked posts. Capped at `limit` to bound external API load per run.
    async fn posts_due_for_refresh(
        &self,
        staleness: Option<Duration>,
        limit: i64,
    ) -> Result<Vec<TrackedPost>>;

    /// Write refreshed snapshots plus `last_refreshed_at`. Per-post write
    /// failures are logged and skipped, not propagated; returns the number
    /// of rows actually written.
    async fn record_snapshots(
        &self,
        snapshots: &[(Uuid, PostSnapshot)],
        refreshed_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Advisory rate-limit flag for a platform, if one has been observed.
    async fn rate_limit_reset(&self, platform: Platform) -> Result<Option<DateTime<Utc>>>;

    /// Record a platform's rate-limit reset instant. Last writer wins.
    async fn set_rate_limit_reset(&self, platform: Platform, reset_at: DateTime<Utc>)
        -> Result<()>;
}

/// A row from the posts table, as the refresh pipeline sees it.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    post_url: String,
    platform: Option<String>,
    views: i64,
    likes: i64,
    comments: i64,
    shares: i64,
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl From<PostRow> for TrackedPost {
    fn from(row: PostRow) -> Self {
        TrackedPost {
            id: row.id,
            url: row.post_url,
            platform: row.platform.as_deref().and_then(Platform::parse),
            metrics: EngagementMetrics {
                views: row.views.max(0) as u64,
                likes: row.likes.max(0) as u64,
                comments: row.comments.max(0) as u64,
                shares: row.shares.max(0) as u64,
            },
            last_refreshed_at: row.last_refreshed_at,
        }
    }
}

pub struct PgMetricsStore {
    pool: PgPool,
}

impl PgMetricsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn flag_key(platform: Platform) -> String {
        format!("{}_rate_limit_reset_at", platform.as_str())
    }
}

#[async_trait]
impl MetricsStore for PgMetricsStore {
    async fn posts_due_for_refresh(
        &self,
        staleness: Option<Duration>,
        limit: i64,
    ) -> Result<Vec<TrackedPost>> {
        let cutoff: Option<DateTime<Utc>> = staleness
            .map(|d| Utc::now() - chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero()));

        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, post_url, platform, views, likes, comments, shares, last_refreshed_at
            FROM posts
            WHERE $1::timestamptz IS NULL
               OR last_refreshed_at IS NULL
               OR last_refreshed_at < $1
            ORDER BY last_refreshed_at ASC NULLS FIRST
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TrackedPost::from).collect())
    }

    async fn record_snapshots(
        &self,
        snapshots: &[(Uuid, PostSnapshot)],
        refreshed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut written = 0usize;

        for (post_id, snapshot) in snapshots {
            // COALESCE keeps previously-known author/thumbnail/posted_at when
            // a degraded fetch produced nothing better.
            let result = sqlx::query(
                r#"
                UPDATE posts
                SET views = $2,
                    likes = $3,
                    comments = $4,
                    shares = $5,
                    username = COALESCE($6, username),
                    thumbnail_url = COALESCE($7, thumbnail_url),
                    posted_at = COALESCE($8, posted_at),
                    last_refreshed_at = $9
                WHERE id = $1
                "#,
            )
            .bind(post_id)
            .bind(snapshot.metrics.views as i64)
            .bind(snapshot.metrics.likes as i64)
            .bind(snapshot.metrics.comments as i64)
            .bind(snapshot.metrics.shares as i64)
            .bind(&snapshot.author_username)
            .bind(&snapshot.thumbnail_url)
            .bind(snapshot.posted_at)
            .bind(refreshed_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => written += 1,
                Err(e) => {
                    warn!(post_id = %post_id, error = %e, "Failed to write refreshed metrics");
                }
            }
        }

        Ok(written)
    }

    async fn rate_limit_reset(&self, platform: Platform) -> Result<Option<DateTime<Utc>>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT flag_value FROM system_flags WHERE flag_key = $1",
        )
        .bind(Self::flag_key(platform))
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.and_then(|v| match DateTime::parse_from_rfc3339(&v) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                warn!(platform = %platform, value = v.as_str(), error = %e, "Unparseable rate limit flag, ignoring");
                None
            }
        }))
    }

    async fn set_rate_limit_reset(
        &self,
        platform: Platform,
        reset_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_flags (flag_key, flag_value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (flag_key)
            DO UPDATE SET flag_value = EXCLUDED.flag_value, updated_at = now()
            "#,
        )
        .bind(Self::flag_key(platform))
        .bind(reset_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
