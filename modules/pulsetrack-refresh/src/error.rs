/// Result type alias for refresh pipeline operations.
pub type Result<T> = std::result::Result<T, RefreshError>;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
