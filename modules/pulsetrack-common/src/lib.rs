pub mod config;
pub mod types;

pub use config::{Config, Credentials, ErrorPolicy};
pub use types::{EngagementMetrics, FetchFailure, FetchOutcome, Platform, PostSnapshot, TrackedPost};
