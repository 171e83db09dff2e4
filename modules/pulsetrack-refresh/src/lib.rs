pub mod breaker;
pub mod error;
pub mod fetchers;
pub mod orchestrator;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{RefreshError, Result};
pub use orchestrator::{Refresher, RunStats};
pub use store::{MetricsStore, PgMetricsStore};
