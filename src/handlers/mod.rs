mod admin;
mod batch;
mod fetch;
mod health;
mod metrics;
mod stats;

pub use admin::clear_cache_handler;
pub use batch::batch_handler;
pub use fetch::fetch_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use stats::{all_stats_handler, endpoint_stats_handler};
