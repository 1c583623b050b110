pub mod batch;
pub mod cache;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod stats;

pub use cache::{CacheStore, cache_key, memoized};
pub use endpoints::{EndpointConfig, EndpointRegistry, RateLimitConfig, RateLimitStrategy};
pub use error::GatewayError;
pub use gateway::ApiGateway;
pub use models::{BatchRequest, FetchRequest};
pub use rate_limit::RateLimiter;
pub use stats::EndpointStats;
