use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Rate limiting strategies, selected per endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    FixedWindow,
    SlidingWindow,
    TokenBucket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub strategy: RateLimitStrategy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1000,
            strategy: RateLimitStrategy::SlidingWindow,
        }
    }
}

// Static configuration for one upstream API endpoint. Immutable after
// registration.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub name: String,
    pub base_url: String,
    pub rate_limit: RateLimitConfig,
    pub cache_ttl: u64, // seconds, 0 disables caching
    pub timeout: u64,   // seconds
    pub headers: HashMap<String, String>,
    pub auth_required: bool,
}

// Lookup table from endpoint name to its configuration. Registration happens
// once at startup; lookups afterwards are read-only.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointConfig>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, config: EndpointConfig) {
        self.endpoints.insert(config.name.clone(), config);
    }

    pub fn resolve(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.endpoints.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn bearer_headers(api_token: &str) -> HashMap<String, String> {
    HashMap::from([("Authorization".to_string(), format!("Bearer {api_token}"))])
}

// Preset endpoints for the scraping provider. Quotas mirror the provider's
// published per-actor limits.
pub fn scraper_endpoints(api_token: &str) -> Vec<EndpointConfig> {
    vec![
        EndpointConfig {
            name: "facebook_scraper".to_string(),
            base_url: "https://api.apify.com/v2/acts/apify~facebook-posts-scraper/runs".to_string(),
            rate_limit: RateLimitConfig {
                requests_per_minute: 30,
                requests_per_hour: 500,
                strategy: RateLimitStrategy::SlidingWindow,
            },
            cache_ttl: 1800,
            timeout: 60,
            headers: bearer_headers(api_token),
            auth_required: true,
        },
        EndpointConfig {
            name: "instagram_scraper".to_string(),
            base_url: "https://api.apify.com/v2/acts/apify~instagram-scraper/runs".to_string(),
            rate_limit: RateLimitConfig {
                requests_per_minute: 25,
                requests_per_hour: 400,
                strategy: RateLimitStrategy::SlidingWindow,
            },
            cache_ttl: 1800,
            timeout: 60,
            headers: bearer_headers(api_token),
            auth_required: true,
        },
        EndpointConfig {
            name: "twitter_scraper".to_string(),
            base_url: "https://api.apify.com/v2/acts/apidojo~tweet-scraper-v2/runs".to_string(),
            rate_limit: RateLimitConfig {
                requests_per_minute: 20,
                requests_per_hour: 300,
                strategy: RateLimitStrategy::SlidingWindow,
            },
            cache_ttl: 1800,
            timeout: 60,
            headers: bearer_headers(api_token),
            auth_required: true,
        },
    ]
}

// Generic social media API endpoint, bursty traffic allowed
pub fn social_media_endpoint() -> EndpointConfig {
    EndpointConfig {
        name: "social_media_api".to_string(),
        base_url: "https://api.socialmedia.com/v1".to_string(),
        rate_limit: RateLimitConfig {
            requests_per_minute: 100,
            requests_per_hour: 2000,
            strategy: RateLimitStrategy::TokenBucket,
        },
        cache_ttl: 3600,
        timeout: 30,
        headers: HashMap::new(),
        auth_required: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let mut registry = EndpointRegistry::new();
        registry.register(social_media_endpoint());

        let config = registry.resolve("social_media_api").unwrap();
        assert_eq!(config.base_url, "https://api.socialmedia.com/v1");
        assert_eq!(config.rate_limit.strategy, RateLimitStrategy::TokenBucket);
        assert!(registry.resolve("unknown").is_none());
    }

    #[test]
    fn scraper_presets_carry_auth() {
        let endpoints = scraper_endpoints("tok-123");
        assert_eq!(endpoints.len(), 3);
        for config in &endpoints {
            assert!(config.auth_required);
            assert_eq!(
                config.headers.get("Authorization").map(String::as_str),
                Some("Bearer tok-123")
            );
            assert_eq!(config.rate_limit.strategy, RateLimitStrategy::SlidingWindow);
        }
    }
}
