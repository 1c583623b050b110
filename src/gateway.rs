use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::cache::{CacheStats, CacheStore, cache_key};
use crate::endpoints::{EndpointConfig, EndpointRegistry};
use crate::error::GatewayError;
use crate::metrics::{
    CACHE_HITS, CACHE_MISSES, RATE_LIMITED_WAITS, REQUEST_LATENCY, REQUEST_TOTAL,
};
use crate::models::FetchRequest;
use crate::rate_limit::RateLimiter;
use crate::stats::{EndpointStats, StatsRegistry};

// Floor for the backpressure loop when the limiter reports a zero wait while
// still denying (e.g. quota freed between the two calls)
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

// Orchestrates one outbound call: cache check, rate-limit wait, HTTP call,
// cache store, stats. Built once at startup, shared by reference, closed at
// shutdown.
pub struct ApiGateway {
    registry: EndpointRegistry,
    limiters: HashMap<String, RateLimiter>,
    client: reqwest::Client,
    cache: CacheStore,
    stats: StatsRegistry,
}

impl ApiGateway {
    pub fn new(cache: CacheStore) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent("scrape-gateway/0.1")
            .default_headers(default_headers)
            .pool_max_idle_per_host(20)
            .build()
            .expect("failed to build HTTP client");

        Self {
            registry: EndpointRegistry::new(),
            limiters: HashMap::new(),
            client,
            cache,
            stats: StatsRegistry::new(),
        }
    }

    // Registration happens once at startup, before the gateway is shared
    pub fn register_endpoint(&mut self, config: EndpointConfig) {
        info!(endpoint = %config.name, base_url = %config.base_url, "registered API endpoint");
        self.limiters
            .insert(config.name.clone(), RateLimiter::new(config.rate_limit.clone()));
        self.registry.register(config);
    }

    pub async fn request(&self, req: &FetchRequest) -> Result<serde_json::Value, GatewayError> {
        let started = Instant::now();
        REQUEST_TOTAL.inc();

        let endpoint = self
            .registry
            .resolve(&req.endpoint)
            .ok_or_else(|| GatewayError::Config(req.endpoint.clone()))?
            .clone();

        let url = build_url(&endpoint.base_url, &req.url);
        let method = req.method.to_uppercase();
        let key = cache_key(&endpoint.name, &method, &url, &req.params, req.body.as_ref());

        // cache hits consume no rate limit
        let cacheable = req.use_cache && method == "GET" && endpoint.cache_ttl > 0;
        if cacheable {
            if let Some(raw) = self.cache.get(&key).await {
                if let Ok(value) = serde_json::from_str(&raw) {
                    CACHE_HITS.inc();
                    debug!(endpoint = %endpoint.name, %url, "cache hit");
                    let duration = started.elapsed();
                    REQUEST_LATENCY.observe(duration.as_secs_f64());
                    self.stats.record_cache_hit(&endpoint.name, duration);
                    return Ok(value);
                }
            }
            CACHE_MISSES.inc();
        }

        self.wait_for_quota(&endpoint.name, req.api_key.as_deref())
            .await;

        let outcome = self.perform(&endpoint, &method, &url, req).await;

        if let Ok(value) = &outcome {
            if cacheable {
                self.cache
                    .set(&key, &value.to_string(), Duration::from_secs(endpoint.cache_ttl))
                    .await;
            }
        }

        let duration = started.elapsed();
        REQUEST_LATENCY.observe(duration.as_secs_f64());
        self.stats
            .record_request(&endpoint.name, duration, outcome.is_ok());
        outcome
    }

    // Blocking backpressure: a denied caller sleeps for the limiter's advised
    // wait and re-checks, deliberately without an upper bound, so the
    // effective outbound rate never exceeds the quota.
    async fn wait_for_quota(&self, endpoint: &str, api_key: Option<&str>) {
        let Some(limiter) = self.limiters.get(endpoint) else {
            return;
        };
        let key = api_key.unwrap_or(endpoint);

        let mut waited = false;
        while !limiter.allow(key) {
            if !waited {
                waited = true;
                RATE_LIMITED_WAITS.inc();
                self.stats.record_rate_limited(endpoint);
            }
            let mut wait = limiter.wait_time(key);
            if wait.is_zero() {
                wait = MIN_POLL_INTERVAL;
            }
            info!(endpoint, wait_secs = wait.as_secs_f64(), "rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    async fn perform(
        &self,
        endpoint: &EndpointConfig,
        method: &str,
        url: &str,
        req: &FetchRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| GatewayError::Network(format!("invalid HTTP method {method}")))?;

        let mut builder = self
            .client
            .request(method, url)
            .timeout(Duration::from_secs(endpoint.timeout));
        if !req.params.is_empty() {
            builder = builder.query(&req.params);
        }
        for (name, value) in &endpoint.headers {
            builder = builder.header(name, value);
        }
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }
        if endpoint.auth_required {
            if let Some(api_key) = &req.api_key {
                builder = builder.header("Authorization", format!("Bearer {api_key}"));
            }
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, endpoint.timeout))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify(e, endpoint.timeout))?;

        if !status.is_success() {
            error!(endpoint = %endpoint.name, %url, status = status.as_u16(), "API request failed");
            return Err(GatewayError::Network(format!(
                "{} returned status {}",
                endpoint.name,
                status.as_u16()
            )));
        }

        // non-JSON bodies are wrapped rather than rejected
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| {
            serde_json::json!({ "text": text, "status_code": status.as_u16() })
        }))
    }

    pub fn stats_for(&self, endpoint: &str) -> Option<EndpointStats> {
        self.registry.resolve(endpoint)?;
        Some(
            self.stats
                .snapshot(endpoint)
                .unwrap_or_else(|| EndpointStats::empty(endpoint)),
        )
    }

    pub fn all_stats(&self) -> Vec<EndpointStats> {
        self.stats.snapshot_all()
    }

    // Remove cached responses derived from one endpoint, or all of them
    pub async fn clear_cache(&self, endpoint: Option<&str>) -> u64 {
        let pattern = match endpoint {
            Some(name) => format!("api_cache:{name}:*"),
            None => "api_cache:*".to_string(),
        };
        let removed = self.cache.clear_pattern(&pattern).await;
        info!(endpoint = endpoint.unwrap_or("all"), removed, "cleared API cache");
        removed
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.registry.names()
    }

    // Explicit teardown: logs a final per-endpoint summary. Connections are
    // released on drop.
    pub async fn close(&self) {
        for snap in self.all_stats() {
            info!(
                endpoint = %snap.endpoint,
                total_requests = snap.total_requests,
                cache_hits = snap.cache_hits,
                errors = snap.errors,
                avg_response_time_ms = snap.avg_response_time_ms,
                "gateway closing"
            );
        }
    }
}

fn build_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else if url.is_empty() {
        base_url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

fn classify(error: reqwest::Error, timeout: u64) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout(timeout)
    } else {
        GatewayError::Network(error.to_string())
    }
}
