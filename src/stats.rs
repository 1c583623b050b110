use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

// Running counters for one endpoint. Mutated only by the gateway after each
// call; external callers see read-only snapshots.
#[derive(Debug, Default, Clone)]
struct RequestStats {
    total_requests: u64,
    cache_hits: u64,
    rate_limited: u64,
    errors: u64,
    avg_response_time: f64, // seconds, incremental mean
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub rate_limited_waits: u64,
    pub errors: u64,
    pub avg_response_time_ms: f64,
    pub cache_hit_rate_pct: f64,
    pub error_rate_pct: f64,
}

impl EndpointStats {
    pub fn empty(endpoint: &str) -> Self {
        RequestStats::default().snapshot(endpoint)
    }
}

impl RequestStats {
    fn record(&mut self, duration: Duration, success: bool) {
        self.total_requests += 1;
        let secs = duration.as_secs_f64();
        self.avg_response_time += (secs - self.avg_response_time) / self.total_requests as f64;
        if !success {
            self.errors += 1;
        }
    }

    fn snapshot(&self, endpoint: &str) -> EndpointStats {
        let total = self.total_requests.max(1) as f64;
        EndpointStats {
            endpoint: endpoint.to_string(),
            total_requests: self.total_requests,
            cache_hits: self.cache_hits,
            rate_limited_waits: self.rate_limited,
            errors: self.errors,
            avg_response_time_ms: self.avg_response_time * 1000.0,
            cache_hit_rate_pct: self.cache_hits as f64 / total * 100.0,
            error_rate_pct: self.errors as f64 / total * 100.0,
        }
    }
}

#[derive(Default)]
pub struct StatsRegistry {
    inner: Mutex<HashMap<String, RequestStats>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, endpoint: &str, duration: Duration, success: bool) {
        let mut stats = self.inner.lock().unwrap();
        stats.entry(endpoint.to_string()).or_default().record(duration, success);
    }

    // A cache hit still counts as a served request
    pub fn record_cache_hit(&self, endpoint: &str, duration: Duration) {
        let mut stats = self.inner.lock().unwrap();
        let entry = stats.entry(endpoint.to_string()).or_default();
        entry.cache_hits += 1;
        entry.record(duration, true);
    }

    pub fn record_rate_limited(&self, endpoint: &str) {
        let mut stats = self.inner.lock().unwrap();
        stats.entry(endpoint.to_string()).or_default().rate_limited += 1;
    }

    pub fn snapshot(&self, endpoint: &str) -> Option<EndpointStats> {
        let stats = self.inner.lock().unwrap();
        stats.get(endpoint).map(|entry| entry.snapshot(endpoint))
    }

    pub fn snapshot_all(&self) -> Vec<EndpointStats> {
        let stats = self.inner.lock().unwrap();
        let mut all: Vec<EndpointStats> = stats
            .iter()
            .map(|(name, entry)| entry.snapshot(name))
            .collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        all
    }
}
