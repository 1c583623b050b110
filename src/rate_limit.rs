use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::endpoints::{RateLimitConfig, RateLimitStrategy};

// Per-key limiter state. One struct serves all strategies; each strategy only
// touches its own fields.
struct KeyState {
    requests: VecDeque<f64>, // accepted-call timestamps, oldest first
    tokens: f64,
    last_refill: f64,
    window_start: f64,
    window_count: u32,
}

impl KeyState {
    fn new(config: &RateLimitConfig, now: f64) -> Self {
        Self {
            requests: VecDeque::new(),
            tokens: config.requests_per_minute as f64,
            last_refill: now,
            window_start: 0.0,
            window_count: 0,
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

// Enforces a per-key request quota under the configured strategy. Every check
// is a read-modify-write on shared state, so all of them run under one lock.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<HashMap<String, KeyState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    // Check whether a call for `key` is admitted right now; admission records
    // the call against the quota.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key, unix_now())
    }

    // How long until the next call for `key` could be admitted. Zero when a
    // call would be admitted immediately.
    pub fn wait_time(&self, key: &str) -> Duration {
        Duration::from_secs_f64(self.wait_secs(key, unix_now()).max(0.0))
    }

    fn check(&self, key: &str, now: f64) -> bool {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entry(key.to_string())
            .or_insert_with(|| KeyState::new(&self.config, now));

        match self.config.strategy {
            RateLimitStrategy::SlidingWindow => self.sliding_window_check(entry, now),
            RateLimitStrategy::TokenBucket => self.token_bucket_check(entry, now),
            RateLimitStrategy::FixedWindow => self.fixed_window_check(entry, now),
        }
    }

    fn wait_secs(&self, key: &str, now: f64) -> f64 {
        let state = self.state.lock().unwrap();
        let Some(entry) = state.get(key) else {
            return 0.0;
        };

        match self.config.strategy {
            RateLimitStrategy::SlidingWindow => self.sliding_window_wait(entry, now),
            RateLimitStrategy::TokenBucket => self.token_bucket_wait(entry),
            RateLimitStrategy::FixedWindow => self.fixed_window_wait(entry, now),
        }
    }

    // Sliding window: timestamps are retained for a full hour so both the
    // per-minute and per-hour caps hold over their trailing intervals.
    fn sliding_window_check(&self, entry: &mut KeyState, now: f64) -> bool {
        while let Some(&oldest) = entry.requests.front() {
            if now - oldest > 3600.0 {
                entry.requests.pop_front();
            } else {
                break;
            }
        }

        let minute_count = entry
            .requests
            .iter()
            .rev()
            .take_while(|&&t| now - t < 60.0)
            .count();
        if minute_count >= self.config.requests_per_minute as usize {
            return false;
        }
        if entry.requests.len() >= self.config.requests_per_hour as usize {
            return false;
        }

        entry.requests.push_back(now);
        true
    }

    fn sliding_window_wait(&self, entry: &KeyState, now: f64) -> f64 {
        let minute: Vec<f64> = entry
            .requests
            .iter()
            .copied()
            .filter(|&t| now - t < 60.0)
            .collect();
        if minute.len() >= self.config.requests_per_minute as usize {
            // admitted again once the oldest in-minute call ages past 60s
            return (60.0 - (now - minute[0])).max(0.0);
        }
        if entry.requests.len() >= self.config.requests_per_hour as usize {
            if let Some(&oldest) = entry.requests.front() {
                return (3600.0 - (now - oldest)).max(0.0);
            }
        }
        0.0
    }

    // Token bucket: capacity = requests_per_minute, refilled lazily at
    // capacity/60 tokens per second.
    fn token_bucket_check(&self, entry: &mut KeyState, now: f64) -> bool {
        let capacity = self.config.requests_per_minute as f64;
        let elapsed = (now - entry.last_refill).max(0.0);

        entry.tokens = (entry.tokens + elapsed * capacity / 60.0).min(capacity);
        entry.last_refill = now;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            return true;
        }
        false
    }

    fn token_bucket_wait(&self, entry: &KeyState) -> f64 {
        if entry.tokens < 1.0 {
            return (1.0 - entry.tokens) * 60.0 / self.config.requests_per_minute as f64;
        }
        0.0
    }

    // Fixed window: counter resets when the minute-aligned window rolls over
    fn fixed_window_check(&self, entry: &mut KeyState, now: f64) -> bool {
        let window = (now / 60.0).floor() * 60.0;
        if entry.window_start != window {
            entry.window_start = window;
            entry.window_count = 0;
        }

        if entry.window_count < self.config.requests_per_minute {
            entry.window_count += 1;
            return true;
        }
        false
    }

    fn fixed_window_wait(&self, entry: &KeyState, now: f64) -> f64 {
        if entry.window_count >= self.config.requests_per_minute {
            return (entry.window_start + 60.0 - now).max(0.0);
        }
        0.0
    }
}
