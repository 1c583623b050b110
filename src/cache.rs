use dashmap::DashMap;
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::metrics::CACHE_SIZE;

// Cached value plus the insertion time it was stored with. Expiry is checked
// lazily on read; nothing actively evicts.
#[derive(Clone)]
struct MemoryEntry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

enum Backend {
    Redis {
        conn: redis::aio::MultiplexedConnection,
    },
    Memory {
        map: DashMap<String, MemoryEntry>,
        scratch_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub backend: &'static str,
    pub key_count: u64,
}

// Create a cache key for a request (endpoint-prefixed hash of method, URL,
// sorted query params and body)
pub fn cache_key(
    endpoint: &str,
    method: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    body: Option<&serde_json::Value>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(b"\n");
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    for (key, value) in params {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"&");
    }
    hasher.update(b"\n");
    if let Some(body) = body {
        hasher.update(body.to_string().as_bytes());
    }
    format!("api_cache:{endpoint}:{:x}", hasher.finalize())
}

// Key/value store with TTL expiry. The backend is picked once at
// construction: redis when reachable, otherwise an in-process map for the
// lifetime of the process. Backend I/O errors degrade to "no cache" and are
// never surfaced to callers.
pub struct CacheStore {
    backend: Backend,
}

impl CacheStore {
    pub async fn connect(redis_url: &str, scratch_dir: PathBuf) -> Self {
        match Self::probe(redis_url).await {
            Ok(conn) => {
                info!("redis cache initialized");
                Self {
                    backend: Backend::Redis { conn },
                }
            }
            Err(e) => {
                warn!(error = %e, "redis not available, using in-memory cache");
                Self::in_memory(scratch_dir)
            }
        }
    }

    pub fn in_memory(scratch_dir: PathBuf) -> Self {
        Self {
            backend: Backend::Memory {
                map: DashMap::new(),
                scratch_dir,
            },
        }
    }

    async fn probe(redis_url: &str) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(conn)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match &self.backend {
            Backend::Redis { conn } => {
                let mut conn = conn.clone();
                match conn.get::<_, Option<String>>(key).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(key, error = %e, "cache get failed");
                        None
                    }
                }
            }
            Backend::Memory { map, .. } => {
                // expired entries are hidden on read and dropped in passing
                map.remove_if(key, |_, entry| entry.inserted_at.elapsed() >= entry.ttl);
                map.get(key).map(|entry| entry.value.clone())
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        if ttl.is_zero() {
            return false;
        }

        match &self.backend {
            Backend::Redis { conn } => {
                let mut conn = conn.clone();
                match conn
                    .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(key, error = %e, "cache set failed");
                        false
                    }
                }
            }
            Backend::Memory { map, .. } => {
                map.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: value.to_string(),
                        inserted_at: Instant::now(),
                        ttl,
                    },
                );
                CACHE_SIZE.set(map.len() as f64);
                true
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match &self.backend {
            Backend::Redis { conn } => {
                let mut conn = conn.clone();
                match conn.del::<_, i64>(key).await {
                    Ok(removed) => removed > 0,
                    Err(e) => {
                        warn!(key, error = %e, "cache delete failed");
                        false
                    }
                }
            }
            Backend::Memory { map, scratch_dir } => {
                let _ = tokio::fs::remove_file(blob_path(scratch_dir, key)).await;
                let removed = map.remove(key).is_some();
                CACHE_SIZE.set(map.len() as f64);
                removed
            }
        }
    }

    // Remove every key matching a glob pattern, returning how many went away
    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        match &self.backend {
            Backend::Redis { conn } => {
                let mut conn = conn.clone();
                let keys: Vec<String> = match conn.keys(pattern).await {
                    Ok(keys) => keys,
                    Err(e) => {
                        warn!(pattern, error = %e, "cache pattern scan failed");
                        return 0;
                    }
                };
                if keys.is_empty() {
                    return 0;
                }
                match conn.del::<_, i64>(keys).await {
                    Ok(removed) => removed.max(0) as u64,
                    Err(e) => {
                        warn!(pattern, error = %e, "cache pattern clear failed");
                        0
                    }
                }
            }
            Backend::Memory { map, scratch_dir } => {
                let needle = pattern.replace('*', "");
                let matches: Vec<String> = map
                    .iter()
                    .filter(|entry| entry.key().contains(&needle))
                    .map(|entry| entry.key().clone())
                    .collect();
                for key in &matches {
                    let _ = tokio::fs::remove_file(blob_path(scratch_dir, key)).await;
                    map.remove(key);
                }
                CACHE_SIZE.set(map.len() as f64);
                matches.len() as u64
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        match &self.backend {
            Backend::Redis { conn } => {
                let mut conn = conn.clone();
                let key_count: i64 = redis::cmd("DBSIZE")
                    .query_async(&mut conn)
                    .await
                    .unwrap_or(0);
                CacheStats {
                    backend: "redis",
                    key_count: key_count.max(0) as u64,
                }
            }
            Backend::Memory { map, .. } => CacheStats {
                backend: "memory",
                key_count: map.len() as u64,
            },
        }
    }

    // Binary payloads (generated report bytes) take a parallel path: metadata
    // is a normal cache value under `key`, the body lives under a derived key.
    // On the in-memory backend the body spills to the scratch directory
    // instead of the map.
    pub async fn set_blob(
        &self,
        key: &str,
        bytes: &[u8],
        metadata: &serde_json::Value,
        ttl: Duration,
    ) -> bool {
        if !self.set(key, &metadata.to_string(), ttl).await {
            return false;
        }

        match &self.backend {
            Backend::Redis { conn } => {
                let mut conn = conn.clone();
                match conn
                    .set_ex::<_, _, ()>(format!("{key}:bin"), bytes, ttl.as_secs().max(1))
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(key, error = %e, "blob cache set failed");
                        false
                    }
                }
            }
            Backend::Memory { scratch_dir, .. } => {
                if tokio::fs::create_dir_all(scratch_dir).await.is_err() {
                    return false;
                }
                match tokio::fs::write(blob_path(scratch_dir, key), bytes).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(key, error = %e, "blob spill to disk failed");
                        false
                    }
                }
            }
        }
    }

    // Returns the body and its metadata; absent once the metadata entry has
    // expired, so spilled files never outlive their TTL from a reader's view.
    pub async fn get_blob(&self, key: &str) -> Option<(Vec<u8>, serde_json::Value)> {
        let raw = self.get(key).await?;
        let metadata: serde_json::Value = serde_json::from_str(&raw).ok()?;

        match &self.backend {
            Backend::Redis { conn } => {
                let mut conn = conn.clone();
                match conn.get::<_, Option<Vec<u8>>>(format!("{key}:bin")).await {
                    Ok(Some(bytes)) => Some((bytes, metadata)),
                    Ok(None) => None,
                    Err(e) => {
                        warn!(key, error = %e, "blob cache get failed");
                        None
                    }
                }
            }
            Backend::Memory { scratch_dir, .. } => {
                match tokio::fs::read(blob_path(scratch_dir, key)).await {
                    Ok(bytes) => Some((bytes, metadata)),
                    Err(_) => None,
                }
            }
        }
    }
}

fn blob_path(scratch_dir: &Path, key: &str) -> PathBuf {
    scratch_dir.join(format!("{:x}.bin", Sha256::digest(key.as_bytes())))
}

// Memoize an async computation through the cache: deterministic
// caller-supplied key, TTL-scoped reuse. Composed explicitly at the call
// site.
pub async fn memoized<T, E, F, Fut>(
    store: &CacheStore,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(raw) = store.get(key).await {
        if let Ok(value) = serde_json::from_str(&raw) {
            debug!(key, "memoized value served from cache");
            return Ok(value);
        }
    }

    let value = compute().await?;
    if let Ok(raw) = serde_json::to_string(&value) {
        store.set(key, &raw, ttl).await;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> CacheStore {
        CacheStore::in_memory(std::env::temp_dir().join("scrape-gateway-test"))
    }

    #[tokio::test]
    async fn round_trip_and_ttl_expiry() {
        let cache = store();

        assert!(cache.set("k1", "v1", Duration::from_millis(80)).await);
        assert_eq!(cache.get("k1").await.as_deref(), Some("v1"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get("k1").await, None);
    }

    #[tokio::test]
    async fn zero_ttl_disables_storage() {
        let cache = store();
        assert!(!cache.set("k", "v", Duration::ZERO).await);
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn delete_and_clear_pattern() {
        let cache = store();
        let ttl = Duration::from_secs(60);

        cache.set("api_cache:profiles:aaa", "1", ttl).await;
        cache.set("api_cache:profiles:bbb", "2", ttl).await;
        cache.set("api_cache:scraper:ccc", "3", ttl).await;

        assert!(cache.delete("api_cache:profiles:aaa").await);
        assert!(!cache.delete("api_cache:profiles:aaa").await);

        assert_eq!(cache.clear_pattern("api_cache:profiles:*").await, 1);
        assert_eq!(cache.get("api_cache:profiles:bbb").await, None);
        assert!(cache.get("api_cache:scraper:ccc").await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.key_count, 1);
    }

    #[test]
    fn cache_keys_are_deterministic_and_distinct() {
        let params_a = BTreeMap::from([("user".to_string(), "alice".to_string())]);
        let params_b = BTreeMap::from([("user".to_string(), "bob".to_string())]);

        let key_1 = cache_key("profiles", "GET", "http://x/v1", &params_a, None);
        let key_2 = cache_key("profiles", "GET", "http://x/v1", &params_a, None);
        let key_3 = cache_key("profiles", "GET", "http://x/v1", &params_b, None);
        let key_4 = cache_key("scraper", "GET", "http://x/v1", &params_a, None);

        assert_eq!(key_1, key_2);
        assert_ne!(key_1, key_3);
        assert_ne!(key_1, key_4);
        assert!(key_1.starts_with("api_cache:profiles:"));
    }

    #[tokio::test]
    async fn blob_spills_to_scratch_dir_and_honors_ttl() {
        let scratch = tempfile::tempdir().unwrap();
        let cache = CacheStore::in_memory(scratch.path().to_path_buf());
        let metadata = serde_json::json!({ "report_id": "r-1", "pages": 4 });
        let bytes = vec![0x25, 0x50, 0x44, 0x46];

        assert!(
            cache
                .set_blob("report:r-1", &bytes, &metadata, Duration::from_millis(80))
                .await
        );

        let (body, meta) = cache.get_blob("report:r-1").await.unwrap();
        assert_eq!(body, bytes);
        assert_eq!(meta["pages"], 4);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get_blob("report:r-1").await.is_none());
    }

    #[tokio::test]
    async fn memoized_reuses_cached_result() {
        let cache = store();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, &str> =
                memoized(&cache, "memo:answer", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value.unwrap(), 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
