use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use scrape_gateway::batch;
use scrape_gateway::{
    ApiGateway, CacheStore, EndpointConfig, FetchRequest, GatewayError, RateLimitConfig,
    RateLimitStrategy,
};

// Instrumented fake upstream: counts calls that actually reach the network
// and tracks how many are in flight at once.
#[derive(Default)]
struct Upstream {
    hits: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

async fn ok_handler(State(upstream): State<Arc<Upstream>>) -> Json<serde_json::Value> {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    Json(serde_json::json!({ "ok": true }))
}

async fn echo_handler(
    State(upstream): State<Arc<Upstream>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    Json(serde_json::json!({ "i": params.get("i").cloned().unwrap_or_default() }))
}

async fn slow_handler(State(upstream): State<Arc<Upstream>>) -> Json<serde_json::Value> {
    let current = upstream.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    upstream.peak_in_flight.fetch_max(current, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    upstream.in_flight.fetch_sub(1, Ordering::SeqCst);
    Json(serde_json::json!({ "ok": true }))
}

async fn fail_handler(State(upstream): State<Arc<Upstream>>) -> (StatusCode, &'static str) {
    upstream.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn sleepy_handler() -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(serde_json::json!({ "ok": true }))
}

async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/ok", get(ok_handler))
        .route("/echo", get(echo_handler))
        .route("/slow", get(slow_handler))
        .route("/fail", get(fail_handler))
        .route("/sleepy", get(sleepy_handler))
        .with_state(Arc::clone(&upstream));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), upstream)
}

fn endpoint(name: &str, base_url: &str, cache_ttl: u64, rate: RateLimitConfig) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        rate_limit: rate,
        cache_ttl,
        timeout: 2,
        headers: HashMap::new(),
        auth_required: false,
    }
}

fn generous_rate() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_minute: 10_000,
        requests_per_hour: 100_000,
        strategy: RateLimitStrategy::SlidingWindow,
    }
}

fn gateway_with(endpoints: Vec<EndpointConfig>) -> ApiGateway {
    let scratch = std::env::temp_dir().join("scrape-gateway-it");
    let mut gateway = ApiGateway::new(CacheStore::in_memory(scratch));
    for config in endpoints {
        gateway.register_endpoint(config);
    }
    gateway
}

#[tokio::test]
async fn cached_get_hits_network_once() {
    let (base_url, upstream) = spawn_upstream().await;
    let gateway = gateway_with(vec![endpoint("profiles", &base_url, 60, generous_rate())]);

    let req = FetchRequest::get("profiles", "/ok");
    gateway.request(&req).await.unwrap();
    gateway.request(&req).await.unwrap();

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);

    let stats = gateway.stats_for("profiles").unwrap();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.errors, 0);

    // clearing the endpoint's cache forces a fresh network call
    gateway.clear_cache(Some("profiles")).await;
    gateway.request(&req).await.unwrap();
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn uncached_requests_always_reach_network() {
    let (base_url, upstream) = spawn_upstream().await;
    let gateway = gateway_with(vec![endpoint("profiles", &base_url, 60, generous_rate())]);

    let mut req = FetchRequest::get("profiles", "/ok");
    req.use_cache = false;
    gateway.request(&req).await.unwrap();
    gateway.request(&req).await.unwrap();

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn differing_params_miss_the_cache() {
    let (base_url, upstream) = spawn_upstream().await;
    let gateway = gateway_with(vec![endpoint("profiles", &base_url, 60, generous_rate())]);

    let mut first = FetchRequest::get("profiles", "/echo");
    first.params.insert("i".to_string(), "1".to_string());
    let mut second = first.clone();
    second.params.insert("i".to_string(), "2".to_string());

    let value = gateway.request(&first).await.unwrap();
    assert_eq!(value["i"], "1");
    let value = gateway.request(&second).await.unwrap();
    assert_eq!(value["i"], "2");

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unregistered_endpoint_is_a_config_error() {
    let gateway = gateway_with(vec![]);

    let err = gateway
        .request(&FetchRequest::get("missing", "/x"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Config(_)));
}

#[tokio::test]
async fn upstream_failure_is_a_network_error() {
    let (base_url, _upstream) = spawn_upstream().await;
    let gateway = gateway_with(vec![endpoint("flaky", &base_url, 0, generous_rate())]);

    let err = gateway
        .request(&FetchRequest::get("flaky", "/fail"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));

    let stats = gateway.stats_for("flaky").unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.total_requests, 1);
}

#[tokio::test]
async fn slow_upstream_is_a_timeout_error() {
    let (base_url, _upstream) = spawn_upstream().await;
    let mut config = endpoint("sleepy", &base_url, 0, generous_rate());
    config.timeout = 1;
    let gateway = gateway_with(vec![config]);

    let err = gateway
        .request(&FetchRequest::get("sleepy", "/sleepy"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Timeout(1)));
}

#[tokio::test]
async fn exhausted_quota_blocks_then_succeeds() {
    let (base_url, _upstream) = spawn_upstream().await;
    // 30/min token bucket: one token every 2 seconds once the burst is spent
    let gateway = gateway_with(vec![endpoint(
        "bucket",
        &base_url,
        0,
        RateLimitConfig {
            requests_per_minute: 30,
            requests_per_hour: 100_000,
            strategy: RateLimitStrategy::TokenBucket,
        },
    )]);

    let req = FetchRequest::get("bucket", "/ok");
    for _ in 0..30 {
        gateway.request(&req).await.unwrap();
    }

    // the 31st call is never rejected, it waits for a token
    let started = Instant::now();
    gateway.request(&req).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(500));

    let stats = gateway.stats_for("bucket").unwrap();
    assert_eq!(stats.rate_limited_waits, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.total_requests, 31);
}

#[tokio::test]
async fn batch_respects_the_concurrency_cap() {
    let (base_url, upstream) = spawn_upstream().await;
    let gateway = Arc::new(gateway_with(vec![endpoint(
        "slow",
        &base_url,
        0,
        generous_rate(),
    )]));

    let items: Vec<FetchRequest> = (0..10).map(|_| FetchRequest::get("slow", "/slow")).collect();
    let results = batch::dispatch(Arc::clone(&gateway), items, 3).await;

    assert_eq!(results.len(), 10);
    assert!(results.iter().all(Result::is_ok));
    assert!(upstream.peak_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0); // /slow does not bump hits
}

#[tokio::test]
async fn batch_preserves_order_and_isolates_failures() {
    let (base_url, _upstream) = spawn_upstream().await;
    let gateway = Arc::new(gateway_with(vec![endpoint(
        "echo",
        &base_url,
        0,
        generous_rate(),
    )]));

    let mut items: Vec<FetchRequest> = (0..6)
        .map(|i| {
            let mut req = FetchRequest::get("echo", "/echo");
            req.params.insert("i".to_string(), i.to_string());
            req
        })
        .collect();
    // a descriptor for an unregistered endpoint fails only its own slot
    items[2] = FetchRequest::get("unregistered", "/echo");

    let results = batch::dispatch(Arc::clone(&gateway), items, 4).await;

    assert_eq!(results.len(), 6);
    for (i, outcome) in results.iter().enumerate() {
        if i == 2 {
            assert!(matches!(outcome, Err(GatewayError::Config(_))));
        } else {
            assert_eq!(outcome.as_ref().unwrap()["i"], i.to_string());
        }
    }
}
