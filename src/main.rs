use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrape_gateway::cache::CacheStore;
use scrape_gateway::config::Args;
use scrape_gateway::endpoints;
use scrape_gateway::gateway::ApiGateway;
use scrape_gateway::handlers::{
    all_stats_handler, batch_handler, clear_cache_handler, endpoint_stats_handler, fetch_handler,
    health_handler, metrics_handler,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // backend is picked once here; no per-call failover afterwards
    let cache = CacheStore::connect(&args.redis_url, PathBuf::from(&args.scratch_dir)).await;

    let mut gateway = ApiGateway::new(cache);
    match &args.scraper_token {
        Some(token) => {
            for config in endpoints::scraper_endpoints(token) {
                gateway.register_endpoint(config);
            }
        }
        None => tracing::warn!("no scraper token supplied, provider endpoints not registered"),
    }
    gateway.register_endpoint(endpoints::social_media_endpoint());

    let gateway = Arc::new(gateway);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(all_stats_handler))
        .route("/stats/{endpoint}", get(endpoint_stats_handler))
        .route("/fetch", post(fetch_handler))
        .route("/batch", post(batch_handler))
        .route("/cache/clear", post(clear_cache_handler))
        .with_state(Arc::clone(&gateway));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    tracing::info!(
        port = args.port,
        endpoints = gateway.endpoints().len(),
        "gateway running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    gateway.close().await;
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
