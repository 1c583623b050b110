use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::gateway::ApiGateway;
use crate::stats::EndpointStats;

pub async fn all_stats_handler(State(gateway): State<Arc<ApiGateway>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "endpoints": gateway.all_stats(),
        "cache": gateway.cache_stats().await,
    }))
}

pub async fn endpoint_stats_handler(
    State(gateway): State<Arc<ApiGateway>>,
    Path(endpoint): Path<String>,
) -> Result<Json<EndpointStats>, GatewayError> {
    gateway
        .stats_for(&endpoint)
        .map(Json)
        .ok_or(GatewayError::Config(endpoint))
}
