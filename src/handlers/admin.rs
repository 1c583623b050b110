use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use crate::gateway::ApiGateway;

#[derive(Debug, Deserialize, Default)]
pub struct ClearCacheRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
}

pub async fn clear_cache_handler(
    State(gateway): State<Arc<ApiGateway>>,
    Json(payload): Json<ClearCacheRequest>,
) -> Json<serde_json::Value> {
    let removed = gateway.clear_cache(payload.endpoint.as_deref()).await;
    Json(serde_json::json!({ "removed": removed }))
}
