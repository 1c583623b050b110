use axum::{Json, extract::State};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::gateway::ApiGateway;
use crate::models::FetchRequest;

// One proxied outbound call through the gateway
pub async fn fetch_handler(
    State(gateway): State<Arc<ApiGateway>>,
    Json(payload): Json<FetchRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    gateway.request(&payload).await.map(Json)
}
