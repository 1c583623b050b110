use axum::{Json, extract::State};
use std::sync::Arc;

use crate::batch;
use crate::gateway::ApiGateway;
use crate::models::BatchRequest;

// Fan a batch of descriptors through the dispatcher; each slot carries either
// a result or an error
pub async fn batch_handler(
    State(gateway): State<Arc<ApiGateway>>,
    Json(payload): Json<BatchRequest>,
) -> Json<Vec<serde_json::Value>> {
    let results = batch::dispatch(gateway, payload.items, payload.max_concurrent).await;

    Json(
        results
            .into_iter()
            .map(|outcome| match outcome {
                Ok(value) => serde_json::json!({ "result": value }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            })
            .collect(),
    )
}
