use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// Errors surfaced by a gateway request. Rate-limit denial is not an error,
// it is absorbed into a blocking wait. Cache failures never reach here.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("endpoint {0} is not registered")]
    Config(String),

    #[error("request failed: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Config(_) => StatusCode::NOT_FOUND,
            GatewayError::Network(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };

        let body = Json(serde_json::json!({
            "code": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
