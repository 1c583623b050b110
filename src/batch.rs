use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::GatewayError;
use crate::gateway::ApiGateway;
use crate::models::FetchRequest;

// Fan out many gateway calls under a concurrency cap. Results come back in
// input order and one item's failure never touches the others. The dispatcher
// owns its own concurrency domain; nesting dispatch calls multiplies the
// caps.
pub async fn dispatch(
    gateway: Arc<ApiGateway>,
    items: Vec<FetchRequest>,
    max_concurrent: usize,
) -> Vec<Result<serde_json::Value, GatewayError>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let gateway = Arc::clone(&gateway);
            let semaphore = Arc::clone(&semaphore);
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| GatewayError::Network("batch dispatcher shut down".to_string()))?;
                gateway.request(&item).await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(GatewayError::Network(format!("batch task failed: {e}"))),
        });
    }
    results
}
