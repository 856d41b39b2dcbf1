use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::data_source::StateDataSource;

/// Readiness checks slower than this report the service as unavailable
const READINESS_DEADLINE: Duration = Duration::from_secs(10);

fn unavailable(reason: &str) -> Response {
    let body = serde_json::json!({"status": "failure", "message": reason});
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}

#[tracing::instrument]
pub async fn handler(data_src: StateDataSource) -> Response {
    let outcome = tokio::time::timeout(READINESS_DEADLINE, data_src.check()).await;
    match outcome {
        Ok(Ok(())) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Ok(Err(e)) => unavailable(&e.to_string()),
        Err(_) => unavailable("readiness check timed out"),
    }
}
