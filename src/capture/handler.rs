use crate::capture::CaptureRequest;
use crate::engine::AnalyticsEngine;
use crate::error::{AppError, AppResult, LoggedJson};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

/// POST /v1/events — capture a single error event.
pub async fn capture_event(
    State(engine): State<Arc<AnalyticsEngine>>,
    LoggedJson(req): LoggedJson<CaptureRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let id = engine.capture_event(req);
    (StatusCode::ACCEPTED, Json(json!({ "id": id })))
}

/// POST /v1/events/batch — capture up to `capture.max_batch_size` events in
/// one request. Per-item semantics are identical to the single endpoint.
pub async fn capture_batch(
    State(engine): State<Arc<AnalyticsEngine>>,
    LoggedJson(reqs): LoggedJson<Vec<CaptureRequest>>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let max = engine.config().capture.max_batch_size;
    if reqs.is_empty() {
        return Err(AppError::Validation("batch must not be empty".to_string()));
    }
    if reqs.len() > max {
        return Err(AppError::Validation(format!(
            "batch size {} exceeds maximum of {max}",
            reqs.len()
        )));
    }

    let ids: Vec<String> = reqs.into_iter().map(|r| engine.capture_event(r)).collect();
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": ids.len(), "ids": ids })),
    ))
}
