use crate::engine::AnalyticsEngine;
use crate::error::{AppError, AppResult, LoggedJson};
use crate::types::{
    ErrorPattern, HealthResponse, Resolution, ResolutionStatus, RootCauseAnalysis, TrendAnalysis,
};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// GET /health
pub async fn health(State(engine): State<Arc<AnalyticsEngine>>) -> Json<HealthResponse> {
    let db_ok = engine.gateway().ping().await;
    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" }.to_string(),
        db_ok,
        buffered_events: engine.buffered_events(),
        tracked_patterns: engine.tracked_patterns(),
    })
}

/// GET /v1/patterns — all tracked patterns, most recently seen first.
pub async fn list_patterns(
    State(engine): State<Arc<AnalyticsEngine>>,
) -> Json<Vec<ErrorPattern>> {
    let mut patterns = engine.patterns();
    patterns.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
    Json(patterns)
}

/// GET /v1/patterns/{id}
pub async fn get_pattern(
    State(engine): State<Arc<AnalyticsEngine>>,
    Path(id): Path<String>,
) -> AppResult<Json<ErrorPattern>> {
    engine
        .pattern(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("unknown pattern: {id}")))
}

/// GET /v1/analysis — computed fresh per call, never cached.
pub async fn get_analysis(State(engine): State<Arc<AnalyticsEngine>>) -> Json<TrendAnalysis> {
    Json(engine.analyze(chrono::Utc::now().timestamp_millis()))
}

/// GET /v1/errors/{id}/root-cause — `null` body when no attribution is
/// possible (unknown id, lookup failure, or timeout).
pub async fn get_root_cause(
    State(engine): State<Arc<AnalyticsEngine>>,
    Path(id): Path<String>,
) -> Json<Option<RootCauseAnalysis>> {
    Json(engine.root_cause(&id).await)
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub status: ResolutionStatus,
    pub action: String,
    pub resolved_by: Option<String>,
}

/// POST /v1/patterns/{id}/resolve
pub async fn resolve_pattern(
    State(engine): State<Arc<AnalyticsEngine>>,
    Path(id): Path<String>,
    LoggedJson(req): LoggedJson<ResolveRequest>,
) -> AppResult<Json<ErrorPattern>> {
    if req.action.trim().is_empty() {
        return Err(AppError::Validation(
            "resolution action must not be empty".to_string(),
        ));
    }

    let resolution = Resolution {
        status: req.status,
        action: req.action,
        resolved_at: chrono::Utc::now().timestamp_millis(),
        resolved_by: req.resolved_by,
    };

    engine
        .resolve_pattern(&id, resolution)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("unknown pattern: {id}")))
}
