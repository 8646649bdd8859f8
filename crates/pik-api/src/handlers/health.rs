//! Liveness/readiness probes. No spec route names these explicitly, but
//! every service in the corpus carries them, and the reaper/SSE fan-out
//! make "is the pool actually up" worth checking before traffic routes here.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub database: bool,
}

pub async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let db_ok = state.db.health_check().await.unwrap_or(false);
    let status_code = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let status = if db_ok { "ready" } else { "not_ready" };

    (status_code, Json(ReadinessResponse { status: status.to_string(), database: db_ok }))
}
