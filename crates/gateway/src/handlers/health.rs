//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use lendscope_common::errors::Result;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: lendscope_common::VERSION,
    })
}

/// Readiness probe: verifies database connectivity
pub async fn ready(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.store.ping().await?;
    Ok(Json(HealthResponse {
        status: "ready",
        version: lendscope_common::VERSION,
    }))
}
