//! Health check handler

use axum::{Json, extract::State};

use crate::web::{AppState, responses::HealthResponse};

/// Basic liveness plus cache occupancy
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.favicons.cache().stats().await;
    let now = chrono::Utc::now();

    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
        uptime_seconds: (now - state.started_at).num_seconds(),
        cache_entries: stats.entries,
        cache_capacity: stats.capacity,
        loaders: state.favicons.loader_names(),
    })
}
