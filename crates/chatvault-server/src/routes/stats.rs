//! Stats and health routes.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::{api_error, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/health", get(health))
}

/// GET /api/stats: storage statistics.
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .with_store(|store| store.get_stats())
        .await
        .map_err(api_error)?;
    Ok(Json(stats))
}

/// GET /api/health: liveness, ingest mode and browser state.
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "startedAt": state.started_at,
        "ingestMode": if state.router.is_remote() { "remote" } else { "local" },
        "browser": state.host().map(|h| h.is_connected()).unwrap_or(false),
    }))
}
