//! Browser session routes: forced sync and the login QR screenshot.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use super::{api_error, error_response, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync", post(sync))
        .route("/qr", get(qr))
        .route("/browser/status", get(browser_status))
}

#[derive(Debug, Default, Deserialize)]
struct SyncBody {
    #[serde(rename = "chatName")]
    chat_name: Option<String>,
}

fn no_session() -> ApiError {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "Browser not connected")
}

/// POST /api/sync: rescan the open chat, optionally checking its name.
async fn sync(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SyncBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let host = state.host().filter(|h| h.is_connected()).ok_or_else(no_session)?;
    // An empty or missing body syncs whatever chat is open.
    let target = body
        .ok()
        .and_then(|Json(b)| b.chat_name)
        .filter(|n| !n.trim().is_empty());
    let report = host.manual_sync(target).await.map_err(|e| {
        warn!("Sync failed: {}", e);
        api_error(e)
    })?;
    Ok(Json(report))
}

/// GET /api/qr: base64 PNG of the page for remote QR login.
async fn qr(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let host = state.host().filter(|h| h.is_connected()).ok_or_else(no_session)?;
    let png = host.qr_screenshot().await.map_err(api_error)?;
    Ok(Json(serde_json::json!({
        "image": format!("data:image/png;base64,{}", png),
        "data": png,
    })))
}

/// GET /api/browser/status: session and capture status.
async fn browser_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.host() {
        Some(host) => Json(serde_json::to_value(host.status().await).unwrap_or_default()),
        None => Json(serde_json::json!({ "running": false })),
    }
}
