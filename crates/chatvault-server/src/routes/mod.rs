//! HTTP route handlers.

pub mod ingest;
pub mod messages;
pub mod stats;
pub mod sync;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{Json, Router};
use chatvault_core::Error;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Inlined attachments make ingest bodies large.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let media = ServeDir::new(&state.config.data_paths.media);
    Router::new()
        .nest("/api", api_routes())
        .nest_service("/media", media)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(messages::routes())
        .merge(ingest::routes())
        .merge(sync::routes())
        .merge(stats::routes())
}

pub(crate) type ApiError = (StatusCode, Json<serde_json::Value>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

/// Map a core error to its HTTP status.
pub(crate) fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::ChatResolution(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
        Error::Browser(_) | Error::BridgeUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}
