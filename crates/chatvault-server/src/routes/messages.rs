//! Local persistence surface and message queries.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatvault_store::SearchHit;
use serde::Deserialize;
use tracing::warn;

use super::{api_error, error_response, ApiError};
use crate::routes::ingest::{persist_batch, IngestBody};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages", post(post_messages))
        .route("/messages/{chat_id}", get(get_messages))
        .route("/chats", get(list_chats))
        .route("/search", get(search))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    limit: Option<usize>,
}

/// POST /api/messages: persist a batch locally.
async fn post_messages(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload.map_err(|e| {
        warn!("Rejected /api/messages payload: {}", e.body_text());
        error_response(StatusCode::BAD_REQUEST, "Invalid payload")
    })?;
    let result = persist_batch(&state, body).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "inserted": result.inserted,
        "total": result.total,
        "chatId": result.chat_id,
    })))
}

/// GET /api/chats: chats with message counts, most recent activity first.
async fn list_chats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let chats = state
        .with_store(|store| store.list_chats())
        .await
        .map_err(api_error)?;
    Ok(Json(chats))
}

/// GET /api/messages/{chat_id}?limit=500&offset=0: chronological page.
async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    Query(q): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = q.limit.filter(|l| *l > 0).unwrap_or(500);
    let offset = q.offset.unwrap_or(0);
    let messages = state
        .with_store(move |store| store.get_messages(chat_id, limit, offset))
        .await
        .map_err(api_error)?;
    Ok(Json(messages))
}

/// GET /api/search?q=&limit=100: prefix-matched full-text search.
async fn search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = q.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Ok(Json(Vec::<SearchHit>::new()));
    }
    let limit = q.limit.filter(|l| *l > 0).unwrap_or(100);
    let hits = state
        .with_store(move |store| Ok(store.search(&query, limit)))
        .await
        .map_err(api_error)?;
    Ok(Json(hits))
}
