//! Remote ingest endpoint: the credentialed twin of the local ingest path.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chatvault_core::CapturedMessage;
use chatvault_ingest::persist_local;
use chatvault_store::InsertResult;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::{api_error, error_response, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ingest", post(ingest))
}

/// Body shared by `/api/messages` and `/api/ingest`.
#[derive(Debug, Deserialize)]
pub(crate) struct IngestBody {
    #[serde(rename = "chatName")]
    pub chat_name: String,
    pub messages: Vec<CapturedMessage>,
}

/// Materialize attachments and insert, off the async runtime.
pub(crate) async fn persist_batch(state: &AppState, body: IngestBody) -> Result<InsertResult, ApiError> {
    if body.chat_name.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Invalid payload"));
    }
    let media = state.media.clone();
    let IngestBody { chat_name, messages } = body;
    state
        .with_store(move |store| persist_local(store, &media, &chat_name, messages))
        .await
        .map_err(api_error)
}

/// Check `Authorization: Bearer <key>` against the configured ingest key.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.ingest_api_key.as_deref() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Ingest endpoint not configured",
        ));
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    match provided {
        Some(provided) if keys_match(provided, expected) => Ok(()),
        _ => Err(error_response(StatusCode::UNAUTHORIZED, "Unauthorized")),
    }
}

/// Compare fixed-length digests so the timing does not leak a key prefix.
fn keys_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// POST /api/ingest: batches forwarded by a remote capture host.
async fn ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<IngestBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &headers)?;
    let Json(body) = payload.map_err(|e| {
        warn!("Rejected /api/ingest payload: {}", e.body_text());
        error_response(StatusCode::BAD_REQUEST, "Invalid payload")
    })?;

    let chat_name = body.chat_name.clone();
    let result = persist_batch(&state, body).await?;
    if result.inserted > 0 {
        info!(
            "Ingested {}/{} messages for '{}' (chat {})",
            result.inserted, result.total, chat_name, result.chat_id
        );
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "inserted": result.inserted,
        "count": result.inserted,
        "total": result.total,
        "chatId": result.chat_id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secre", "secret"));
        assert!(!keys_match("secret2", "secret"));
        assert!(!keys_match("", "secret"));
    }

    #[test]
    fn test_authorize_bearer() {
        let dir = tempfile::TempDir::new().unwrap();
        let data_paths = chatvault_core::DataPaths::new(dir.path()).unwrap();
        let store = std::sync::Arc::new(chatvault_store::SqliteStore::open(&data_paths.db).unwrap());
        let config = chatvault_core::ChatVaultConfig {
            port: 0,
            data_paths,
            remote: None,
            ingest_api_key: Some("secret".into()),
            date_order: Default::default(),
            headless: None,
        };
        let state = AppState::new(config, store).unwrap();

        assert!(authorize(&state, &headers("Bearer secret")).is_ok());
        assert!(authorize(&state, &headers("Bearer  secret ")).is_ok());
        let (status, _) = authorize(&state, &headers("Bearer secre")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = authorize(&state, &headers("secret")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = authorize(&state, &HeaderMap::new()).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
