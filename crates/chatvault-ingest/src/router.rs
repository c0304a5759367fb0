//! Ingest routing: one batch in, either persisted locally or forwarded.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use chatvault_core::{CapturedMessage, ChatVaultConfig, Error, Result};
use chatvault_store::{InsertResult, SqliteStore};

use crate::media::MediaStore;
use crate::remote::RemoteForwarder;

/// Result of routing one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub inserted: usize,
    pub total: usize,
    /// Local chat id; absent when the batch was forwarded.
    #[serde(rename = "chatId", skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    /// Batch indices a remote aggregator did not accept.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<usize>,
}

#[derive(Debug, Clone)]
enum IngestTarget {
    Local { store: Arc<SqliteStore>, media: MediaStore },
    Remote(RemoteForwarder),
}

#[derive(Debug, Clone)]
pub struct IngestRouter {
    target: IngestTarget,
}

impl IngestRouter {
    pub fn local(store: Arc<SqliteStore>, media: MediaStore) -> Self {
        Self {
            target: IngestTarget::Local { store, media },
        }
    }

    pub fn remote(forwarder: RemoteForwarder) -> Self {
        Self {
            target: IngestTarget::Remote(forwarder),
        }
    }

    /// Remote mode when a remote aggregator is configured, local otherwise.
    pub fn from_config(config: &ChatVaultConfig, store: Option<Arc<SqliteStore>>) -> Result<Self> {
        if let Some(remote) = &config.remote {
            info!("Ingest mode: remote ({})", remote.url);
            return Ok(Self::remote(RemoteForwarder::new(remote)));
        }
        let store = store.ok_or_else(|| Error::Config("local ingest needs a store".into()))?;
        info!("Ingest mode: local ({})", store.db_path().display());
        Ok(Self::local(store, MediaStore::new(&config.data_paths.media)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.target, IngestTarget::Remote(_))
    }

    pub async fn ingest(&self, chat_name: &str, messages: Vec<CapturedMessage>) -> Result<IngestOutcome> {
        match &self.target {
            IngestTarget::Remote(forwarder) => {
                let report = forwarder.forward(chat_name, messages).await?;
                Ok(IngestOutcome {
                    inserted: report.inserted,
                    total: report.total,
                    chat_id: None,
                    failed: report.failed,
                })
            }
            IngestTarget::Local { store, media } => {
                let store = store.clone();
                let media = media.clone();
                let chat_name = chat_name.to_string();
                let result = tokio::task::spawn_blocking(move || {
                    persist_local(&store, &media, &chat_name, messages)
                })
                .await
                .map_err(|e| Error::Internal(format!("ingest task failed: {}", e)))??;
                Ok(IngestOutcome {
                    inserted: result.inserted,
                    total: result.total,
                    chat_id: Some(result.chat_id),
                    failed: Vec::new(),
                })
            }
        }
    }
}

/// Materialize attachments, then insert the batch. Blocking.
pub fn persist_local(
    store: &SqliteStore,
    media: &MediaStore,
    chat_name: &str,
    mut messages: Vec<CapturedMessage>,
) -> Result<InsertResult> {
    media.materialize_all(&mut messages);
    store.insert_messages(chat_name, &messages)
}
