//! Shared application state.

use std::sync::Arc;

use chatvault_browser::HostController;
use chatvault_core::{ChatVaultConfig, Error, Result};
use chatvault_ingest::{IngestRouter, MediaStore};
use chatvault_store::SqliteStore;
use parking_lot::RwLock;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ChatVaultConfig,
    pub store: Arc<SqliteStore>,
    /// Materializes payloads arriving on the ingest surfaces.
    pub media: MediaStore,
    /// Where captured batches go (local store or remote aggregator).
    pub router: IngestRouter,
    host: RwLock<Option<Arc<HostController>>>,
    pub started_at: String,
}

impl AppState {
    pub fn new(config: ChatVaultConfig, store: Arc<SqliteStore>) -> Result<Self> {
        let media = MediaStore::new(&config.data_paths.media);
        let router = IngestRouter::from_config(&config, Some(store.clone()))?;
        Ok(Self {
            config,
            store,
            media,
            router,
            host: RwLock::new(None),
            started_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// The running browser session, if any.
    pub fn host(&self) -> Option<Arc<HostController>> {
        self.host.read().clone()
    }

    pub fn set_host(&self, host: Option<Arc<HostController>>) {
        *self.host.write() = host;
    }

    /// Run a store operation on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStore) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| Error::Internal(format!("store task failed: {}", e)))?
    }
}
