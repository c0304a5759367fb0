//! Host-side bridge handler: hands captured batches to the ingest router.

use async_trait::async_trait;
use tracing::info;

use chatvault_capture::{BridgeHandler, DeliveryReport};
use chatvault_core::{CapturedMessage, Result};
use chatvault_ingest::IngestRouter;

pub struct RouterHandler {
    router: IngestRouter,
}

impl RouterHandler {
    pub fn new(router: IngestRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl BridgeHandler for RouterHandler {
    async fn handle(&self, chat_name: &str, messages: Vec<CapturedMessage>) -> Result<DeliveryReport> {
        let outcome = self.router.ingest(chat_name, messages).await?;
        if outcome.inserted > 0 {
            match outcome.chat_id {
                Some(chat_id) => info!(
                    "Saved {}/{} messages from '{}' (chat {})",
                    outcome.inserted, outcome.total, chat_name, chat_id
                ),
                None => info!(
                    "Forwarded {}/{} messages from '{}'",
                    outcome.inserted, outcome.total, chat_name
                ),
            }
        }
        Ok(DeliveryReport {
            inserted: outcome.inserted,
            total: outcome.total,
            failed: outcome.failed,
        })
    }
}
