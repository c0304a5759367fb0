//! The page ⇄ host bridge.
//!
//! A single call, `deliver(chatName, messagesJSON) → resultJSON`, carried as
//! message passing between the page actor and the host actor. The page side
//! never sees an error from the host: failures come back as
//! `{inserted: 0, error}` or, when no handler is registered, as
//! [`Error::BridgeUnavailable`] so the engine can defer the batch.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use chatvault_core::{CapturedMessage, Error, Result};

/// Outcome of a handled batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub inserted: usize,
    pub total: usize,
    /// Batch indices of messages the host could not deliver.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<usize>,
}

/// Wire reply of a bridge call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeReply {
    pub inserted: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Batch indices left undelivered by an otherwise acknowledged call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<usize>,
}

impl BridgeReply {
    pub fn is_ack(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the message at `index` was delivered. Always false for a
    /// rejected batch.
    pub fn delivered(&self, index: usize) -> bool {
        self.is_ack() && !self.failed.contains(&index)
    }
}

/// Host-side executor of bridge calls.
#[async_trait]
pub trait BridgeHandler: Send + Sync {
    async fn handle(&self, chat_name: &str, messages: Vec<CapturedMessage>) -> Result<DeliveryReport>;
}

/// One in-flight `deliver` call.
#[derive(Debug)]
pub struct DeliverCall {
    pub chat_name: String,
    pub messages_json: String,
    reply: oneshot::Sender<String>,
}

/// Page-side end of the bridge.
#[derive(Debug, Clone)]
pub struct BridgePort {
    tx: mpsc::Sender<DeliverCall>,
    registered: watch::Receiver<bool>,
}

/// Host-side end of the bridge. Consumed by [`Bridge::serve`].
#[derive(Debug)]
pub struct Bridge {
    rx: mpsc::Receiver<DeliverCall>,
    registered: watch::Sender<bool>,
}

/// Create a connected bridge pair. No handler is registered until the host
/// calls [`Bridge::serve`].
pub fn channel(capacity: usize) -> (BridgePort, Bridge) {
    let (tx, rx) = mpsc::channel(capacity);
    let (registered_tx, registered_rx) = watch::channel(false);
    (
        BridgePort {
            tx,
            registered: registered_rx,
        },
        Bridge {
            rx,
            registered: registered_tx,
        },
    )
}

impl BridgePort {
    /// Whether a host handler is currently serving calls.
    pub fn is_registered(&self) -> bool {
        *self.registered.borrow() && !self.tx.is_closed()
    }

    /// Hand a batch to the host and wait for its reply.
    pub async fn deliver(&self, chat_name: &str, messages: &[CapturedMessage]) -> Result<BridgeReply> {
        if !self.is_registered() {
            return Err(Error::BridgeUnavailable("no host handler registered".into()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let call = DeliverCall {
            chat_name: chat_name.to_string(),
            messages_json: serde_json::to_string(messages)?,
            reply: reply_tx,
        };
        self.tx
            .send(call)
            .await
            .map_err(|_| Error::BridgeUnavailable("host side closed".into()))?;

        let raw = reply_rx
            .await
            .map_err(|_| Error::BridgeUnavailable("host dropped the call".into()))?;
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| BridgeReply {
            error: Some(format!("malformed reply: {}", e)),
            ..Default::default()
        }))
    }
}

impl Bridge {
    /// Register `handler` and execute calls until every port is dropped.
    pub async fn serve(mut self, handler: Arc<dyn BridgeHandler>) {
        let _ = self.registered.send(true);
        debug!("Bridge handler registered");

        while let Some(call) = self.rx.recv().await {
            let reply = Self::execute(handler.as_ref(), &call.chat_name, &call.messages_json).await;
            let json = serde_json::to_string(&reply).unwrap_or_else(|_| r#"{"inserted":0}"#.into());
            // The caller may have been cancelled mid-call.
            let _ = call.reply.send(json);
        }

        let _ = self.registered.send(false);
        debug!("Bridge handler unregistered");
    }

    async fn execute(handler: &dyn BridgeHandler, chat_name: &str, messages_json: &str) -> BridgeReply {
        let messages: Vec<CapturedMessage> = match serde_json::from_str(messages_json) {
            Ok(m) => m,
            Err(e) => {
                warn!("Malformed batch for '{}': {}", chat_name, e);
                return BridgeReply {
                    error: Some(format!("malformed batch: {}", e)),
                    ..Default::default()
                };
            }
        };
        let total = messages.len();
        match handler.handle(chat_name, messages).await {
            Ok(report) => BridgeReply {
                inserted: report.inserted,
                total: report.total,
                error: None,
                failed: report.failed,
            },
            Err(e) => {
                warn!("Bridge handler failed for '{}': {}", chat_name, e);
                BridgeReply {
                    inserted: 0,
                    total,
                    error: Some(e.to_string()),
                    failed: Vec::new(),
                }
            }
        }
    }
}
