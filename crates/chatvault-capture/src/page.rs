//! The engine's view of the live page.

use async_trait::async_trait;
use chatvault_core::Result;
use serde::{Deserialize, Serialize};

use crate::dom::MessageElement;

/// A change notification raised by the observer script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageEvent {
    /// The message list's subtree changed.
    Mutation,
    /// The message list scrolled (older history loaded).
    Scroll,
    /// The surrounding app shell changed (possible chat switch).
    Shell,
}

impl PageEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mutation" => Some(Self::Mutation),
            "scroll" => Some(Self::Scroll),
            "shell" => Some(Self::Shell),
            _ => None,
        }
    }
}

/// Read access to the rendered conversation.
#[async_trait]
pub trait PageView: Send + Sync {
    /// Display name of the open chat, if one is open.
    async fn chat_name(&self) -> Result<Option<String>>;

    /// Snapshots of every rendered message row, in document order.
    async fn message_elements(&self) -> Result<Vec<MessageElement>>;

    /// Read an ephemeral `blob:` reference into a `data:` URL.
    /// `Ok(None)` when the blob is gone.
    async fn resolve_blob(&self, url: &str) -> Result<Option<String>>;
}
