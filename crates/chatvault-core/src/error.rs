//! Error types for ChatVault.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A single message element could not be turned into a tuple.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The host side of the bridge is not registered (yet).
    #[error("Bridge unavailable: {0}")]
    BridgeUnavailable(String),

    /// One message of a batch could not be written.
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    /// The chat row for a batch could not be created or resolved.
    #[error("Chat resolution failed: {0}")]
    ChatResolution(String),

    /// A forwarded sub-request failed or timed out.
    #[error("Remote transport error: {0}")]
    RemoteTransport(String),

    #[error("Search syntax error: {0}")]
    SearchSyntax(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
