//! ChatVault Core: shared error taxonomy, configuration, wire message schema.

pub mod config;
pub mod error;
pub mod message;
pub mod timestamp;

pub use config::{ChatVaultConfig, DataPaths, DateOrder, RemoteConfig};
pub use error::{Error, Result};
pub use message::{CapturedMessage, Direction, MessageKind};
