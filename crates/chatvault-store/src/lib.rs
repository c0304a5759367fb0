//! ChatVault Store: SQLite chats/messages with an FTS5 shadow index.

pub mod merge;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
