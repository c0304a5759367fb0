//! Data types for chats, messages, and search results.

use serde::{Deserialize, Serialize};

/// Chat category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Personal,
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Group => "group",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "group" => Self::Group,
            _ => Self::Personal,
        }
    }
}

/// A chat row, with its message count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
    pub created_at: String,
    pub message_count: i64,
}

/// A message row from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub kind: String,
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<String>,
    pub created_at: String,
}

/// A search result: the message plus the name of its chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub message: StoredMessage,
    pub chat_name: String,
}

/// Outcome of `insert_messages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResult {
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    /// New rows only; merges into existing rows are not counted.
    pub inserted: usize,
    pub total: usize,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    #[serde(rename = "chatCount")]
    pub chat_count: i64,
    #[serde(rename = "messageCount")]
    pub message_count: i64,
    #[serde(rename = "latestMessage")]
    pub latest_message: Option<String>,
    #[serde(rename = "indexedCount")]
    pub indexed_count: i64,
    #[serde(rename = "dbPath")]
    pub db_path: String,
    #[serde(rename = "dbSizeMb")]
    pub db_size_mb: f64,
}

/// Result of comparing the FTS index to the messages table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FtsReconciliation {
    pub backfilled: usize,
    pub pruned: usize,
}
