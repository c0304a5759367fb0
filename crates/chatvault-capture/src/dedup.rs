//! Per-session dedup keys.

use std::collections::HashSet;

use chatvault_core::CapturedMessage;
use sha2::{Digest, Sha256};

/// Composite key of a captured tuple.
///
/// The external id when the client assigned one; otherwise a SHA-256 of
/// chat, sender, the first `key_chars` characters of content (or `media`
/// when there is none) and timestamp.
pub fn dedup_key(chat_name: &str, msg: &CapturedMessage, key_chars: usize) -> String {
    if let Some(id) = msg.external_id() {
        return format!("id:{}", id);
    }
    let content: String = if msg.content.is_empty() {
        "media".to_string()
    } else {
        msg.content.chars().take(key_chars).collect()
    };
    let mut hasher = Sha256::new();
    for part in [chat_name, msg.sender.as_str(), content.as_str(), msg.timestamp.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    format!("h:{}", hex::encode(hasher.finalize()))
}

/// Keys of tuples already delivered during this capture session.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Commit keys of an acknowledged batch.
    pub fn commit(&mut self, keys: impl IntoIterator<Item = String>) {
        self.keys.extend(keys);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> CapturedMessage {
        CapturedMessage {
            sender: "Bob".into(),
            content: content.into(),
            timestamp: "2025-01-01T10:00:00".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_external_id_wins() {
        let m = CapturedMessage {
            id: Some("ABC".into()),
            ..msg("hi")
        };
        assert_eq!(dedup_key("Chat", &m, 50), "id:ABC");
    }

    #[test]
    fn test_fallback_key_uses_content_prefix() {
        let long_a = format!("{}{}", "x".repeat(50), "tail one");
        let long_b = format!("{}{}", "x".repeat(50), "tail two");
        assert_eq!(
            dedup_key("Chat", &msg(&long_a), 50),
            dedup_key("Chat", &msg(&long_b), 50)
        );
        assert_ne!(
            dedup_key("Chat", &msg("hi"), 50),
            dedup_key("Other", &msg("hi"), 50)
        );
        assert_ne!(dedup_key("Chat", &msg(""), 50), dedup_key("Chat", &msg("hi"), 50));
        assert_eq!(dedup_key("Chat", &msg(""), 50), dedup_key("Chat", &msg("media"), 50));
    }

    #[test]
    fn test_seen_set() {
        let mut seen = SeenSet::new();
        seen.commit(vec!["a".to_string(), "b".to_string()]);
        assert!(seen.contains("a"));
        assert_eq!(seen.len(), 2);
        seen.clear();
        assert!(seen.is_empty());
    }
}
