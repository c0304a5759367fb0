//! Serializable snapshots of rendered message rows.
//!
//! The observer script walks each row once and reports only the raw
//! signals; all interpretation happens in [`crate::extract`].

use chatvault_core::MessageKind;
use serde::{Deserialize, Serialize};

/// Style marker of an incoming message row.
pub const INCOMING_CLASS: &str = "message-in";
/// Style marker of an outgoing message row.
pub const OUTGOING_CLASS: &str = "message-out";

/// One selectable text span inside a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Part of a quoted reply or a mention, not the message body.
    #[serde(default)]
    pub quoted: bool,
}

/// An attachment marker found in a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: MessageKind,
    /// Source of the rendered preview (`blob:` or `https:`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// Snapshot of one rendered message row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageElement {
    /// CSS classes of the row.
    #[serde(default)]
    pub classes: Vec<String>,
    /// `data-id` of the row or its closest ancestor.
    #[serde(default)]
    pub data_id: Option<String>,
    /// Dedicated sender label (group chats).
    #[serde(default)]
    pub sender_label: Option<String>,
    /// Structured metadata attribute, e.g. `[10:05 AM, 1/15/2025] Alice: `.
    #[serde(default)]
    pub pre_plain_text: Option<String>,
    #[serde(default)]
    pub selectable_texts: Vec<TextFragment>,
    /// Direct child spans of the structured metadata block.
    #[serde(default)]
    pub metadata_lines: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Text of every span in the row, in document order.
    #[serde(default)]
    pub span_texts: Vec<String>,
}

impl MessageElement {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// First attachment of the given kind.
    pub fn attachment(&self, kind: MessageKind) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_probe_json() {
        let el: MessageElement = serde_json::from_str(
            r#"{
                "classes": ["focusable", "message-out"],
                "dataId": "true_123@c.us_ABC",
                "prePlainText": "[10:05 AM, 1/15/2025] Me: ",
                "selectableTexts": [{"text": "hi", "quoted": false}],
                "attachments": [{"kind": "image", "src": "blob:https://x/1"}]
            }"#,
        )
        .unwrap();
        assert!(el.has_class(OUTGOING_CLASS));
        assert!(!el.has_class(INCOMING_CLASS));
        assert_eq!(el.data_id.as_deref(), Some("true_123@c.us_ABC"));
        assert!(el.attachment(MessageKind::Image).is_some());
        assert!(el.metadata_lines.is_empty());
    }
}
