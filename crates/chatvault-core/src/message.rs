//! Wire schema of a captured message: the tuple carried over the bridge
//! and accepted by the ingest surfaces.

use serde::{Deserialize, Serialize};

/// Kind of a message, decided by attachment presence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    Document,
    Sticker,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
            Self::Sticker => "sticker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "document" => Some(Self::Document),
            "sticker" => Some(Self::Sticker),
            _ => None,
        }
    }

    /// Content used when an attachment arrives without any text.
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Image => Some("[Image]"),
            Self::Audio => Some("[Audio]"),
            Self::Video => Some("[Video]"),
            Self::Document => Some("[Document]"),
            Self::Sticker => Some("[Sticker]"),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "incoming" => Some(Self::Incoming),
            "outgoing" => Some(Self::Outgoing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observed message, as extracted from the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapturedMessage {
    /// External id assigned by the messaging client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, alias = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub direction: Direction,
    #[serde(
        default,
        rename = "mediaRef",
        alias = "mediaUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub media_ref: Option<String>,
    /// Inlined `data:` URL of an ephemeral attachment. Dropped before insert.
    #[serde(default, rename = "mediaData", skip_serializing_if = "Option::is_none")]
    pub media_data: Option<String>,
}

impl CapturedMessage {
    /// External id, treating an empty string as absent.
    pub fn external_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Media reference, treating an empty string as absent.
    pub fn media(&self) -> Option<&str> {
        self.media_ref.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// A message is worth persisting only with content or a media reference.
    pub fn has_payload(&self) -> bool {
        !self.content.trim().is_empty() || self.media().is_some()
    }

    /// Whether the message carries an inlined attachment payload.
    pub fn has_inline_media(&self) -> bool {
        self.media_data
            .as_deref()
            .map_or(false, |d| !d.is_empty())
    }

    /// JSON snapshot stored alongside the row, without the inline payload.
    pub fn raw_snapshot(&self) -> String {
        let mut snapshot = self.clone();
        snapshot.media_data = None;
        serde_json::to_string(&snapshot).unwrap_or_default()
    }
}
