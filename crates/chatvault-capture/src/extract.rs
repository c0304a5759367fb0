//! Heuristic extraction of message tuples from row snapshots.
//!
//! The client's markup has no contract, so every field is resolved by an
//! ordered list of named strategies; the first strategy yielding a value
//! wins. Reordering or adding a strategy is a data change.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use chatvault_core::{CapturedMessage, DateOrder, Direction, Error, MessageKind, Result};

use crate::dom::{MessageElement, INCOMING_CLASS, OUTGOING_CLASS};
use crate::timestamp::{
    approximate_from_bare_time, bracket_text, canonical_from_structured, is_bare_time,
};

static PRE_SENDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\s*(.+?):\s*$").unwrap());

/// Attachment kinds in presence priority.
const ATTACHMENT_PRIORITY: [MessageKind; 5] = [
    MessageKind::Image,
    MessageKind::Audio,
    MessageKind::Video,
    MessageKind::Document,
    MessageKind::Sticker,
];

/// Per-scan context shared by all strategies.
#[derive(Debug, Clone)]
pub struct ExtractContext<'a> {
    pub chat_name: &'a str,
    pub self_label: &'a str,
    pub date_order: DateOrder,
    /// Date used to complete bare times.
    pub today: NaiveDate,
}

/// A named field strategy.
pub struct Strategy<T> {
    pub name: &'static str,
    pub run: fn(&MessageElement, &ExtractContext<'_>) -> Option<T>,
}

impl<T> Strategy<T> {
    fn new(name: &'static str, run: fn(&MessageElement, &ExtractContext<'_>) -> Option<T>) -> Self {
        Self { name, run }
    }
}

fn first_match<T>(
    strategies: &[Strategy<T>],
    el: &MessageElement,
    ctx: &ExtractContext<'_>,
) -> Option<(&'static str, T)> {
    strategies
        .iter()
        .find_map(|s| (s.run)(el, ctx).map(|v| (s.name, v)))
}

/// Ordered strategy lists for every extracted field.
pub struct Extractor {
    pub direction: Vec<Strategy<Direction>>,
    pub sender: Vec<Strategy<String>>,
    pub content: Vec<Strategy<String>>,
    pub timestamp: Vec<Strategy<String>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            direction: vec![Strategy::new("style_marker", direction_from_style)],
            sender: vec![
                Strategy::new("self_marker", sender_self),
                Strategy::new("sender_label", sender_from_label),
                Strategy::new("metadata_attribute", sender_from_metadata),
                Strategy::new("chat_name", sender_from_chat),
            ],
            content: vec![
                Strategy::new("selectable_text", content_from_selectable),
                Strategy::new("metadata_block", content_from_metadata_block),
            ],
            timestamp: vec![
                Strategy::new("structured_prefix", timestamp_structured),
                Strategy::new("bare_time", timestamp_bare),
                Strategy::new("raw_prefix", timestamp_raw),
            ],
        }
    }
}

impl Extractor {
    /// Extract one tuple. Fails only when the row has no direction marker.
    pub fn extract(&self, el: &MessageElement, ctx: &ExtractContext<'_>) -> Result<CapturedMessage> {
        let (_, direction) = first_match(&self.direction, el, ctx)
            .ok_or_else(|| Error::Extraction("no direction marker".into()))?;

        let sender = first_match(&self.sender, el, ctx)
            .map(|(_, s)| s)
            .unwrap_or_default();
        let mut content = first_match(&self.content, el, ctx)
            .map(|(_, c)| c)
            .unwrap_or_default();
        let timestamp = first_match(&self.timestamp, el, ctx)
            .map(|(_, t)| t)
            .unwrap_or_default();

        let (kind, media_ref) = detect_attachment(el);
        if content.is_empty() {
            if let Some(placeholder) = kind.placeholder() {
                content = placeholder.to_string();
            }
        }

        Ok(CapturedMessage {
            id: el
                .data_id
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            sender,
            content,
            timestamp,
            kind,
            direction,
            media_ref,
            media_data: None,
        })
    }
}

/// Highest-priority attachment kind and its media reference.
/// Only image and sticker previews carry a usable reference.
fn detect_attachment(el: &MessageElement) -> (MessageKind, Option<String>) {
    for kind in ATTACHMENT_PRIORITY {
        if let Some(att) = el.attachment(kind) {
            let media_ref = match kind {
                MessageKind::Image | MessageKind::Sticker => att
                    .src
                    .as_ref()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                _ => None,
            };
            return (kind, media_ref);
        }
    }
    (MessageKind::Text, None)
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ---------------------------------------------------------------
// Direction
// ---------------------------------------------------------------

fn direction_from_style(el: &MessageElement, _: &ExtractContext<'_>) -> Option<Direction> {
    if el.has_class(OUTGOING_CLASS) {
        Some(Direction::Outgoing)
    } else if el.has_class(INCOMING_CLASS) {
        Some(Direction::Incoming)
    } else {
        None
    }
}

// ---------------------------------------------------------------
// Sender
// ---------------------------------------------------------------

fn sender_self(el: &MessageElement, ctx: &ExtractContext<'_>) -> Option<String> {
    el.has_class(OUTGOING_CLASS)
        .then(|| ctx.self_label.to_string())
}

fn sender_from_label(el: &MessageElement, _: &ExtractContext<'_>) -> Option<String> {
    el.sender_label.as_deref().and_then(non_empty)
}

fn sender_from_metadata(el: &MessageElement, _: &ExtractContext<'_>) -> Option<String> {
    let pre = el.pre_plain_text.as_deref()?;
    PRE_SENDER_RE
        .captures(pre)
        .and_then(|c| c.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

fn sender_from_chat(_: &MessageElement, ctx: &ExtractContext<'_>) -> Option<String> {
    non_empty(ctx.chat_name)
}

// ---------------------------------------------------------------
// Content
// ---------------------------------------------------------------

fn content_from_selectable(el: &MessageElement, _: &ExtractContext<'_>) -> Option<String> {
    el.selectable_texts
        .iter()
        .filter(|f| !f.quoted)
        .filter_map(|f| non_empty(&f.text))
        .last()
}

fn content_from_metadata_block(el: &MessageElement, _: &ExtractContext<'_>) -> Option<String> {
    el.pre_plain_text.as_ref()?;
    el.metadata_lines.iter().find_map(|l| non_empty(l))
}

// ---------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------

fn timestamp_structured(el: &MessageElement, ctx: &ExtractContext<'_>) -> Option<String> {
    let text = bracket_text(el.pre_plain_text.as_deref()?)?;
    canonical_from_structured(text, ctx.date_order)
}

fn timestamp_bare(el: &MessageElement, ctx: &ExtractContext<'_>) -> Option<String> {
    el.span_texts
        .iter()
        .rev()
        .find(|t| is_bare_time(t))
        .and_then(|t| approximate_from_bare_time(t, ctx.today))
}

fn timestamp_raw(el: &MessageElement, _: &ExtractContext<'_>) -> Option<String> {
    bracket_text(el.pre_plain_text.as_deref()?).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Attachment, TextFragment};

    fn ctx() -> ExtractContext<'static> {
        ExtractContext {
            chat_name: "Alice",
            self_label: "You",
            date_order: DateOrder::Mdy,
            today: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        }
    }

    fn fragment(text: &str, quoted: bool) -> TextFragment {
        TextFragment {
            text: text.into(),
            quoted,
        }
    }

    fn incoming() -> MessageElement {
        MessageElement {
            classes: vec![INCOMING_CLASS.into()],
            data_id: Some("false_1@c.us_A1".into()),
            pre_plain_text: Some("[10:05 AM, 1/15/2025] Bob: ".into()),
            selectable_texts: vec![fragment("hello there", false)],
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_direction_is_extraction_failure() {
        let el = MessageElement {
            classes: vec!["focusable".into()],
            ..incoming()
        };
        let err = Extractor::default().extract(&el, &ctx()).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_incoming_text() {
        let msg = Extractor::default().extract(&incoming(), &ctx()).unwrap();
        assert_eq!(msg.id.as_deref(), Some("false_1@c.us_A1"));
        assert_eq!(msg.direction, Direction::Incoming);
        assert_eq!(msg.sender, "Bob");
        assert_eq!(msg.content, "hello there");
        assert_eq!(msg.timestamp, "2025-01-15T10:05:00");
        assert_eq!(msg.kind, MessageKind::Text);
        assert!(msg.media_ref.is_none());
    }

    #[test]
    fn test_sender_precedence() {
        let ex = Extractor::default();

        let outgoing = MessageElement {
            classes: vec![OUTGOING_CLASS.into()],
            sender_label: Some("Ignored".into()),
            ..incoming()
        };
        assert_eq!(ex.extract(&outgoing, &ctx()).unwrap().sender, "You");

        let labelled = MessageElement {
            sender_label: Some(" Carol ".into()),
            ..incoming()
        };
        assert_eq!(ex.extract(&labelled, &ctx()).unwrap().sender, "Carol");

        let bare = MessageElement {
            pre_plain_text: None,
            ..incoming()
        };
        assert_eq!(ex.extract(&bare, &ctx()).unwrap().sender, "Alice");
    }

    #[test]
    fn test_content_skips_quoted_fragments() {
        let el = MessageElement {
            selectable_texts: vec![
                fragment("the reply", false),
                fragment("@quoted", true),
                fragment("   ", false),
            ],
            ..incoming()
        };
        let msg = Extractor::default().extract(&el, &ctx()).unwrap();
        assert_eq!(msg.content, "the reply");

        let fallback = MessageElement {
            selectable_texts: vec![],
            metadata_lines: vec!["".into(), "from the block".into()],
            ..incoming()
        };
        let msg = Extractor::default().extract(&fallback, &ctx()).unwrap();
        assert_eq!(msg.content, "from the block");
    }

    #[test]
    fn test_attachment_priority_and_placeholder() {
        let el = MessageElement {
            selectable_texts: vec![],
            attachments: vec![
                Attachment {
                    kind: MessageKind::Sticker,
                    src: Some("blob:https://web/2".into()),
                },
                Attachment {
                    kind: MessageKind::Image,
                    src: Some("blob:https://web/1".into()),
                },
            ],
            ..incoming()
        };
        let msg = Extractor::default().extract(&el, &ctx()).unwrap();
        assert_eq!(msg.kind, MessageKind::Image);
        assert_eq!(msg.content, "[Image]");
        assert_eq!(msg.media_ref.as_deref(), Some("blob:https://web/1"));

        let audio = MessageElement {
            selectable_texts: vec![],
            attachments: vec![Attachment {
                kind: MessageKind::Audio,
                src: Some("blob:https://web/3".into()),
            }],
            ..incoming()
        };
        let msg = Extractor::default().extract(&audio, &ctx()).unwrap();
        assert_eq!(msg.kind, MessageKind::Audio);
        assert_eq!(msg.content, "[Audio]");
        assert!(msg.media_ref.is_none());

        let captioned = MessageElement {
            attachments: vec![Attachment {
                kind: MessageKind::Image,
                src: None,
            }],
            ..incoming()
        };
        let msg = Extractor::default().extract(&captioned, &ctx()).unwrap();
        assert_eq!(msg.content, "hello there");
    }

    #[test]
    fn test_timestamp_fallbacks() {
        let ex = Extractor::default();

        let bare = MessageElement {
            pre_plain_text: None,
            span_texts: vec!["hello there".into(), "3:07 PM".into(), "✓✓".into()],
            ..incoming()
        };
        assert_eq!(ex.extract(&bare, &ctx()).unwrap().timestamp, "2025-06-01 15:07");

        let raw = MessageElement {
            pre_plain_text: Some("[gestern, 10 Uhr] Bob: ".into()),
            ..incoming()
        };
        assert_eq!(ex.extract(&raw, &ctx()).unwrap().timestamp, "gestern, 10 Uhr");

        let none = MessageElement {
            pre_plain_text: None,
            ..incoming()
        };
        assert_eq!(ex.extract(&none, &ctx()).unwrap().timestamp, "");
    }
}
