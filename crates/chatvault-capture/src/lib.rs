//! ChatVault Capture: the page-side actor.
//!
//! Observes change notifications from the messaging client's view, extracts
//! message tuples from element snapshots, deduplicates them within a capture
//! session and hands new batches to the host over the bridge.

pub mod bridge;
pub mod config;
pub mod dedup;
pub mod dom;
pub mod engine;
pub mod extract;
pub mod page;
pub mod scheduler;
pub mod timestamp;

pub use bridge::{Bridge, BridgeHandler, BridgePort, BridgeReply, DeliveryReport};
pub use config::{CaptureConfig, CaptureTimings};
pub use dom::{Attachment, MessageElement, TextFragment};
pub use engine::{CaptureEngine, CaptureHandle, CaptureState, CaptureStatus, SyncReport};
pub use extract::{ExtractContext, Extractor};
pub use page::{PageEvent, PageView};
