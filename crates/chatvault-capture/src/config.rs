//! Capture engine settings.

use std::time::Duration;

use chatvault_core::DateOrder;
use serde::{Deserialize, Serialize};

/// Debounce windows and intervals driving the rescan scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTimings {
    /// Quiet period after a message-list mutation.
    pub mutation_debounce: Duration,
    /// Quiet period after the message list scrolled.
    pub scroll_debounce: Duration,
    /// Quiet period after an app-shell mutation before re-checking the chat.
    pub shell_debounce: Duration,
    /// Safety-net tick; re-checks the chat and scans.
    pub tick_interval: Duration,
    /// Minimum time between two scans.
    pub min_scan_interval: Duration,
    /// Delay before the first scan of a newly opened chat.
    pub switch_settle: Duration,
    /// Delay before the first scan after the engine starts.
    pub initial_scan: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            mutation_debounce: Duration::from_millis(800),
            scroll_debounce: Duration::from_millis(500),
            shell_debounce: Duration::from_millis(300),
            tick_interval: Duration::from_secs(10),
            min_scan_interval: Duration::from_millis(300),
            switch_settle: Duration::from_secs(1),
            initial_scan: Duration::from_millis(500),
        }
    }
}

/// Capture engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub timings: CaptureTimings,
    /// Day/month order of rendered dates when both values are <= 12.
    pub date_order: DateOrder,
    /// Sender recorded for outgoing messages.
    pub self_label: String,
    /// Content prefix length used by the fallback dedup key.
    pub key_chars: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timings: CaptureTimings::default(),
            date_order: DateOrder::default(),
            self_label: "You".into(),
            key_chars: 50,
        }
    }
}

impl CaptureConfig {
    pub fn with_date_order(date_order: DateOrder) -> Self {
        Self {
            date_order,
            ..Default::default()
        }
    }
}
