//! Browser connector configuration persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Persisted browser connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Explicit Chrome binary; searched on the usual paths when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_false")]
    pub headless: bool,
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_window")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// Seconds between observer injection attempts.
    #[serde(default = "default_inject_interval")]
    pub inject_interval_secs: u64,
    /// Seconds to wait for the DevTools endpoint and the first navigation.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,
    /// Path to config file (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_false() -> bool {
    false
}
fn default_url() -> String {
    "https://web.whatsapp.com".into()
}
fn default_debug_port() -> u16 {
    9222
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
        .into()
}
fn default_window() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    900
}
fn default_inject_interval() -> u64 {
    3
}
fn default_navigation_timeout() -> u64 {
    60
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            url: default_url(),
            headless: false,
            debug_port: default_debug_port(),
            user_agent: default_user_agent(),
            window_width: default_window(),
            window_height: default_window_height(),
            inject_interval_secs: default_inject_interval(),
            navigation_timeout_secs: default_navigation_timeout(),
            config_path: PathBuf::new(),
        }
    }
}

impl BrowserConfig {
    /// Load config from a JSON file, or return defaults.
    pub fn load(config_dir: &Path) -> Self {
        let config_path = config_dir.join("config.json");
        let mut config: BrowserConfig = std::fs::read_to_string(&config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        config.config_path = config_path;
        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&self.config_path, json)
    }

    pub fn inject_interval(&self) -> Duration {
        Duration::from_secs(self.inject_interval_secs.max(1))
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs.max(1))
    }
}
