//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Paths to all ChatVault data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// Materialized attachments (`data/media/`).
    pub media: PathBuf,
    /// Chrome user profile, keeps the messaging login (`data/browser-data/`).
    pub browser_profile: PathBuf,
    /// Browser connector settings (`data/browser/`).
    pub browser_config: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            media: root.join("media"),
            browser_profile: root.join("browser-data"),
            browser_config: root.join("browser"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.media)?;
        std::fs::create_dir_all(&self.browser_profile)?;
        std::fs::create_dir_all(&self.browser_config)?;
        Ok(())
    }
}

/// Order of day and month in the client's rendered dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOrder {
    /// `M/D/YYYY`
    #[default]
    Mdy,
    /// `D/M/YYYY`
    Dmy,
}

impl DateOrder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "mdy" | "us" => Some(Self::Mdy),
            "dmy" | "eu" => Some(Self::Dmy),
            _ => None,
        }
    }
}

/// Remote aggregator that captured batches are forwarded to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    /// Per sub-request timeout.
    pub timeout: Duration,
}

/// Top-level ChatVault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatVaultConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Forward captured batches instead of storing them locally.
    pub remote: Option<RemoteConfig>,
    /// Credential accepted by the remote ingest endpoint.
    pub ingest_api_key: Option<String>,
    pub date_order: DateOrder,
    /// Run Chrome headless (overrides the persisted browser setting).
    pub headless: Option<bool>,
}

impl ChatVaultConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3456);

        let data_paths = DataPaths::new(data_dir)?;

        let timeout_secs = std::env::var("REMOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let remote = match (non_empty_var("REMOTE_API_URL"), non_empty_var("API_KEY")) {
            (Some(url), Some(api_key)) => Some(RemoteConfig {
                url: url.trim_end_matches('/').to_string(),
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            }),
            _ => None,
        };

        let date_order = std::env::var("CHATVAULT_DATE_ORDER")
            .ok()
            .and_then(|s| DateOrder::from_name(&s))
            .unwrap_or_default();

        let headless = std::env::var("CHATVAULT_HEADLESS")
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"));

        Ok(Self {
            port,
            data_paths,
            remote,
            ingest_api_key: non_empty_var("INGEST_API_KEY"),
            date_order,
            headless,
        })
    }
}

/// Load variables from a `.env` file in the working directory, if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(_) => debug!("No .env file found"),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
