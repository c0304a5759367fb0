//! Chrome process lifecycle.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use chatvault_core::{Error, Result};

use crate::config::BrowserConfig;

const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
];

/// Entry of the DevTools `/json/list` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DevToolsTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub ws_url: Option<String>,
}

/// A running Chrome with remote debugging enabled.
pub struct ChromeProcess {
    child: Child,
    pub port: u16,
    pub ws_url: String,
    pub launched_at: String,
}

impl ChromeProcess {
    /// Start Chrome on `config.url` and wait for its page target.
    pub async fn launch(config: &BrowserConfig, profile_dir: &Path) -> Result<Self> {
        let binary = find_chrome(config)?;
        let args = launch_args(config, profile_dir);
        info!("Launching browser: {}", binary.display());
        debug!("Browser args: {:?}", args);

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("failed to start {}: {}", binary.display(), e)))?;

        let ws_url = wait_for_page_target(config.debug_port, config.navigation_timeout()).await?;
        Ok(Self {
            child,
            port: config.debug_port,
            ws_url,
            launched_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the process if it is still running.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Browser already gone: {}", e);
        }
    }
}

/// Locate a Chrome binary: configured path, `CHROME_PATH`, then known names.
pub fn find_chrome(config: &BrowserConfig) -> Result<PathBuf> {
    if let Some(path) = config.chrome_path.as_deref().filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("CHROME_PATH") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path.trim()));
        }
    }
    for candidate in CHROME_CANDIDATES {
        let path = Path::new(candidate);
        if path.is_absolute() {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        } else if let Some(found) = search_path(candidate) {
            return Ok(found);
        }
    }
    Err(Error::Browser(
        "Chrome not found; set CHROME_PATH or chrome_path in the browser config".into(),
    ))
}

fn search_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Command line for an automation session that keeps the login profile.
pub fn launch_args(config: &BrowserConfig, profile_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", config.debug_port),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        format!("--window-size={},{}", config.window_width, config.window_height),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.push("about:blank".to_string());
    args
}

/// First page target that exposes a debugger URL.
pub fn pick_page_target(targets: &[DevToolsTarget]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.target_type == "page")
        .find_map(|t| t.ws_url.clone())
}

/// Poll `/json/list` until Chrome exposes a page target.
pub async fn wait_for_page_target(port: u16, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/json/list", port);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Vec<DevToolsTarget>>().await {
                    Ok(targets) => {
                        if let Some(ws_url) = pick_page_target(&targets) {
                            return Ok(ws_url);
                        }
                    }
                    Err(e) => warn!("Invalid DevTools target list: {}", e),
                }
            }
            Ok(response) => debug!("DevTools endpoint answered {}", response.status()),
            Err(_) => {}
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(Error::Browser(format!(
                "DevTools endpoint on port {} not ready after {:?}",
                port, timeout
            )));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args() {
        let mut config = BrowserConfig::default();
        let args = launch_args(&config, Path::new("/tmp/profile"));
        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--window-size=1280,900".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(!args.iter().any(|a| a == "--enable-automation"));

        config.headless = true;
        let args = launch_args(&config, Path::new("/tmp/profile"));
        assert!(args.contains(&"--headless=new".to_string()));
    }

    #[test]
    fn test_pick_page_target() {
        let targets: Vec<DevToolsTarget> = serde_json::from_str(
            r#"[
                {"type": "service_worker", "url": "https://x", "webSocketDebuggerUrl": "ws://sw"},
                {"type": "page", "url": "about:blank"},
                {"type": "page", "url": "about:blank", "webSocketDebuggerUrl": "ws://page"}
            ]"#,
        )
        .unwrap();
        assert_eq!(pick_page_target(&targets).as_deref(), Some("ws://page"));
        assert_eq!(pick_page_target(&[]), None);
    }

    #[test]
    fn test_configured_chrome_path_wins() {
        let config = BrowserConfig {
            chrome_path: Some("/opt/chrome/chrome".into()),
            ..Default::default()
        };
        assert_eq!(find_chrome(&config).unwrap(), PathBuf::from("/opt/chrome/chrome"));
    }
}
