//! The live page as seen over the DevTools protocol.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use chatvault_capture::{MessageElement, PageEvent, PageView};
use chatvault_core::{Error, Result};

use crate::cdp::CdpClient;
use crate::scripts;

/// Result of [`scripts::PROBE_SCRIPT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageProbe {
    pub ready: bool,
    pub injected: bool,
    pub qr: bool,
}

#[derive(Clone)]
pub struct CdpPage {
    client: Arc<CdpClient>,
}

impl CdpPage {
    pub fn new(client: Arc<CdpClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<CdpClient> {
        &self.client
    }

    /// Enable the domains we use, override the user agent and expose the
    /// notification binding.
    pub async fn prepare(&self, user_agent: &str) -> Result<()> {
        self.client.call("Page.enable", json!({})).await?;
        self.client.call("Runtime.enable", json!({})).await?;
        self.client
            .call("Network.setUserAgentOverride", json!({ "userAgent": user_agent }))
            .await?;
        self.client
            .call("Runtime.addBinding", json!({ "name": scripts::NOTIFY_BINDING }))
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self.client.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(err) = result.get("errorText").and_then(|e| e.as_str()) {
            return Err(Error::Browser(format!("navigation to {} failed: {}", url, err)));
        }
        Ok(())
    }

    /// Evaluate an expression, awaiting promises, and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .client
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or("script exception");
            return Err(Error::Browser(text.to_string()));
        }
        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    pub async fn probe(&self) -> Result<PageProbe> {
        let value = self.evaluate(scripts::PROBE_SCRIPT).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Install the observers. Idempotent per document.
    pub async fn inject_observer(&self) -> Result<()> {
        self.evaluate(scripts::OBSERVER_SCRIPT).await?;
        Ok(())
    }

    /// PNG screenshot of the viewport, base64 encoded.
    pub async fn screenshot(&self) -> Result<String> {
        let result = self
            .client
            .call("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        result
            .get("data")
            .and_then(|d| d.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Browser("screenshot returned no data".into()))
    }

    pub async fn current_url(&self) -> Result<Option<String>> {
        let value = self.evaluate("location.href").await?;
        Ok(value.as_str().map(str::to_string))
    }

    /// Forward observer notifications as page events until the session
    /// closes or the receiver is dropped.
    pub fn events(&self, capacity: usize) -> mpsc::Receiver<PageEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        let mut sub = self.client.subscribe();
        tokio::spawn(async move {
            loop {
                match sub.recv().await {
                    Ok(event) => {
                        if let Some(page_event) = binding_event(&event.method, &event.params) {
                            if tx.send(page_event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Missed notifications are covered by the next one or the tick.
                        debug!("Dropped {} DevTools events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }
}

/// Map a `Runtime.bindingCalled` event of our binding to a page event.
pub fn binding_event(method: &str, params: &Value) -> Option<PageEvent> {
    if method != "Runtime.bindingCalled" {
        return None;
    }
    if params.get("name").and_then(|n| n.as_str()) != Some(scripts::NOTIFY_BINDING) {
        return None;
    }
    params
        .get("payload")
        .and_then(|p| p.as_str())
        .and_then(PageEvent::from_name)
}

#[async_trait]
impl PageView for CdpPage {
    async fn chat_name(&self) -> Result<Option<String>> {
        let value = self.evaluate(scripts::CHAT_NAME_SCRIPT).await?;
        Ok(value
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    async fn message_elements(&self) -> Result<Vec<MessageElement>> {
        let value = self.evaluate(scripts::SNAPSHOT_SCRIPT).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn resolve_blob(&self, url: &str) -> Result<Option<String>> {
        match self.evaluate(&scripts::resolve_blob_script(url)).await {
            Ok(value) => Ok(value.as_str().map(str::to_string).filter(|s| s.starts_with("data:"))),
            Err(e) => {
                warn!("Blob read failed for {}: {}", url, e);
                Ok(None)
            }
        }
    }
}
