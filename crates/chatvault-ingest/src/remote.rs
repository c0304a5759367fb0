//! Forwarding of captured batches to a remote aggregator.
//!
//! The aggregator exposes `POST {url}/api/ingest` with bearer auth and a body
//! of `{chatName, messages}`. Text-only messages travel together; every
//! message with an inlined attachment gets its own request so a single large
//! payload cannot sink the rest of the batch.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use chatvault_core::{CapturedMessage, Error, RemoteConfig, Result};

/// Aggregated result of one forwarded batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReport {
    /// Messages the aggregator reported as newly inserted.
    pub inserted: usize,
    /// Messages in the batch.
    pub total: usize,
    /// Sub-requests that failed and were skipped.
    pub failed_requests: usize,
    /// Batch indices of the messages carried by failed sub-requests.
    pub failed: Vec<usize>,
}

/// Acknowledgement returned by the aggregator.
#[derive(Debug, Deserialize)]
struct IngestAck {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    inserted: Option<usize>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    error: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct RemoteForwarder {
    client: Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl RemoteForwarder {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/ingest", self.url)
    }

    /// Forward a batch. Failed sub-requests are logged and skipped; the call
    /// errors only when every sub-request failed.
    pub async fn forward(&self, chat_name: &str, messages: Vec<CapturedMessage>) -> Result<ForwardReport> {
        let total = messages.len();
        let (with_media, text_only): (Vec<_>, Vec<_>) = messages
            .into_iter()
            .enumerate()
            .partition(|(_, m)| m.has_inline_media());

        let mut report = ForwardReport {
            total,
            ..Default::default()
        };
        let mut attempted = 0;
        let mut last_error = None;

        if !text_only.is_empty() {
            attempted += 1;
            let (indices, batch): (Vec<usize>, Vec<CapturedMessage>) = text_only.into_iter().unzip();
            match self.post(chat_name, &batch).await {
                Ok(n) => report.inserted += n,
                Err(e) => {
                    warn!("Remote ingest failed for {} text messages of '{}': {}", batch.len(), chat_name, e);
                    report.failed_requests += 1;
                    report.failed.extend(indices);
                    last_error = Some(e);
                }
            }
        }

        for (idx, msg) in with_media {
            attempted += 1;
            match self.post(chat_name, std::slice::from_ref(&msg)).await {
                Ok(n) => report.inserted += n,
                Err(e) => {
                    warn!("Remote ingest failed for media message of '{}': {}", chat_name, e);
                    report.failed_requests += 1;
                    report.failed.push(idx);
                    last_error = Some(e);
                }
            }
        }
        report.failed.sort_unstable();

        if attempted > 0 && report.failed_requests == attempted {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        debug!(
            "Forwarded '{}' to {}: {}/{} inserted, {} failed requests",
            chat_name,
            self.url,
            report.inserted,
            report.total,
            report.failed_requests
        );
        Ok(report)
    }

    async fn post(&self, chat_name: &str, messages: &[CapturedMessage]) -> Result<usize> {
        let body = json!({
            "chatName": chat_name,
            "messages": messages,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::RemoteTransport(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::RemoteTransport(format!("HTTP {}: {}", status, text)));
        }

        let ack: IngestAck = response
            .json()
            .await
            .map_err(|e| Error::RemoteTransport(format!("invalid response: {}", e)))?;
        if !ack.success {
            return Err(Error::RemoteTransport(
                ack.error.unwrap_or_else(|| "rejected by aggregator".into()),
            ));
        }
        Ok(ack.inserted.or(ack.count).unwrap_or(messages.len()))
    }
}
