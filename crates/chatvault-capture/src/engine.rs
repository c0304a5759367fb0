//! The capture engine: one actor per loaded view.
//!
//! ```text
//!   PageEvent ──► Scheduler ──► CheckChat / Scan ──► Extractor ──► SeenSet ──► BridgePort
//!   Command (force sync, status) ─────────────────────┘
//! ```
//!
//! State machine: `Idle → Observing(chat) ⇄ (chat switch) → Idle`. Dedup keys
//! are committed only once the host acknowledged a batch, so a deferred or
//! failed batch is retried on the next cycle.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use chatvault_core::{Error, Result};

use crate::bridge::BridgePort;
use crate::config::CaptureConfig;
use crate::dedup::{dedup_key, SeenSet};
use crate::extract::{ExtractContext, Extractor};
use crate::page::{PageEvent, PageView};
use crate::scheduler::{Action, Scheduler};

/// Observation state of the loaded view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Idle,
    Observing(String),
}

impl CaptureState {
    pub fn chat(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Observing(chat) => Some(chat),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Observing(_) => "observing",
        }
    }
}

/// Result of re-resolving the open chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatChange {
    Unchanged,
    /// A chat became visible while idle.
    Entered(String),
    /// A different chat replaced the observed one.
    Switched(String),
    /// No chat is visible any more.
    Lost,
}

/// Result of a forced sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(rename = "chatName", skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// Counters exposed through `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStatus {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
    pub seen: usize,
    pub scans: u64,
    pub batches_delivered: u64,
    pub messages_delivered: u64,
    pub deferred_batches: u64,
}

enum Command {
    ForceSync {
        target: Option<String>,
        reply: oneshot::Sender<SyncReport>,
    },
    Status {
        reply: oneshot::Sender<CaptureStatus>,
    },
}

pub struct CaptureEngine {
    page: Arc<dyn PageView>,
    bridge: BridgePort,
    extractor: Extractor,
    config: CaptureConfig,
    state: CaptureState,
    seen: SeenSet,
    status: CaptureStatus,
}

impl CaptureEngine {
    pub fn new(page: Arc<dyn PageView>, bridge: BridgePort, config: CaptureConfig) -> Self {
        Self {
            page,
            bridge,
            extractor: Extractor::default(),
            config,
            state: CaptureState::Idle,
            seen: SeenSet::new(),
            status: CaptureStatus::default(),
        }
    }

    /// Replace the strategy lists.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            state: self.state.name().to_string(),
            chat: self.state.chat().map(str::to_string),
            seen: self.seen.len(),
            ..self.status.clone()
        }
    }

    /// Re-resolve the open chat and apply the state transition.
    /// A switch clears the seen set.
    pub async fn refresh_chat(&mut self) -> Result<ChatChange> {
        let name = self
            .page
            .chat_name()
            .await?
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let current = self.state.chat().map(str::to_string);
        let change = match (current, name) {
            (None, None) => ChatChange::Unchanged,
            (None, Some(name)) => {
                info!("Observing chat '{}'", name);
                self.seen.clear();
                self.state = CaptureState::Observing(name.clone());
                ChatChange::Entered(name)
            }
            (Some(current), Some(name)) if current == name => ChatChange::Unchanged,
            (Some(_), Some(name)) => {
                info!("Switched to chat '{}'", name);
                self.seen.clear();
                self.state = CaptureState::Observing(name.clone());
                ChatChange::Switched(name)
            }
            (Some(current), None) => {
                debug!("Chat '{}' no longer visible", current);
                self.seen.clear();
                self.state = CaptureState::Idle;
                ChatChange::Lost
            }
        };
        Ok(change)
    }

    /// Extract, dedup and deliver the visible messages of the observed chat.
    ///
    /// Returns the number of messages acknowledged by the host. A switch
    /// detected here aborts the scan and is returned as the error-free
    /// `Ok(0)`; the caller schedules the settle scan.
    pub async fn scan(&mut self) -> Result<usize> {
        match self.refresh_chat().await? {
            ChatChange::Switched(_) | ChatChange::Lost => return Ok(0),
            ChatChange::Unchanged | ChatChange::Entered(_) => {}
        }
        let chat = match &self.state {
            CaptureState::Observing(chat) => chat.clone(),
            CaptureState::Idle => return Ok(0),
        };

        let elements = self.page.message_elements().await?;
        self.status.scans += 1;

        let today = chrono::Local::now().date_naive();
        let ctx = ExtractContext {
            chat_name: &chat,
            self_label: &self.config.self_label,
            date_order: self.config.date_order,
            today,
        };

        let mut batch = Vec::new();
        let mut keys = Vec::new();
        let mut batch_keys = HashSet::new();
        for el in &elements {
            let mut msg = match self.extractor.extract(el, &ctx) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!("Skipping element: {}", e);
                    continue;
                }
            };
            if !msg.has_payload() {
                continue;
            }
            let key = dedup_key(&chat, &msg, self.config.key_chars);
            if self.seen.contains(&key) || !batch_keys.insert(key.clone()) {
                continue;
            }

            if let Some(url) = msg.media().filter(|m| m.starts_with("blob:")).map(str::to_string) {
                match self.page.resolve_blob(&url).await {
                    Ok(Some(data)) => msg.media_data = Some(data),
                    Ok(None) => debug!("Blob {} already released", url),
                    Err(e) => debug!("Blob {} unreadable: {}", url, e),
                }
            }

            batch.push(msg);
            keys.push(key);
        }

        if batch.is_empty() {
            return Ok(0);
        }

        debug!("Found {} new message(s) in '{}'", batch.len(), chat);
        match self.bridge.deliver(&chat, &batch).await {
            Ok(reply) if reply.is_ack() => {
                let acked: Vec<String> = keys
                    .into_iter()
                    .enumerate()
                    .filter(|(idx, _)| reply.delivered(*idx))
                    .map(|(_, key)| key)
                    .collect();
                let delivered = acked.len();
                self.seen.commit(acked);
                self.status.batches_delivered += 1;
                self.status.messages_delivered += delivered as u64;
                if reply.inserted > 0 {
                    info!("Saved {} new message(s) from '{}'", reply.inserted, chat);
                }
                if delivered < batch.len() {
                    warn!(
                        "{} message(s) of '{}' not delivered, retrying next cycle",
                        batch.len() - delivered,
                        chat
                    );
                }
                Ok(delivered)
            }
            Ok(reply) => {
                self.status.deferred_batches += 1;
                warn!(
                    "Batch for '{}' rejected, retrying next cycle: {}",
                    chat,
                    reply.error.unwrap_or_default()
                );
                Ok(0)
            }
            Err(e @ Error::BridgeUnavailable(_)) => {
                self.status.deferred_batches += 1;
                warn!("Batch for '{}' deferred: {}", chat, e);
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Clear the seen set and rescan now. With a `target`, refuse when a
    /// different chat is open.
    pub async fn force_sync(&mut self, target: Option<&str>) -> SyncReport {
        if let Err(e) = self.refresh_chat().await {
            return SyncReport {
                success: false,
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
        let actual = self.state.chat().map(str::to_string);

        if let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) {
            if actual.as_deref() != Some(target) {
                return SyncReport {
                    success: false,
                    error: Some("Chat mismatch".into()),
                    expected: Some(target.to_string()),
                    actual,
                    ..Default::default()
                };
            }
        }

        info!(
            "Force sync triggered for '{}'",
            actual.as_deref().unwrap_or("current chat")
        );
        self.seen.clear();
        if let Err(e) = self.scan().await {
            return SyncReport {
                success: false,
                error: Some(e.to_string()),
                chat_name: actual,
                ..Default::default()
            };
        }
        SyncReport {
            success: true,
            count: Some(self.seen.len()),
            chat_name: actual,
            ..Default::default()
        }
    }

    /// Run the engine as a task fed by `events`.
    pub fn spawn(self, events: mpsc::Receiver<PageEvent>) -> CaptureHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(events, cmd_rx, cancel_rx));
        CaptureHandle {
            commands: cmd_tx,
            cancel: Some(cancel_tx),
            task,
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<PageEvent>,
        mut commands: mpsc::Receiver<Command>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        let timings = self.config.timings;
        let mut scheduler = Scheduler::new(timings, Instant::now());

        match self.refresh_chat().await {
            Ok(ChatChange::Entered(_)) => scheduler.schedule_scan(timings.initial_scan, Instant::now()),
            Ok(_) => {}
            Err(e) => warn!("Initial chat check failed: {}", e),
        }
        info!("Capture engine started ({:?})", self.state);

        loop {
            let deadline = scheduler.next_deadline();
            tokio::select! {
                _ = &mut cancel => break,
                event = events.recv() => match event {
                    Some(event) => scheduler.notify(event, Instant::now()),
                    None => {
                        debug!("Page event stream closed");
                        break;
                    }
                },
                cmd = commands.recv() => match cmd {
                    Some(Command::ForceSync { target, reply }) => {
                        let report = tokio::select! {
                            _ = &mut cancel => break,
                            report = self.force_sync(target.as_deref()) => report,
                        };
                        scheduler.record_scan(Instant::now());
                        let _ = reply.send(report);
                    }
                    Some(Command::Status { reply }) => {
                        let _ = reply.send(self.status());
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    let actions = scheduler.poll(Instant::now());
                    tokio::select! {
                        _ = &mut cancel => break,
                        _ = self.run_actions(&actions, &mut scheduler) => {}
                    }
                }
            }
        }

        info!("Capture engine stopped");
    }

    async fn run_actions(&mut self, actions: &[Action], scheduler: &mut Scheduler) {
        let settle = self.config.timings.switch_settle;
        for action in actions {
            match action {
                Action::CheckChat => match self.refresh_chat().await {
                    Ok(ChatChange::Entered(_)) | Ok(ChatChange::Switched(_)) => {
                        scheduler.schedule_scan(settle, Instant::now());
                        // The settle scan replaces any scan due in this round.
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Chat check failed: {}", e),
                },
                Action::Scan => {
                    let before = self.state.clone();
                    if let Err(e) = self.scan().await {
                        warn!("Scan failed: {}", e);
                    }
                    if self.state != before && self.state != CaptureState::Idle {
                        scheduler.schedule_scan(settle, Instant::now());
                    }
                }
            }
        }
    }
}

/// Start/cancel handle of a running capture engine.
pub struct CaptureHandle {
    commands: mpsc::Sender<Command>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    /// Clear the seen set and rescan, optionally checking the open chat.
    pub async fn force_sync(&self, target: Option<String>) -> Result<SyncReport> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ForceSync { target, reply })
            .await
            .map_err(|_| Error::Internal("capture engine stopped".into()))?;
        rx.await
            .map_err(|_| Error::Internal("capture engine stopped".into()))
    }

    pub async fn status(&self) -> Result<CaptureStatus> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Status { reply })
            .await
            .map_err(|_| Error::Internal("capture engine stopped".into()))?;
        rx.await
            .map_err(|_| Error::Internal("capture engine stopped".into()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the engine immediately; an in-flight bridge call is abandoned.
    pub async fn shutdown(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        let _ = (&mut self.task).await;
    }
}
