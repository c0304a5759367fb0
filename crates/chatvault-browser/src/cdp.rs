//! Minimal Chrome DevTools protocol client.
//!
//! One WebSocket per page target. Commands carry an increasing id and are
//! answered through a oneshot; everything without an id is an event and is
//! broadcast to subscribers. When the socket closes, every pending command
//! fails and the `closed` watch flips to `true`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};

use chatvault_core::{Error, Result};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// A protocol event, e.g. `Runtime.bindingCalled`.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

pub struct CdpClient {
    next_id: AtomicU64,
    outgoing: mpsc::UnboundedSender<String>,
    pending: Pending,
    events: broadcast::Sender<CdpEvent>,
    closed: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CdpClient {
    /// Connect to a target's `webSocketDebuggerUrl`.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::Browser(format!("DevTools connect failed: {}", e)))?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        debug!("DevTools session open: {}", ws_url);

        let (outgoing, mut rx) = mpsc::unbounded_channel::<String>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(256);
        let (closed_tx, closed) = watch::channel(false);

        let sender_task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if ws_sender.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let reader_pending = pending.clone();
        let reader_events = events.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(msg_result) = ws_receiver.next().await {
                match msg_result {
                    Ok(WsMessage::Text(text)) => dispatch(&text, &reader_pending, &reader_events),
                    Ok(WsMessage::Close(_)) => break,
                    Err(e) => {
                        warn!("DevTools socket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            let drained: Vec<_> = reader_pending.lock().drain().collect();
            for (_, reply) in drained {
                let _ = reply.send(Err(Error::Browser("DevTools session closed".into())));
            }
            let _ = closed_tx.send(true);
            debug!("DevTools session closed");
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            outgoing,
            pending,
            events,
            closed,
            tasks: vec![sender_task, reader_task],
        })
    }

    /// Send a command and wait for its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::Browser("DevTools session closed".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(id, reply_tx);

        let frame = json!({ "id": id, "method": method, "params": params }).to_string();
        if self.outgoing.send(frame).is_err() {
            self.pending.lock().remove(&id);
            return Err(Error::Browser("DevTools session closed".into()));
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Browser("DevTools session closed".into())),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::Browser(format!("{} timed out", method)))
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the session has closed.
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|c| *c).await;
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn dispatch(text: &str, pending: &Pending, events: &broadcast::Sender<CdpEvent>) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable DevTools frame: {}", e);
            return;
        }
    };

    if let Some(id) = frame.get("id").and_then(|v| v.as_u64()) {
        let Some(reply) = pending.lock().remove(&id) else {
            return;
        };
        let result = match frame.get("error") {
            Some(err) => Err(Error::Browser(
                err.get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown protocol error")
                    .to_string(),
            )),
            None => Ok(frame.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = reply.send(result);
        return;
    }

    if let Some(method) = frame.get("method").and_then(|m| m.as_str()) {
        // No subscribers is fine.
        let _ = events.send(CdpEvent {
            method: method.to_string(),
            params: frame.get("params").cloned().unwrap_or(Value::Null),
        });
    }
}
