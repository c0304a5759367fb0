//! Host controller against a scripted DevTools endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatvault_browser::{scripts, BrowserConfig, CdpClient, HostController};
use chatvault_capture::CaptureConfig;
use chatvault_ingest::{IngestRouter, MediaStore};
use chatvault_store::SqliteStore;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};

fn evaluate(expression: &str, injected: &AtomicBool) -> (Value, bool) {
    if expression == scripts::PROBE_SCRIPT {
        let value = json!({"ready": true, "injected": injected.load(Ordering::SeqCst), "qr": false});
        return (value, false);
    }
    if expression == scripts::OBSERVER_SCRIPT {
        injected.store(true, Ordering::SeqCst);
        return (json!(true), true);
    }
    if expression == scripts::CHAT_NAME_SCRIPT {
        return (json!("Bob"), false);
    }
    if expression == scripts::SNAPSHOT_SCRIPT {
        let rows = json!([{
            "classes": ["message-in", "focusable-list-item"],
            "dataId": "false_15550001@c.us_3EB0A1",
            "senderLabel": null,
            "prePlainText": "[10:05 AM, 1/15/2025] Bob: ",
            "selectableTexts": [{"text": "hello from the page", "quoted": false}],
            "metadataLines": [],
            "attachments": [],
            "spanTexts": ["hello from the page", "10:05 AM"]
        }]);
        return (rows, false);
    }
    if expression == "location.href" {
        return (json!("https://web.whatsapp.com/"), false);
    }
    (Value::Null, false)
}

/// Serves one DevTools session until `kill` fires. With `answer_evaluate`
/// off, `Runtime.evaluate` calls are left pending forever.
async fn fake_devtools(answer_evaluate: bool) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let injected = AtomicBool::new(false);

        loop {
            tokio::select! {
                _ = &mut kill_rx => {
                    let _ = ws.close(None).await;
                    break;
                }
                msg = ws.next() => {
                    let text = match msg {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(_)) => continue,
                        _ => break,
                    };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    let id = frame["id"].clone();
                    let method = frame["method"].as_str().unwrap();
                    if method == "Runtime.evaluate" && !answer_evaluate {
                        continue;
                    }
                    let (result, notify) = match method {
                        "Runtime.evaluate" => {
                            let expression = frame["params"]["expression"].as_str().unwrap();
                            let (value, notify) = evaluate(expression, &injected);
                            (json!({"result": {"type": "object", "value": value}}), notify)
                        }
                        "Page.captureScreenshot" => (json!({"data": "iVBORw0KGgo="}), false),
                        "Page.navigate" => (json!({"frameId": "F1"}), false),
                        _ => (json!({}), false),
                    };
                    let reply = json!({"id": id, "result": result});
                    ws.send(WsMessage::Text(reply.to_string().into())).await.unwrap();
                    if notify {
                        let event = json!({
                            "method": "Runtime.bindingCalled",
                            "params": {"name": scripts::NOTIFY_BINDING, "payload": "mutation"}
                        });
                        ws.send(WsMessage::Text(event.to_string().into())).await.unwrap();
                    }
                }
            }
        }
    });

    (format!("ws://{}", addr), kill_tx)
}

async fn wait_until<F: Fn() -> bool>(what: &str, f: F) {
    for _ in 0..100 {
        if f() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn test_injection_capture_and_disconnect() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("db")).unwrap());
    let router = IngestRouter::local(store.clone(), MediaStore::new(dir.path().join("media")));

    let (url, kill) = fake_devtools(true).await;
    let client = Arc::new(CdpClient::connect(&url).await.unwrap());
    let config = BrowserConfig {
        inject_interval_secs: 1,
        ..Default::default()
    };
    let host = HostController::attach(config, client, None, CaptureConfig::default(), router)
        .await
        .unwrap();

    wait_until("first batch", || store.get_stats().unwrap().message_count == 1).await;

    let status = host.status().await;
    assert!(status.running);
    assert!(status.logged_in);
    assert!(status.injected);
    assert_eq!(status.active_url.as_deref(), Some("https://web.whatsapp.com/"));
    assert_eq!(status.capture.unwrap().chat.as_deref(), Some("Bob"));

    let mismatch = host.manual_sync(Some("Carol".into())).await.unwrap();
    assert!(!mismatch.success);
    assert_eq!(mismatch.actual.as_deref(), Some("Bob"));

    let report = host.manual_sync(None).await.unwrap();
    assert!(report.success);
    assert_eq!(report.count, Some(1));
    assert_eq!(store.get_stats().unwrap().message_count, 1);

    let chat = store.get_chat_by_name("Bob").unwrap().unwrap();
    let messages = store.get_messages(chat.id, 10, 0).unwrap();
    assert_eq!(messages[0].content.as_deref(), Some("hello from the page"));
    assert_eq!(messages[0].timestamp.as_deref(), Some("2025-01-15T10:05:00"));

    assert_eq!(host.qr_screenshot().await.unwrap(), "iVBORw0KGgo=");

    let _ = kill.send(());
    wait_until("disconnect", || !host.is_connected()).await;
    assert!(host.manual_sync(None).await.is_err());
    assert!(host.qr_screenshot().await.is_err());

    for _ in 0..100 {
        if host.status().await.capture.is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(host.status().await.capture.is_none());

    host.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_interrupts_stalled_injection() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("db")).unwrap());
    let router = IngestRouter::local(store, MediaStore::new(dir.path().join("media")));

    let (url, _kill) = fake_devtools(false).await;
    let client = Arc::new(CdpClient::connect(&url).await.unwrap());
    let config = BrowserConfig {
        inject_interval_secs: 1,
        ..Default::default()
    };
    let host = HostController::attach(config, client, None, CaptureConfig::default(), router)
        .await
        .unwrap();

    // The first probe is now waiting on an evaluate that never returns.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(host.is_connected());

    let started = std::time::Instant::now();
    tokio::time::timeout(Duration::from_secs(5), host.shutdown())
        .await
        .expect("shutdown stalled behind the pending probe");
    assert!(started.elapsed() < Duration::from_secs(5));
}
