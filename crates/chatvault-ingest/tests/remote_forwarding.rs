//! Remote forwarding against an in-process aggregator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chatvault_core::{CapturedMessage, Error, RemoteConfig};
use chatvault_ingest::{IngestRouter, RemoteForwarder};
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Clone, Default)]
struct Aggregator {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn ingest(State(agg): State<Aggregator>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    agg.requests.lock().unwrap().push((auth, body.clone()));

    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    if messages.iter().any(|m| m["id"] == "boom") {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "disk full"})));
    }
    if body["chatName"] == "Refused" {
        return (StatusCode::OK, Json(json!({"success": false, "error": "unknown chat"})));
    }
    (StatusCode::OK, Json(json!({"success": true, "count": messages.len()})))
}

async fn start_aggregator() -> (String, Aggregator, oneshot::Sender<()>) {
    let agg = Aggregator::default();
    let app = Router::new()
        .route("/api/ingest", post(ingest))
        .with_state(agg.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind aggregator");
    let addr = listener.local_addr().expect("aggregator addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    (format!("http://{}", addr), agg, shutdown_tx)
}

fn forwarder(url: &str) -> RemoteForwarder {
    RemoteForwarder::new(&RemoteConfig {
        url: format!("{}/", url),
        api_key: "secret".into(),
        timeout: Duration::from_secs(5),
    })
}

fn text(id: &str) -> CapturedMessage {
    CapturedMessage {
        id: Some(id.into()),
        content: format!("text {}", id),
        ..Default::default()
    }
}

fn image(id: &str) -> CapturedMessage {
    CapturedMessage {
        id: Some(id.into()),
        content: "[Image]".into(),
        media_data: Some("data:image/png;base64,iVBORw0KGgo=".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_media_messages_sent_separately() {
    let (url, agg, shutdown) = start_aggregator().await;
    let fwd = forwarder(&url);
    assert_eq!(fwd.endpoint(), format!("{}/api/ingest", url));

    let batch = vec![text("t1"), image("i1"), text("t2"), image("i2")];
    let report = fwd.forward("Bob", batch).await.unwrap();
    assert_eq!(report.total, 4);
    assert_eq!(report.inserted, 4);
    assert_eq!(report.failed_requests, 0);
    assert!(report.failed.is_empty());

    let requests = agg.requests.lock().unwrap().clone();
    let sizes: Vec<usize> = requests
        .iter()
        .map(|(_, body)| body["messages"].as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![2, 1, 1]);
    for (auth, body) in &requests {
        assert_eq!(auth.as_deref(), Some("Bearer secret"));
        assert_eq!(body["chatName"], "Bob");
    }
    assert!(requests[1].1["messages"][0]["mediaData"].is_string());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_failed_sub_request_is_skipped() {
    let (url, agg, shutdown) = start_aggregator().await;
    let fwd = forwarder(&url);

    let batch = vec![text("t1"), image("boom"), image("i2")];
    let report = fwd.forward("Bob", batch).await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed_requests, 1);
    assert_eq!(report.failed, vec![1]);
    assert_eq!(agg.requests.lock().unwrap().len(), 3);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_all_requests_failing_is_an_error() {
    let (url, _agg, shutdown) = start_aggregator().await;
    let router = IngestRouter::remote(forwarder(&url));
    assert!(router.is_remote());

    let err = router.ingest("Refused", vec![text("t1")]).await.unwrap_err();
    assert!(matches!(err, Error::RemoteTransport(_)));

    let outcome = router.ingest("Bob", vec![text("t1")]).await.unwrap();
    assert_eq!(outcome.inserted, 1);
    assert!(outcome.chat_id.is_none());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_unreachable_aggregator() {
    let fwd = RemoteForwarder::new(&RemoteConfig {
        url: "http://127.0.0.1:9".into(),
        api_key: "secret".into(),
        timeout: Duration::from_millis(500),
    });
    let err = fwd.forward("Bob", vec![text("t1")]).await.unwrap_err();
    assert!(matches!(err, Error::RemoteTransport(_)));
}
