//! Host controller: Chrome lifecycle, observer injection, capture engine
//! ownership and the host end of the bridge.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chatvault_capture::bridge::{self, BridgePort};
use chatvault_capture::{CaptureConfig, CaptureEngine, CaptureHandle, PageEvent, SyncReport};
use chatvault_core::{Error, Result};
use chatvault_ingest::IngestRouter;

use crate::cdp::CdpClient;
use crate::config::BrowserConfig;
use crate::handler::RouterHandler;
use crate::launcher::ChromeProcess;
use crate::page::{CdpPage, PageProbe};
use crate::types::HostStatus;

type CaptureSlot = Arc<AsyncMutex<Option<CaptureHandle>>>;

/// Owns one automated browser session.
pub struct HostController {
    page: CdpPage,
    chrome: AsyncMutex<Option<ChromeProcess>>,
    pid: Option<u32>,
    launched_at: String,
    capture: CaptureSlot,
    probe: Arc<Mutex<PageProbe>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HostController {
    /// Start Chrome with the persistent profile and attach to it.
    pub async fn launch(
        config: BrowserConfig,
        profile_dir: &Path,
        capture_config: CaptureConfig,
        router: IngestRouter,
    ) -> Result<Arc<Self>> {
        let mut chrome = ChromeProcess::launch(&config, profile_dir).await?;
        let client = match CdpClient::connect(&chrome.ws_url).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                chrome.kill().await;
                return Err(e);
            }
        };
        Self::attach(config, client, Some(chrome), capture_config, router).await
    }

    /// Take over an open DevTools session: prepare the page, register the
    /// bridge handler, open the client and start the injection loop.
    pub async fn attach(
        config: BrowserConfig,
        client: Arc<CdpClient>,
        chrome: Option<ChromeProcess>,
        capture_config: CaptureConfig,
        router: IngestRouter,
    ) -> Result<Arc<Self>> {
        let page = CdpPage::new(client);
        page.prepare(&config.user_agent).await?;
        let events = page.events(256);

        let (port, bridge) = bridge::channel(16);
        let bridge_task = tokio::spawn(bridge.serve(Arc::new(RouterHandler::new(router))));

        info!("Opening {}", config.url);
        page.navigate(&config.url).await?;
        info!("Waiting for login (scan the QR code if needed)");

        let capture: CaptureSlot = Arc::new(AsyncMutex::new(None));
        let probe = Arc::new(Mutex::new(PageProbe::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let injector = Injector {
            page: page.clone(),
            capture: capture.clone(),
            probe: probe.clone(),
            port,
            capture_config,
            events: Some(events),
        };
        let injector_task = tokio::spawn(injector.run(config.inject_interval(), shutdown_rx));

        let (pid, launched_at) = match &chrome {
            Some(c) => (c.pid(), c.launched_at.clone()),
            None => (None, chrono::Utc::now().to_rfc3339()),
        };

        Ok(Arc::new(Self {
            page,
            chrome: AsyncMutex::new(chrome),
            pid,
            launched_at,
            capture,
            probe,
            shutdown_tx,
            tasks: Mutex::new(vec![injector_task, bridge_task]),
        }))
    }

    // ---------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        !self.page.client().is_closed()
    }

    pub async fn status(&self) -> HostStatus {
        let probe = *self.probe.lock();
        let running = self.is_connected();
        let active_url = if running {
            self.page.current_url().await.ok().flatten()
        } else {
            None
        };
        let capture = match self.capture.lock().await.as_ref() {
            Some(handle) => handle.status().await.ok(),
            None => None,
        };
        HostStatus {
            running,
            pid: self.pid,
            launched_at: Some(self.launched_at.clone()),
            active_url,
            logged_in: probe.ready,
            qr_visible: probe.qr,
            injected: probe.injected,
            capture,
        }
    }

    // ---------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------

    /// Force a rescan of the open chat, optionally checking its name.
    pub async fn manual_sync(&self, target: Option<String>) -> Result<SyncReport> {
        if !self.is_connected() {
            return Err(Error::Browser("Browser not connected".into()));
        }
        let capture = self.capture.lock().await;
        match capture.as_ref() {
            Some(handle) => handle.force_sync(target).await,
            None => Ok(SyncReport {
                success: false,
                error: Some("Capture script not injected yet".into()),
                ..Default::default()
            }),
        }
    }

    /// Base64 PNG of the page, used to scan the login QR remotely.
    pub async fn qr_screenshot(&self) -> Result<String> {
        if !self.is_connected() {
            return Err(Error::Browser("Browser not connected".into()));
        }
        self.page.screenshot().await
    }

    /// Stop capture and injection, close the browser.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }

        if self.is_connected() {
            info!("Closing browser...");
            let close = self.page.client().call("Browser.close", json!({}));
            if tokio::time::timeout(Duration::from_secs(5), close).await.is_err() {
                warn!("Browser did not close in time");
            }
        }
        if let Some(mut chrome) = self.chrome.lock().await.take() {
            chrome.kill().await;
        }
    }
}

/// Retries observer injection until the logged-in view is ready, starts the
/// capture engine on first success, and tears it down on exit.
struct Injector {
    page: CdpPage,
    capture: CaptureSlot,
    probe: Arc<Mutex<PageProbe>>,
    port: BridgePort,
    capture_config: CaptureConfig,
    events: Option<mpsc::Receiver<PageEvent>>,
}

impl Injector {
    async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let client = self.page.client().clone();
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = client.closed() => {
                    info!("Browser disconnected");
                    break;
                }
                _ = ticker.tick() => {
                    // A probe can sit on its call timeout; teardown must not wait for it.
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = client.closed() => {
                            info!("Browser disconnected");
                            break;
                        }
                        _ = self.try_inject() => {}
                    }
                }
            }
        }

        if let Some(handle) = self.capture.lock().await.take() {
            handle.shutdown().await;
            info!("Capture engine stopped");
        }
    }

    async fn try_inject(&mut self) {
        let probe = match self.page.probe().await {
            Ok(probe) => probe,
            Err(e) => {
                debug!("Page probe failed: {}", e);
                return;
            }
        };
        let previous = std::mem::replace(&mut *self.probe.lock(), probe);
        if probe.qr && !previous.qr {
            info!("QR code detected, scan it with your phone");
        }
        if probe.ready && !previous.ready {
            info!("Messaging client logged in");
        }
        if !probe.ready || probe.injected {
            return;
        }

        info!("Injecting observer script...");
        if let Err(e) = self.page.inject_observer().await {
            warn!("Observer injection failed: {}", e);
            return;
        }
        self.probe.lock().injected = true;

        let mut capture = self.capture.lock().await;
        if capture.is_some() {
            info!("Observer re-injected after reload");
            return;
        }
        if let Some(events) = self.events.take() {
            let engine = CaptureEngine::new(
                Arc::new(self.page.clone()),
                self.port.clone(),
                self.capture_config.clone(),
            );
            *capture = Some(engine.spawn(events));
            info!("Observer injected, capture engine started");
        }
    }
}
