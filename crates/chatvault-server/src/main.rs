//! ChatVault: captures messages from a live web messaging client into a
//! searchable local store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatvault_browser::{BrowserConfig, HostController};
use chatvault_capture::CaptureConfig;
use chatvault_core::ChatVaultConfig;
use chatvault_ingest::IngestRouter;
use chatvault_server::{build_router, AppState};
use chatvault_store::SqliteStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CHATVAULT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn print_help() {
    println!("ChatVault: message capture and search");
    println!();
    println!("Usage: chatvault [command]");
    println!();
    println!("Commands:");
    println!("  (none)       Start the server and the capture browser");
    println!("  dashboard    Start the server only");
    println!("  capture      Capture only, forwarding to REMOTE_API_URL");
    println!("  reindex      Rebuild the full-text index");
    println!("  help         Show this help message");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Dashboard,
    Capture,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatvault_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mode = match args.get(1).map(String::as_str) {
        None => Mode::Full,
        Some("dashboard") | Some("--dashboard-only") => Mode::Dashboard,
        Some("capture") => Mode::Capture,
        Some("reindex") => {
            let config = ChatVaultConfig::from_env(resolve_data_dir())?;
            let store = open_store(&config.data_paths.db)?;
            let indexed = store
                .rebuild_fts()
                .map_err(|e| anyhow::anyhow!("Failed to rebuild index: {}", e))?;
            println!("Indexed {} messages", indexed);
            return Ok(());
        }
        Some("--help") | Some("-h") | Some("help") => {
            print_help();
            return Ok(());
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'chatvault help' for usage.", other);
            std::process::exit(1);
        }
    };

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());
    let config = ChatVaultConfig::from_env(&data_dir)?;

    match mode {
        Mode::Capture => run_capture(config).await,
        Mode::Full | Mode::Dashboard => run_server(config, mode == Mode::Full).await,
    }
}

fn open_store(db_dir: &Path) -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(db_dir).map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    Ok(Arc::new(store))
}

fn browser_config(config: &ChatVaultConfig) -> BrowserConfig {
    let mut browser = BrowserConfig::load(&config.data_paths.browser_config);
    if let Some(headless) = config.headless {
        browser.headless = headless;
    }
    if !browser.config_path.exists() {
        if let Err(e) = browser.save() {
            warn!("Failed to save browser config: {}", e);
        }
    }
    browser
}

async fn launch_host(config: &ChatVaultConfig, router: IngestRouter) -> anyhow::Result<Arc<HostController>> {
    let host = HostController::launch(
        browser_config(config),
        &config.data_paths.browser_profile,
        CaptureConfig::with_date_order(config.date_order),
        router,
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to launch browser: {}", e))?;
    Ok(host)
}

async fn run_server(config: ChatVaultConfig, with_capture: bool) -> anyhow::Result<()> {
    let port = config.port;
    let store = open_store(&config.data_paths.db)?;
    let state = Arc::new(AppState::new(config, store.clone())?);

    let app = build_router(state.clone());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("ChatVault server listening on {}", addr);
    info!("Dashboard: http://localhost:{}", port);

    if with_capture {
        let host = launch_host(&state.config, state.router.clone()).await?;
        state.set_host(Some(host));
        info!("Capture running; press Ctrl+C to stop");
    } else {
        info!("Dashboard-only mode");
    }

    // Browser first, then the server; the store closes when the last handle drops.
    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            if let Some(host) = shutdown_state.host() {
                host.shutdown().await;
            }
            shutdown_state.set_host(None);
        })
        .await?;

    drop(state);
    drop(store);
    info!("Server stopped");
    Ok(())
}

async fn run_capture(config: ChatVaultConfig) -> anyhow::Result<()> {
    let Some(remote) = config.remote.as_ref() else {
        anyhow::bail!("capture mode needs REMOTE_API_URL and API_KEY");
    };
    info!("Remote API: {}", remote.url);

    let router = IngestRouter::from_config(&config, None)?;
    let host = launch_host(&config, router).await?;
    info!("Capture running, messages are sent to {}; press Ctrl+C to stop", remote.url);

    shutdown_signal().await;
    host.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
