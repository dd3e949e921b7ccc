// Physics Q&A - community questions and answers about physics
//
// A server-rendered web app: ask a question under a category with a few
// suggested tags, browse and search the feed, answer other people's
// questions.
//
// Architecture:
// - Server (axum): HTML pages, a live feed stream and small JSON API
// - Backend trait: embedded SQLite or a hosted PostgREST service
// - Client store (SQLite): per-browser theme, drafts and cached fragments
// - Controllers: auth, composer, listing, detail; views render to HTML

mod auth;
mod backend;
mod catalog;
mod cli;
mod composer;
mod config;
mod detail;
mod listing;
mod live;
mod logging;
mod model;
mod seed;
mod server;
mod slug;
mod startup;
mod store;
mod theme;
mod util;
mod view;

use anyhow::{bail, Context, Result};
use backend::rest::RestBackend;
use backend::sqlite::SqliteBackend;
use backend::Backend;
use cli::Mode;
use config::{BackendConfig, BackendKind, Config};
use std::sync::Arc;
use std::time::Duration;
use store::ClientStore;

/// How long in-flight requests and open streams get after Ctrl+C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Build the configured content backend
fn open_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    match config.kind {
        BackendKind::Sqlite => {
            let backend = SqliteBackend::open(&config.db_path).with_context(|| {
                format!("Failed to open database {}", config.db_path.display())
            })?;
            Ok(Arc::new(backend))
        }
        BackendKind::Rest => {
            let Some(url) = config.rest_url.as_deref() else {
                bail!("backend kind is \"rest\" but rest_url is not set (PHYSICS_QA_REST_URL)");
            };
            let key = config.rest_api_key.as_deref().unwrap_or_default();
            Ok(Arc::new(RestBackend::new(url, key)?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Config commands exit here
    let mode = cli::handle_cli();
    if mode == Mode::Done {
        return Ok(());
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let config = Config::from_env()?;

    // Precedence: RUST_LOG env var > config file > default "info"
    // The guard must be kept alive for the duration of the program to flush file logs
    let _file_guard = logging::init(&config.logging);

    let backend = open_backend(&config.backend)?;

    if mode == Mode::Seed {
        let report = seed::run(backend.as_ref()).await?;
        println!("Seeded {} backend: {}", backend.name(), report);
        return Ok(());
    }

    let store = ClientStore::open(&config.store.db_path).with_context(|| {
        format!(
            "Failed to open client store {}",
            config.store.db_path.display()
        )
    })?;

    startup::print_startup(&config);
    startup::log_startup(&config);

    let state = server::AppState::new(config, backend, store)?;

    // Oneshot: the server stops accepting once this fires
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut server_handle = tokio::spawn(server::start_server(state, shutdown_rx));

    tokio::select! {
        result = &mut server_handle => {
            // Server stopped on its own: bind failure or serve error
            return result.context("Server task panicked")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
    }

    tracing::info!("Shutting down...");

    // If the send fails, the server has already shut down
    let _ = shutdown_tx.send(());

    // Live feed streams never finish by themselves
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server_handle).await {
        Ok(Ok(Err(e))) => tracing::error!("Server error during shutdown: {:#}", e),
        Ok(_) => {}
        Err(_) => {
            tracing::warn!("Open connections did not close in time, exiting anyway");
            server_handle.abort();
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
