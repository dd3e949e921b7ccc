// Server module - axum router, shared state and lifecycle
//
// Navigation is by query parameter on a fixed set of paths; every page is
// rendered server-side. Per-client state is found through the `qa_client`
// cookie attached by the `client_cookie` middleware.
//
// While serving, a maintenance task evicts idle in-memory clients and prunes
// store rows of clients not seen within the retention window.

mod api;
mod client;
mod error;
mod live;
mod pages;


pub use client::{ClientRegistry, CLIENT_COOKIE};

use crate::backend::Backend;
use crate::config::Config;
use crate::live::Hub;
use crate::logging::ACCESS_TARGET;
use crate::store::{ClientStore, StoreError};
use anyhow::{Context, Result};
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

const USERNAME_PATTERN: &str = "^[a-z0-9_]{3,20}$";

/// How often idle clients are swept
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// In-memory controllers untouched this long are dropped
pub const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    pub store: ClientStore,
    pub hub: Hub,
    pub registry: ClientRegistry,
    pub(crate) username_pattern: Regex,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>, store: ClientStore) -> Result<Self> {
        let registry = ClientRegistry::new(config.composer.rules());
        Ok(Self {
            config: Arc::new(config),
            backend,
            store,
            hub: Hub::new(),
            registry,
            username_pattern: Regex::new(USERNAME_PATTERN)
                .context("Invalid username pattern")?,
        })
    }

    /// Run a client store operation on the blocking pool
    pub(crate) async fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ClientStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Database(format!("store task failed: {}", e)))?
    }
}

/// One info line per request under the access target
async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        target: ACCESS_TARGET,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Build the router with all routes and the client cookie middleware
pub fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(pages::home))
        .route("/tags", get(pages::tags))
        .route("/users", get(pages::users))
        .route("/user", get(pages::user))
        .route("/question", get(pages::question))
        .route("/question/comment", post(pages::comment))
        .route("/featured", get(pages::featured))
        .route("/ask", get(pages::ask).post(pages::ask_submit))
        .route("/ask/category", post(pages::ask_category))
        .route("/ask/tag", post(pages::ask_tag))
        .route("/ask/draft", post(pages::ask_draft))
        .route("/profile", post(pages::profile_edit))
        .route("/auth/session", post(pages::auth_session))
        .route("/auth/signout", post(pages::auth_signout))
        .route("/theme/toggle", post(pages::theme_toggle))
        .route("/live/feed", get(live::feed))
        .route("/api/categories", get(api::categories))
        .route("/api/questions", get(api::questions))
        .route("/health", get(api::health))
        .layer(middleware::from_fn(client::client_cookie));

    let router = if state.config.logging.access_log {
        router.layer(middleware::from_fn(access_log))
    } else {
        router
    };
    router.with_state(state)
}

/// One maintenance pass: evict idle clients, prune expired store rows
pub(crate) async fn run_maintenance(state: &AppState, idle: Duration) {
    let evicted = state.registry.evict_idle(idle);
    let clients = state.registry.len();

    let Some(retention) = state.config.store.retention() else {
        tracing::debug!(evicted, clients, "Maintenance done, store retention disabled");
        return;
    };
    let cutoff = Utc::now() - retention;
    match state.with_store(move |store| store.prune_idle(cutoff)).await {
        Ok(pruned) => tracing::debug!(evicted, clients, pruned, "Maintenance done"),
        Err(e) => tracing::warn!("Store retention cleanup failed: {}", e),
    }
}

async fn maintenance_loop(state: AppState) {
    let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
    // The first tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        run_maintenance(&state, CLIENT_IDLE_TIMEOUT).await;
    }
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let maintenance = tokio::spawn(maintenance_loop(state.clone()));
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error");
    maintenance.abort();
    result
}

/// Bind the configured address and serve until the shutdown signal
pub async fn start_server(
    state: AppState,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let bind_addr = state.config.bind_addr;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!(backend = state.backend.name(), "Server listening on {}", bind_addr);

    // Stop accepting on signal; in-flight requests finish first
    serve(listener, state, async move {
        shutdown_rx.await.ok();
    })
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}
