use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState, SharedState};
use crate::auth::StaticTokenSessions;
use crate::config::JournalConfig;
use crate::editor::{DRAFT_IDLE_TIMEOUT, DRAFT_SWEEP_INTERVAL};
use crate::export::ExportOptions;
use crate::settings::UserSettings;
use crate::store::{DbHandle, JournalDb};

/// Configuration for the journal server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3141,
            db_path: PathBuf::from(".journal/journal.db"),
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn from_config(config: &JournalConfig) -> Self {
        Self {
            host: config.host().to_string(),
            port: config.port(),
            db_path: config.db_path(),
            dev_mode: config.dev_mode(),
        }
    }
}

/// Build the full application router: API, WebSocket and request tracing.
pub fn build_router(state: SharedState, dev_mode: bool) -> Router {
    let mut app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Build application state from the resolved configuration.
pub fn build_state(config: &JournalConfig, db: DbHandle) -> SharedState {
    let sessions = StaticTokenSessions::new(&config.toml.auth.users);
    if sessions.is_empty() {
        warn!("No users configured in [[auth.users]]; every API request will be rejected");
    }
    let export_defaults = ExportOptions {
        include_metadata: config.toml.export.include_metadata,
        include_private: config.toml.export.include_private,
    };
    Arc::new(AppState::new(
        db,
        Arc::new(sessions),
        UserSettings::from_server_defaults(&config.toml.autosave),
        export_defaults,
    ))
}

pub fn open_database(db_path: &std::path::Path) -> Result<DbHandle> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = JournalDb::new(db_path).context("Failed to initialize journal database")?;
    Ok(DbHandle::new(db))
}

/// Start the journal server and run until Ctrl+C.
pub async fn start_server(config: &JournalConfig) -> Result<()> {
    let server = ServerConfig::from_config(config);
    let db = open_database(&server.db_path)?;
    let state = build_state(config, db);
    let app = build_router(state.clone(), server.dev_mode);

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(db = %server.db_path.display(), dev_mode = server.dev_mode, "Journal running at http://{}", local_addr);

    let sweeper = state
        .drafts
        .spawn_sweeper(DRAFT_SWEEP_INTERVAL, DRAFT_IDLE_TIMEOUT);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    // Flush drafts that still hold unsaved edits.
    state.drafts.close_all().await;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
