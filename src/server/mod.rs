//! HTTP and WebSocket front end
//!
//! # Routes
//!
//! - `GET /health`: liveness plus per-credential quota
//! - `POST /check`: pre-flight sitemap count against credential budgets
//! - `GET /ws?domain=..&credentialSlot=..`: starts a job and streams its progress
//! - `GET /ws/{API<n>}/{domain}`: same, pinned to credential `API<n>`
//! - `POST /credentials/{API<n>}/reset`: clears a credential's failure streak

mod handlers;
mod session;

pub use handlers::{websocket_url, CheckRequest, CheckResponse, HealthResponse};
pub use session::{relay, SessionLimits};

use crate::config::ServerConfig;
use crate::job::Orchestrator;
use axum::routing::{get, post};
use axum::Router;

/// State shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub force_secure_websocket: bool,
    pub limits: SessionLimits,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: &ServerConfig) -> Self {
        Self {
            orchestrator,
            force_secure_websocket: config.force_secure_websocket,
            limits: SessionLimits::from_config(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/check", post(handlers::check))
        .route("/ws", get(handlers::ws_query))
        .route("/ws/:api_name/:domain", get(handlers::ws_path))
        .route("/credentials/:api_name/reset", post(handlers::reset_credential))
        .with_state(state)
}

/// Binds `config.bind_address` and serves until Ctrl-C
pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
