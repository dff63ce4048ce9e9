//! HTTP surface: routes, extractors and the error-to-status mapping.
//!
//! Handlers do no work of their own. Each one builds a query or command from
//! the path and body and hands it to the mediator.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::{create_app, create_router, App};
pub use state::AppState;

use crate::config::ServerConfig;
use anyhow::Context;
use hyper::Server;
use std::net::SocketAddr;
use tower::make::Shared;
use tracing::info;

/// Serve until Ctrl-C
pub async fn start_server(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let app = create_app(state, config);

    info!("HTTP server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    Server::bind(&addr)
        .serve(Shared::new(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
