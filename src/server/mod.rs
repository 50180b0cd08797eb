//! HTTP interface for live rate scraping.
//!
//! - `GET /health`
//! - `GET /api/rates?url=&debug=&fresh=` scrape (cached unless `fresh`)
//! - `POST /api/rates` with `{"action": "getStructure" | "close", "url"?}`
//! - `GET /api/rates/cache` cached entry summary

mod handlers;
mod routes;

pub use handlers::{ErrorEnvelope, RatesAction};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::orchestrator::RateOrchestrator;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RateOrchestrator>,
    /// Used when a request names no URL.
    pub default_url: Option<String>,
}

impl AppState {
    pub fn new(orchestrator: Arc<RateOrchestrator>, default_url: Option<String>) -> Self {
        Self {
            orchestrator,
            default_url,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let orchestrator =
            RateOrchestrator::from_settings(settings).context("Failed to build scraper")?;
        Ok(Self::new(Arc::new(orchestrator), settings.target_url.clone()))
    }
}

/// Start the web server. The browser is torn down on Ctrl-C.
pub async fn serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let state = AppState::from_settings(settings)?;
    let orchestrator = state.orchestrator.clone();
    let app = create_router(state);

    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, closing browser");
    orchestrator.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
