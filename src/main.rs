use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use portal_service::config::Config;
use portal_service::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    if config.heidi.is_none() {
        warn!("Heidi API credentials not set; clinical routes will report configuration errors");
    }
    if config.gemini.is_none() {
        warn!("GEMINI_API_KEY not set; /explain will report configuration errors");
    }

    let state = AppState::from_config(&config);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("portal-service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, stopping");
}
