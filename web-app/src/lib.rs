//! sitecast control panel server.
//!
//! Serves the HTML panel and the JSON endpoints, and owns the engine for the
//! lifetime of the process.

mod config;
mod routes;

pub use config::{AppConfig, ConfigError, DEFAULT_ADDR};
pub use routes::{router, ApiError, AppState};

use anyhow::Context;
use dotenv::dotenv;
use sitecast_engine::create_engine;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "sitecast=debug,sitecast_lib=debug,sitecast_engine=debug,sitecast_render=debug,sitecast_encoder=debug,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the server until Ctrl-C.
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    info!(addr = %config.addr, "sitecast starting");

    let encoder = config.encoder_backend();
    let ffmpeg = encoder.binary().display().to_string();
    let engine = create_engine(config.drivers.clone(), encoder, config.engine.clone());
    if !engine.encoder_available().await {
        warn!(%ffmpeg, "FFmpeg not found, streaming is unavailable until it is installed");
    }

    let app = router(AppState {
        engine: engine.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    info!("Control panel listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    info!("Shutting down");
    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
