mod admin;
mod api;
mod bootstrap;
mod chat;
mod classifier;
mod health;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Notify;
use vaulta_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use vaulta_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "vaulta-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let serve = axum::serve(listener, api::router(api::AppState::new(app.orchestrator.clone())))
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.notified().await }
        })
        .into_future();
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => result?,
        signal = wait_for_shutdown() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                grace_secs = app.config.server.graceful_shutdown_secs,
                "draining in-flight requests"
            );
            shutdown.notify_one();
            let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
            match tokio::time::timeout(grace, &mut serve).await {
                Ok(result) => result?,
                Err(_) => tracing::warn!(
                    event_name = "system.server.drain_timeout",
                    correlation_id = "shutdown",
                    "in-flight requests did not finish before the grace period"
                ),
            }
        }
    }

    app.sweeper.stop().await;
    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "vaulta-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
