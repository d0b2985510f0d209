use anyhow::{Context, Result};
use lookout::api::{create_router, AppState};
use lookout::config::{config_path, load_or_default};
use lookout::process::{LifecycleRequest, ProcessControl};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lookout=info".into()),
        )
        .init();

    info!("Lookout starting...");

    loop {
        match run().await? {
            LifecycleRequest::Restart => info!("Restarting"),
            LifecycleRequest::Shutdown => break,
        }
    }

    info!("Lookout stopped");
    Ok(())
}

/// Serve until a lifecycle request arrives; returns which one.
async fn run() -> Result<LifecycleRequest> {
    let path = config_path();
    let config = load_or_default(&path)
        .with_context(|| format!("Failed to load configuration from {}", path))?
        .with_env_overrides();

    info!(
        config = %path,
        bind = %config.server.bind,
        subscriber_buffer = config.events.subscriber_buffer,
        overflow = ?config.events.overflow,
        reconfigure = ?config.events.reconfigure,
        "Configuration loaded"
    );

    let process = ProcessControl::new();
    let state = Arc::new(AppState::from_config(&config, process.clone()));
    let reaper = state.queues.spawn_reaper(config.events.reaper_interval());

    // Ctrl-C is turned into a shutdown request
    let ctrl_c = {
        let process = process.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    process.request_shutdown();
                }
                Err(e) => warn!(error = %e, "Failed to listen for ctrl_c signal"),
            }
        })
    };

    let router = create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "API listening");

    let shutdown = {
        let process = process.clone();
        async move {
            let request = process.requested().await;
            info!(request = %request, "Draining connections");
        }
    };
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    reaper.abort();
    ctrl_c.abort();

    Ok(process.pending().unwrap_or(LifecycleRequest::Shutdown))
}
