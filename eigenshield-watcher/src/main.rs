use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod executor;
mod matcher;
mod poller;

use config::{Cli, Settings};
use poller::Watcher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let settings = Settings::try_from(cli).context("invalid watcher configuration")?;
    let http = Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .context("failed building http client")?;

    info!(
        digests = settings.policy.digest_count(),
        measurements = settings.policy.measurement_count(),
        on_submit_failure = ?settings.on_submit_failure,
        "loaded trust policy"
    );

    let mut watcher = Watcher::new(settings, http);
    match watcher.watcher_address() {
        Some(address) => info!(watcher = %address, "executor submission enabled"),
        None => info!("observer mode: executor submission disabled"),
    }

    let shutdown = Arc::new(Notify::new());
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    watcher.run(shutdown).await;
    Ok(())
}

async fn wait_for_shutdown(shutdown: Arc<Notify>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
        }
    }
    info!("shutdown signal received");
    shutdown.notify_one();
}
