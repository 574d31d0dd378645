use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::watch;

use ping_sentry::config::{Config, LoggingConfig};
use ping_sentry::health;
use ping_sentry::notify::TelegramSink;
use ping_sentry::source;
use ping_sentry::supervisor::Supervisor;

/// Log history survives restarts; rotation is left to the host.
fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match &logging.file {
        Some(path) => {
            let log_file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false)
                .json()
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure .env sets TELEGRAM_TOKEN and TELEGRAM_CHAT_ID");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging)?;

    tracing::info!(
        source = ?config.feed.source,
        interval = %config.market.kline_interval,
        min_pings = config.feed.min_pings,
        poll_secs = config.feed.poll_interval_secs,
        "Starting ping-sentry"
    );

    let feed = source::from_config(&config).context("failed to build feed source")?;
    let sink = Arc::new(
        TelegramSink::from_config(&config.notify, &config.feed)
            .context("failed to build Telegram sink")?,
    );
    let mut supervisor = Supervisor::new(&config, feed, sink);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    let health_task = if config.health.enabled {
        let bind = config.health.bind.clone();
        let status = supervisor.subscribe();
        let shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = health::serve(&bind, status, shutdown).await {
                tracing::error!(bind = %bind, error = %e, "Health endpoint failed");
            }
        }))
    } else {
        None
    };

    let termination = supervisor.run(shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    if let Some(task) = health_task {
        task.await.ok();
    }

    if termination.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
