//! hearthbot - IRC card lookup bot
//!
//! Answers `!card <name>` commands, `[name]` inline triggers and, optionally,
//! bare card names in chat with the card's text, matched fuzzily against a
//! catalog extracted from the game's asset bundle.

mod bot;
mod cards;
mod config;
mod error;
mod flow_rate;
mod matcher;
mod router;

use crate::bot::Bot;
use crate::cards::{AssetSource, Catalog, CatalogWatcher};
use crate::config::Config;
use crate::flow_rate::FlowRateLimiter;
use crate::router::{Router, RouterSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Longest we wait for QUIT to reach the server on shutdown.
const QUIT_BOUND: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        host = %config.irc.host,
        port = config.irc.port,
        nick = %config.irc.nick,
        "Starting hearthbot"
    );

    let cancel = CancellationToken::new();

    // Initial catalog load. A locked bundle is waited out; one without cards
    // is a startup failure.
    let catalog = Arc::new(Catalog::new());
    let watcher = CatalogWatcher::new(
        Arc::clone(&catalog),
        AssetSource::new(config.cards.source.clone()),
        config.cards.language.clone(),
        Duration::from_secs(config.cards.reload_poll_seconds),
        Duration::from_secs(config.cards.retry_delay_seconds),
    );
    let loaded = tokio::select! {
        result = watcher.reload_with_retry(&cancel) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted during startup");
            return Ok(());
        }
    };
    let names = loaded.map_err(|e| {
        error!(
            path = %config.cards.source.display(),
            code = e.error_code(),
            error = %e,
            "Failed to load card catalog"
        );
        e
    })?;
    info!(names, language = %config.cards.language, "Card catalog ready");

    let watcher_task = watcher.spawn(cancel.clone());
    info!("Card source watcher started");

    let limiter = Arc::new(FlowRateLimiter::from_config(&config.flow_rate));
    let sweeper_task = Arc::clone(&limiter).spawn_sweeper(cancel.clone());
    info!(
        max = config.flow_rate.max_messages,
        decay_secs = config.flow_rate.decay_seconds,
        "Flow rate limiter started"
    );

    let settings = RouterSettings::from_config(&config)?;
    let router = Arc::new(Router::new(catalog, limiter, settings));
    let bot = Arc::new(Bot::new(config.irc.clone(), router));

    let supervisor = {
        let bot = Arc::clone(&bot);
        let cancel = cancel.clone();
        tokio::spawn(async move { bot.run(cancel).await })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");

    bot.quit(QUIT_BOUND).await;
    cancel.cancel();
    for task in [supervisor, watcher_task, sweeper_task] {
        if let Err(e) = task.await {
            error!(error = %e, "Background task failed");
        }
    }

    info!("Stopped");
    Ok(())
}
