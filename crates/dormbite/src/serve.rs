// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dormbite serve` command implementation.
//!
//! Opens the SQLite store, connects the Telegram messenger, offers restart
//! recovery to the dispatch chat, and runs the update loop next to the idle
//! conversation sweep until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use dormbite_config::DormbiteConfig;
use dormbite_core::error::DormbiteError;
use dormbite_core::{HealthStatus, PluginAdapter};
use dormbite_engine::{Engine, register_metrics};
use dormbite_storage::SqliteStore;
use dormbite_telegram::TelegramMessenger;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// How often abandoned registrations and carts are looked for.
const IDLE_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Runs the `dormbite serve` command.
pub async fn run_serve(config: DormbiteConfig) -> Result<(), DormbiteError> {
    init_tracing(&config.bot.log_level);
    register_metrics();

    info!(
        name = %config.bot.name,
        dispatch_chat = config.dispatch.chat_id,
        mode = ?config.bot.run_mode,
        "starting dormbite serve"
    );

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;

    let messenger = Arc::new(TelegramMessenger::new(&config.telegram)?);
    match messenger.health_check().await? {
        HealthStatus::Healthy => debug!("Telegram bot reachable"),
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            warn!(%reason, "Telegram health check failed, continuing")
        }
    }

    let config = Arc::new(config);
    let engine = Arc::new(Engine::new(
        store.clone(),
        messenger.clone(),
        config.clone(),
    ));

    match engine.announce_restart().await {
        Ok(0) => debug!("no in-flight orders to recover"),
        Ok(count) => info!(count, "asked dispatch whether to resume in-flight orders"),
        Err(e) => warn!(error = %e, "failed to announce restart"),
    }

    let cancel = shutdown::install_signal_handler();

    let sweep = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run_idle_sweep(IDLE_SWEEP_PERIOD, cancel).await })
    };

    let result = dormbite_telegram::run(
        messenger.bot().clone(),
        engine,
        &config.telegram,
        config.bot.run_mode,
        cancel.clone(),
    )
    .await;
    if let Err(e) = &result {
        error!(error = %e, "update loop failed");
    }

    cancel.cancel();
    if let Err(e) = sweep.await {
        warn!(error = %e, "idle sweep task ended abnormally");
    }

    messenger.shutdown().await?;
    store.close().await?;
    info!("dormbite stopped");
    result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dormbite={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
