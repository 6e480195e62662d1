// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dormbite reset-orders`: cancel in-flight orders while the bot is down.

use dormbite_config::DormbiteConfig;
use dormbite_core::Store;
use dormbite_core::error::DormbiteError;
use dormbite_storage::SqliteStore;

/// Cancels every pending or accepted order and reports how many there were.
pub async fn run_reset(config: DormbiteConfig) -> Result<(), DormbiteError> {
    let cancelled = reset_store(&config).await?;
    println!("dormbite: cancelled {cancelled} in-flight order(s)");
    Ok(())
}

async fn reset_store(config: &DormbiteConfig) -> Result<usize, DormbiteError> {
    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    let cancelled = store.reset_in_flight_orders().await;
    store.close().await?;
    cancelled
}
