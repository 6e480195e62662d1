// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: a dispatch chat must
//! be set, timings must be positive, and menus must be priced.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{DormbiteConfig, RunMode};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &DormbiteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.telegram.bot_token.as_deref().is_none_or(|t| t.trim().is_empty()) {
        fail("telegram.bot_token must be set (or TELEGRAM_TOKEN exported)".to_string());
    }

    if config.bot.run_mode == RunMode::Webhook {
        match config.telegram.webhook_url.as_deref() {
            None | Some("") => fail("telegram.webhook_url is required in webhook mode".to_string()),
            Some(url) if !url.starts_with("https://") => {
                fail(format!("telegram.webhook_url must be https, got `{url}`"))
            }
            Some(_) => {}
        }
        if config.telegram.webhook_listen.parse::<std::net::SocketAddr>().is_err() {
            fail(format!(
                "telegram.webhook_listen `{}` is not a socket address",
                config.telegram.webhook_listen
            ));
        }
    }

    if config.dispatch.chat_id == 0 {
        fail("dispatch.chat_id must be set to the dispatcher chat".to_string());
    }

    let d = &config.dispatch;
    if d.delivery_fee_per_item < 0.0 {
        fail(format!(
            "dispatch.delivery_fee_per_item must be non-negative, got {}",
            d.delivery_fee_per_item
        ));
    }
    if d.arrival_radius_m <= 0.0 {
        fail(format!(
            "dispatch.arrival_radius_m must be positive, got {}",
            d.arrival_radius_m
        ));
    }
    for (name, value) in [
        ("relay_interval_secs", d.relay_interval_secs),
        ("status_interval_secs", d.status_interval_secs),
        ("lingering_warning_secs", d.lingering_warning_secs),
    ] {
        if value == 0 {
            fail(format!("dispatch.{name} must be greater than zero"));
        }
    }
    if d.live_period_secs < 60 || d.live_period_secs > 86_400 {
        fail(format!(
            "dispatch.live_period_secs must be between 60 and 86400, got {}",
            d.live_period_secs
        ));
    }
    if d.phone_attempt_limit == 0 {
        fail("dispatch.phone_attempt_limit must be at least 1".to_string());
    }

    if config.payments.default_account.trim().is_empty() {
        fail("payments.default_account must not be empty".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.restaurants.is_empty() {
        fail("at least one [[restaurants]] entry is required".to_string());
    }
    let mut seen = HashSet::new();
    for restaurant in &config.restaurants {
        if !seen.insert(restaurant.name.as_str()) {
            fail(format!("duplicate restaurant `{}`", restaurant.name));
        }
        for item in &restaurant.menu {
            if item.price <= 0.0 {
                fail(format!(
                    "restaurant `{}` item `{}` must have a positive price",
                    restaurant.name, item.name
                ));
            }
        }
    }

    let mut blocks = HashSet::new();
    for block in &config.campus.blocks {
        if !blocks.insert(block.name.as_str()) {
            fail(format!("duplicate campus block `{}`", block.name));
        }
    }
    for area in &config.campus.special_areas {
        if area.blocks.is_empty() {
            fail(format!("special area `{}` lists no blocks", area.name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
