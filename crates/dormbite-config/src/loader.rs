// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Files are looked up in `/etc/dormbite/dormbite.toml`, the XDG config dir, and
//! `./dormbite.toml`; `DORMBITE_*` variables and the legacy deployment
//! variables override them.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DormbiteConfig;

/// Config file name searched in every directory of the hierarchy.
pub const CONFIG_FILE: &str = "dormbite.toml";

/// Sections whose env var prefix is split off with a single dot.
const SECTIONS: &[&str] = &["bot", "telegram", "dispatch", "payments", "storage", "campus"];

/// The config file candidates in merge order (lowest precedence first).
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/dormbite").join(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("dormbite").join(CONFIG_FILE));
    }
    paths.push(PathBuf::from(CONFIG_FILE));
    paths
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. Each file from [`config_paths`]
/// 3. `TELEGRAM_TOKEN`, `ADMIN_CHAT_ID`, `COMPLETED_ORDERS_CHANNEL_ID`
/// 4. `DORMBITE_*` environment variables
pub fn load_config() -> Result<DormbiteConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DormbiteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DormbiteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DormbiteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DormbiteConfig::default()))
        .merge(Toml::file(path))
        .merge(legacy_env_provider())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(DormbiteConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(legacy_env_provider()).merge(env_provider())
}

/// `DORMBITE_<SECTION>_<KEY>` maps to `<section>.<key>`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `DORMBITE_DISPATCH_ARRIVAL_RADIUS_M` is `dispatch.arrival_radius_m`.
fn env_provider() -> Env {
    Env::prefixed("DORMBITE_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        for section in SECTIONS {
            if let Some(rest) = key_str.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.into()
    })
}

/// The variable names older deployments of the bot were configured with.
fn legacy_env_provider() -> Env {
    Env::raw()
        .only(&["TELEGRAM_TOKEN", "ADMIN_CHAT_ID", "COMPLETED_ORDERS_CHANNEL_ID"])
        .map(|key| match key.as_str().to_ascii_lowercase().as_str() {
            "telegram_token" => "telegram.bot_token".into(),
            "admin_chat_id" => "dispatch.chat_id".into(),
            "completed_orders_channel_id" => "dispatch.completed_channel_id".into(),
            other => other.to_string().into(),
        })
}
