// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Dormbite delivery bot.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use dormbite_core::GeoPoint;
use serde::{Deserialize, Serialize};

/// Top-level Dormbite configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// Every section defaults to something runnable except the bot token and dispatch chat.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DormbiteConfig {
    /// Process identity and run mode.
    #[serde(default)]
    pub bot: BotConfig,

    /// Telegram Bot API settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Dispatcher channel and the timing knobs of the delivery handshake.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Settlement accounts customers pay into.
    #[serde(default)]
    pub payments: PaymentsConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Restaurants and their menus.
    #[serde(default = "default_restaurants")]
    pub restaurants: Vec<RestaurantConfig>,

    /// Residence blocks offered during registration.
    #[serde(default)]
    pub campus: CampusConfig,
}

impl Default for DormbiteConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            telegram: TelegramConfig::default(),
            dispatch: DispatchConfig::default(),
            payments: PaymentsConfig::default(),
            storage: StorageConfig::default(),
            restaurants: default_restaurants(),
            campus: CampusConfig::default(),
        }
    }
}

impl DormbiteConfig {
    /// Looks up a restaurant by exact name.
    pub fn restaurant(&self, name: &str) -> Option<&RestaurantConfig> {
        self.restaurants.iter().find(|r| r.name == name)
    }
}

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Long-poll the Bot API.
    #[default]
    Polling,
    /// Receive updates on an HTTPS webhook.
    Webhook,
}

/// Process identity and run mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Name used in logs and the completed-orders channel.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Long-poll or webhook.
    #[serde(default)]
    pub run_mode: RunMode,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
            run_mode: RunMode::default(),
        }
    }
}

fn default_bot_name() -> String {
    "dormbite".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram Bot API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Public HTTPS URL Telegram posts updates to in webhook mode.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Local socket address the webhook server binds to.
    #[serde(default = "default_webhook_listen")]
    pub webhook_listen: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            webhook_url: None,
            webhook_listen: default_webhook_listen(),
        }
    }
}

fn default_webhook_listen() -> String {
    "0.0.0.0:8443".to_string()
}

/// The shared dispatcher chat and handshake timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Chat id of the dispatcher channel shared by all deliverers.
    #[serde(default)]
    pub chat_id: i64,

    /// Channel that receives a summary of every completed order.
    #[serde(default)]
    pub completed_channel_id: Option<i64>,

    /// Delivery surcharge added once per cart item.
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee_per_item: f64,

    /// Currency label shown next to prices.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Distance under which the deliverer counts as arrived.
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius_m: f64,

    /// Minimum spacing of relay forwards per (chat, sender).
    #[serde(default = "default_relay_interval")]
    pub relay_interval_secs: u64,

    /// Minimum spacing of the dispatcher-facing customer status message.
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,

    /// Minimum spacing of the lingering live-location warning.
    #[serde(default = "default_lingering_warning")]
    pub lingering_warning_secs: u64,

    /// Registration and ordering drafts idle this long are discarded. 0 disables.
    #[serde(default = "default_idle_timeout")]
    pub conversation_idle_timeout_secs: u64,

    /// Live period of mirrored live-location messages.
    #[serde(default = "default_live_period")]
    pub live_period_secs: u32,

    /// Invalid phone submissions tolerated before registration restarts.
    #[serde(default = "default_phone_attempt_limit")]
    pub phone_attempt_limit: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            chat_id: 0,
            completed_channel_id: None,
            delivery_fee_per_item: default_delivery_fee(),
            currency: default_currency(),
            arrival_radius_m: default_arrival_radius(),
            relay_interval_secs: default_relay_interval(),
            status_interval_secs: default_status_interval(),
            lingering_warning_secs: default_lingering_warning(),
            conversation_idle_timeout_secs: default_idle_timeout(),
            live_period_secs: default_live_period(),
            phone_attempt_limit: default_phone_attempt_limit(),
        }
    }
}

fn default_delivery_fee() -> f64 {
    15.0
}

fn default_currency() -> String {
    "ETB".to_string()
}

fn default_arrival_radius() -> f64 {
    150.0
}

fn default_relay_interval() -> u64 {
    5
}

fn default_status_interval() -> u64 {
    20
}

fn default_lingering_warning() -> u64 {
    300
}

fn default_idle_timeout() -> u64 {
    1800
}

fn default_live_period() -> u32 {
    3600
}

fn default_phone_attempt_limit() -> u32 {
    5
}

/// Settlement accounts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentsConfig {
    /// Account used when the accepting deliverer has no entry in `accounts`.
    #[serde(default = "default_account")]
    pub default_account: String,

    /// Bank name shown with the account number.
    #[serde(default = "default_bank")]
    pub bank: String,

    /// Deliverer handle (without `@`) to account number.
    #[serde(default)]
    pub accounts: BTreeMap<String, String>,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            default_account: default_account(),
            bank: default_bank(),
            accounts: BTreeMap::new(),
        }
    }
}

fn default_account() -> String {
    "1000397137833".to_string()
}

fn default_bank() -> String {
    "CBE".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("dormbite").join("dormbite.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("dormbite.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// One restaurant customers can order from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RestaurantConfig {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Shown with a premium marker in the restaurant list.
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
}

impl RestaurantConfig {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    /// Display label used on the restaurant keyboard.
    pub fn label(&self) -> String {
        if self.premium {
            format!("{} (Premium)", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A priced menu entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MenuItem {
    pub name: String,
    pub price: f64,
}

const CAMPUS_GATE: (f64, f64) = (6.0653, 37.5601);

fn default_restaurants() -> Vec<RestaurantConfig> {
    let standard = || {
        vec![
            MenuItem { name: "Firfir".into(), price: 70.0 },
            MenuItem { name: "Shiro".into(), price: 50.0 },
            MenuItem { name: "Pasta".into(), price: 60.0 },
            MenuItem { name: "Egg Sandwich".into(), price: 45.0 },
        ]
    };
    let premium = || {
        vec![
            MenuItem { name: "Special Tibs".into(), price: 180.0 },
            MenuItem { name: "Burger".into(), price: 150.0 },
            MenuItem { name: "Club Sandwich".into(), price: 130.0 },
        ]
    };
    ["Fle", "Zebra", "Wesen", "Selam", "Webete", "Darek"]
        .into_iter()
        .map(|name| {
            let is_premium = matches!(name, "Webete" | "Darek");
            RestaurantConfig {
                name: name.to_string(),
                lat: CAMPUS_GATE.0,
                lon: CAMPUS_GATE.1,
                premium: is_premium,
                menu: if is_premium { premium() } else { standard() },
            }
        })
        .collect()
}

/// A residence block with known coordinates.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlockConfig {
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl BlockConfig {
    fn at_gate(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lat: Some(CAMPUS_GATE.0),
            lon: Some(CAMPUS_GATE.1),
        }
    }

    pub fn location(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.lat?, self.lon?))
    }
}

/// A residence area whose blocks are chosen in a second step.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpecialAreaConfig {
    pub name: String,
    /// Ask for gender before listing the blocks.
    #[serde(default)]
    pub gender_split: bool,
    pub blocks: Vec<String>,
}

/// Residence choices offered during registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CampusConfig {
    #[serde(default = "default_blocks")]
    pub blocks: Vec<BlockConfig>,

    #[serde(default = "default_special_areas")]
    pub special_areas: Vec<SpecialAreaConfig>,
}

impl Default for CampusConfig {
    fn default() -> Self {
        Self {
            blocks: default_blocks(),
            special_areas: default_special_areas(),
        }
    }
}

impl CampusConfig {
    pub fn block(&self, name: &str) -> Option<&BlockConfig> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn special_area(&self, name: &str) -> Option<&SpecialAreaConfig> {
        self.special_areas.iter().find(|a| a.name == name)
    }
}

fn default_blocks() -> Vec<BlockConfig> {
    ["Block 1", "Block 2", "Block 3"]
        .into_iter()
        .map(BlockConfig::at_gate)
        .collect()
}

fn default_special_areas() -> Vec<SpecialAreaConfig> {
    vec![
        SpecialAreaConfig {
            name: "NEWYORK".to_string(),
            gender_split: false,
            blocks: ["NY Block A", "NY Block B", "NY Block C"]
                .into_iter()
                .map(String::from)
                .collect(),
        },
        SpecialAreaConfig {
            name: "Around GC Building".to_string(),
            gender_split: true,
            blocks: [
                "Arctecture/ Civil block",
                "water_block",
                "mechanical_electrical_block",
                "2ND_comp/ 2ND_soft_block",
                "soft / comp GC_block",
                "unassigned",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        },
    ]
}
