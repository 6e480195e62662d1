// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Dormbite configuration system.

use dormbite_config::diagnostic::ConfigError;
use dormbite_config::model::RunMode;
use dormbite_config::{load_and_validate_str, load_config_from_str};

const MINIMAL: &str = r#"
[telegram]
bot_token = "123:ABC"

[dispatch]
chat_id = -100200300
"#;

/// A full file with every section deserializes with the given values.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[bot]
name = "campus-eats"
log_level = "debug"
run_mode = "webhook"

[telegram]
bot_token = "123:ABC"
webhook_url = "https://eats.example/hook"
webhook_listen = "127.0.0.1:9000"

[dispatch]
chat_id = -100200300
completed_channel_id = -100999
delivery_fee_per_item = 20.0
arrival_radius_m = 120.0

[payments]
default_account = "1000111"
bank = "Awash"

[payments.accounts]
abebe_d = "1000222"

[storage]
database_path = "/tmp/eats.db"
wal_mode = false

[[restaurants]]
name = "Fle"
lat = 6.0
lon = 37.0
menu = [{ name = "Firfir", price = 70.0 }, { name = "Shiro", price = 50.0 }]

[campus]
blocks = [{ name = "Block 9", lat = 6.1, lon = 37.1 }]
special_areas = []
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.bot.name, "campus-eats");
    assert_eq!(config.bot.run_mode, RunMode::Webhook);
    assert_eq!(config.telegram.webhook_listen, "127.0.0.1:9000");
    assert_eq!(config.dispatch.completed_channel_id, Some(-100999));
    assert_eq!(config.dispatch.delivery_fee_per_item, 20.0);
    assert_eq!(config.payments.accounts.get("abebe_d").map(String::as_str), Some("1000222"));
    assert!(!config.storage.wal_mode);
    assert_eq!(config.restaurants.len(), 1);
    assert_eq!(config.restaurants[0].menu[1].price, 50.0);
    assert_eq!(config.campus.blocks[0].name, "Block 9");
    assert!(config.campus.special_areas.is_empty());
}

/// Minimal config keeps the built-in restaurants and campus.
#[test]
fn minimal_config_uses_defaults() {
    let config = load_and_validate_str(MINIMAL).expect("minimal config should load");
    assert_eq!(config.restaurants.len(), 6);
    assert_eq!(config.campus.blocks.len(), 3);
    assert_eq!(config.dispatch.status_interval_secs, 20);
    assert_eq!(config.payments.bank, "CBE");
}

/// Unknown key produces a diagnostic with a suggestion and a span.
#[test]
fn unknown_dispatch_key_suggests_fix() {
    let toml = r#"
[dispatch]
chat_id = -1
arival_radius_m = 100.0
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "arival_radius_m");
            assert_eq!(suggestion.as_deref(), Some("arrival_radius_m"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Wrong type is reported with the dotted key.
#[test]
fn wrong_type_reports_key() {
    let toml = r#"
[dispatch]
chat_id = "not-a-number"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject string chat id");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "dispatch.chat_id")),
        "got {errors:?}"
    );
}

/// Unknown run mode is rejected at parse time.
#[test]
fn unknown_run_mode_rejected() {
    let toml = r#"
[bot]
run_mode = "carrier-pigeon"
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// Validation errors are all reported at once.
#[test]
fn validation_collects_every_problem() {
    let toml = r#"
[dispatch]
relay_interval_secs = 0
phone_attempt_limit = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    // token, chat id, relay interval, phone limit
    assert_eq!(errors.len(), 4, "got {errors:?}");
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}
