// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine flows.
//!
//! `TestHarness` wires an [`Engine`] to a temp SQLite store and a
//! [`MockMessenger`], with a manual clock so throttles can be exercised
//! without sleeping.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use dormbite_config::DormbiteConfig;
use dormbite_config::model::StorageConfig;
use dormbite_core::types::{
    ChatId, EventKind, FileRef, GeoPoint, InboundEvent, Language, OrderId, RegistrationRecord,
    Sender, UserId,
};
use dormbite_core::{DormbiteError, Store};
use dormbite_engine::{Ack, Engine, ordering};
use dormbite_storage::SqliteStore;

use crate::mock_messenger::{MockMessenger, Outbound};

/// Chat id used as the dispatch chat in every harness.
pub const DISPATCH_CHAT: ChatId = ChatId(-100_200);

/// Where harness customers live; close to the default block coordinates.
pub const DORM: GeoPoint = GeoPoint {
    lat: 6.0653,
    lon: 37.5601,
};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: DormbiteConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = DormbiteConfig::default();
        config.dispatch.chat_id = DISPATCH_CHAT.0;
        Self { config }
    }

    /// Adjust the configuration before the engine is built.
    pub fn with_config(mut self, edit: impl FnOnce(&mut DormbiteConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Build the harness, creating the temp database.
    pub async fn build(self) -> Result<TestHarness, DormbiteError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| DormbiteError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let store = SqliteStore::new(StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        });
        store.initialize().await?;
        let store = Arc::new(store);
        let messenger = Arc::new(MockMessenger::new());
        let config = Arc::new(self.config);
        let engine = Arc::new(Engine::new(
            store.clone(),
            messenger.clone(),
            config.clone(),
        ));

        Ok(TestHarness {
            engine,
            messenger,
            store,
            config,
            clock: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().unwrap_or_else(Utc::now)),
            next_callback: Mutex::new(0),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine with mock messenger and temp storage.
pub struct TestHarness {
    pub engine: Arc<Engine>,
    pub messenger: Arc<MockMessenger>,
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    pub config: Arc<DormbiteConfig>,
    clock: Mutex<DateTime<Utc>>,
    next_callback: Mutex<u64>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn new() -> Result<Self, DormbiteError> {
        Self::builder().build().await
    }

    /// Current harness time, stamped on every injected event.
    pub fn now(&self) -> DateTime<Utc> {
        *self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn advance(&self, secs: i64) {
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        *clock += Duration::seconds(secs);
    }

    pub fn sender(id: UserId) -> Sender {
        Sender {
            id,
            handle: Some(format!("user{}", id.0)),
            display_name: format!("User {}", id.0),
        }
    }

    /// Feeds one event from `user` in `chat` through the engine.
    pub async fn inject(&self, chat: ChatId, user: UserId, kind: EventKind) {
        self.engine
            .handle(InboundEvent {
                chat,
                sender: Self::sender(user),
                kind,
                at: self.now(),
            })
            .await;
    }

    /// Plain text in the user's private chat.
    pub async fn text(&self, user: UserId, text: &str) {
        self.inject(user.chat(), user, EventKind::Text(text.to_string()))
            .await;
    }

    pub async fn command(&self, chat: ChatId, user: UserId, name: &str, args: &str) {
        self.inject(
            chat,
            user,
            EventKind::Command {
                name: name.to_string(),
                args: args.to_string(),
            },
        )
        .await;
    }

    /// A live-location update, as an edit of an ongoing share.
    pub async fn live_location(&self, chat: ChatId, user: UserId, point: GeoPoint) {
        self.inject(
            chat,
            user,
            EventKind::Location {
                point,
                live: true,
                edited: true,
            },
        )
        .await;
    }

    pub async fn photo(&self, chat: ChatId, user: UserId, file: &str, reply_to: Option<i32>) {
        self.inject(
            chat,
            user,
            EventKind::Photo {
                file: FileRef(file.to_string()),
                reply_to,
            },
        )
        .await;
    }

    /// Presses a button and returns how the engine answered it.
    pub async fn press(&self, chat: ChatId, user: UserId, token: &str) -> Ack {
        let id = {
            let mut next = self.next_callback.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            format!("cb-{}", *next)
        };
        self.inject(
            chat,
            user,
            EventKind::Callback {
                id: id.clone(),
                data: token.to_string(),
                message: None,
            },
        )
        .await;
        self.messenger
            .outbound()
            .await
            .into_iter()
            .rev()
            .find_map(|o| match o {
                Outbound::Answer {
                    callback_id,
                    text,
                    alert,
                } if callback_id == id => Some(Ack { text, alert }),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Stores a registered customer living in "Block 1".
    pub async fn register(&self, user: UserId, name: &str) -> Result<(), DormbiteError> {
        self.store
            .upsert_customer(&RegistrationRecord {
                id: user,
                name: name.to_string(),
                handle: Some(format!("user{}", user.0)),
                institutional_id: format!("nsr/{:04}/16", user.0 % 10_000),
                block: "Block 1".to_string(),
                dorm: "12".to_string(),
                phone: "0911223344".to_string(),
                language: Language::English,
                gender: None,
                location: Some(DORM),
            })
            .await?;
        Ok(())
    }

    /// Walks `user` through the cart for one Firfir delivered to their dorm.
    /// Returns the new order id.
    pub async fn place_order(&self, user: UserId) -> Result<OrderId, DormbiteError> {
        let before = self.store.active_orders_for(user).await?;
        self.command(user.chat(), user, "order", "").await;
        self.text(user, "Fle").await;
        self.text(user, "Firfir - 70 ETB").await;
        self.text(user, ordering::DONE).await;
        self.text(user, ordering::MY_DORM).await;
        self.store
            .active_orders_for(user)
            .await?
            .into_iter()
            .find(|id| !before.contains(id))
            .ok_or_else(|| DormbiteError::Internal("order was not placed".to_string()))
    }
}
