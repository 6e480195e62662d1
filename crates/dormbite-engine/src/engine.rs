// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event router that owns all per-process delivery state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use dormbite_config::DormbiteConfig;
use dormbite_core::types::{
    ChatId, EventKind, GeoPoint, InboundEvent, Markup, MessageRef, OrderId, UserId,
};
use dormbite_core::{DormbiteError, Messenger, Store};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::callback::Action;
use crate::conversation::Conversation;
use crate::metrics;
use crate::session::OrderSession;
use crate::throttle::Throttle;

/// Reply to a button press. Every callback is answered exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub text: Option<String>,
    pub alert: bool,
}

impl Ack {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn toast(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            alert: false,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            alert: true,
        }
    }
}

/// Remembered dispatch-chat names before the map is reset.
const KNOWN_SENDERS_CAP: usize = 512;

/// A customer pin waiting for the dispatcher's verdict.
#[derive(Debug, Clone)]
pub(crate) struct PendingPin {
    pub customer: UserId,
    pub point: GeoPoint,
    pub prompt: Option<MessageRef>,
}

/// State shared by all handlers, serialized behind one lock.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub sessions: BTreeMap<OrderId, OrderSession>,
    pub pins: HashMap<u64, PendingPin>,
    pub next_pin: u64,
    /// Per-customer live-location message in the dispatch chat.
    pub dispatch_mirrors: HashMap<UserId, MessageRef>,
    /// Per-customer throttled status message in the dispatch chat.
    pub status_messages: HashMap<UserId, MessageRef>,
    /// Outstanding restart prompt.
    pub recovery_prompt: Option<MessageRef>,
}

impl EngineState {
    pub fn sessions_for_customer(&self, customer: UserId) -> impl Iterator<Item = &OrderSession> {
        self.sessions.values().filter(move |s| s.customer == customer)
    }

    /// Forgets the customer's unanswered pins, returning their prompts.
    pub fn drop_pins(&mut self, customer: UserId) -> Vec<MessageRef> {
        let stale: Vec<u64> = self
            .pins
            .iter()
            .filter(|(_, p)| p.customer == customer)
            .map(|(pin, _)| *pin)
            .collect();
        stale
            .into_iter()
            .filter_map(|pin| self.pins.remove(&pin))
            .filter_map(|p| p.prompt)
            .collect()
    }

    /// Drops every transient trace of a finished order.
    pub fn purge(&mut self, id: OrderId) -> Option<OrderSession> {
        let session = self.sessions.remove(&id)?;
        if self.sessions_for_customer(session.customer).next().is_none() {
            self.dispatch_mirrors.remove(&session.customer);
            self.status_messages.remove(&session.customer);
        }
        metrics::set_active_sessions(self.sessions.len());
        Some(session)
    }
}

/// Coordinates customers, deliverers and the dispatch chat.
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) config: Arc<DormbiteConfig>,
    pub(crate) dispatch_chat: ChatId,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) conversations: DashMap<UserId, Conversation>,
    /// Last seen display name per user, for naming claim winners.
    pub(crate) known_senders: DashMap<UserId, String>,
    pub(crate) relay_throttle: Throttle<(ChatId, UserId)>,
    pub(crate) status_throttle: Throttle<UserId>,
    pub(crate) lingering_throttle: Throttle<UserId>,
    pub(crate) test_mode: AtomicBool,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        config: Arc<DormbiteConfig>,
    ) -> Self {
        let dispatch = &config.dispatch;
        Self {
            dispatch_chat: ChatId(dispatch.chat_id),
            relay_throttle: Throttle::from_secs(dispatch.relay_interval_secs),
            status_throttle: Throttle::from_secs(dispatch.status_interval_secs),
            lingering_throttle: Throttle::from_secs(dispatch.lingering_warning_secs),
            store,
            messenger,
            config,
            state: Mutex::new(EngineState::default()),
            conversations: DashMap::new(),
            known_senders: DashMap::new(),
            test_mode: AtomicBool::new(false),
        }
    }

    pub fn dispatch_chat(&self) -> ChatId {
        self.dispatch_chat
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode.load(Ordering::Relaxed)
    }

    pub fn set_test_mode(&self, on: bool) {
        self.test_mode.store(on, Ordering::Relaxed);
    }

    /// Number of orders with a live session.
    pub async fn active_sessions(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Customer pins still waiting for a dispatcher verdict.
    pub async fn pending_pins(&self) -> usize {
        self.state.lock().await.pins.len()
    }

    /// Users whose display name is remembered for naming claim winners.
    pub fn known_sender_count(&self) -> usize {
        self.known_senders.len()
    }

    /// Stage label of an order's session, if one is live.
    pub async fn session_stage(&self, id: OrderId) -> Option<&'static str> {
        self.state.lock().await.sessions.get(&id).map(|s| s.stage.label())
    }

    /// Closes idle conversations every `period` until `cancel` fires.
    pub async fn run_idle_sweep(&self, period: std::time::Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("idle sweep stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let expired = self.expire_idle(Utc::now()).await;
                    if expired > 0 {
                        debug!(expired, "idle conversations closed");
                    }
                }
            }
        }
    }

    /// Handles one inbound event. Never fails: errors are logged and
    /// reported to the right audience.
    pub async fn handle(&self, event: InboundEvent) {
        if self.in_dispatch_chat(&event) {
            self.remember_sender(&event);
        }

        if let EventKind::Callback { id, data, .. } = &event.kind {
            let ack = match data.parse::<Action>() {
                Ok(action) => match self.on_action(&event, action).await {
                    Ok(ack) => ack,
                    Err(e) => self.report(&event, e).await,
                },
                Err(e) => {
                    debug!(error = %e, "ignoring callback");
                    Ack::silent()
                }
            };
            if let Err(e) = self
                .messenger
                .answer_callback(id, ack.text.as_deref(), ack.alert)
                .await
            {
                warn!(error = %e, "failed to answer callback");
            }
            return;
        }

        let result = match &event.kind {
            EventKind::Command { name, args } => self.on_command(&event, name, args).await,
            EventKind::Text(text) => self.on_text(&event, text).await,
            EventKind::Location {
                point,
                live,
                edited,
            } => self.on_location(&event, *point, *live, *edited).await,
            EventKind::Photo { file, reply_to } => self.on_photo(&event, file, *reply_to).await,
            EventKind::Callback { .. } => Ok(()),
        };
        if let Err(e) = result {
            let ack = self.report(&event, e).await;
            if let Some(text) = ack.text {
                self.send(event.chat, &text, None).await;
            }
        }
    }

    /// Logs an error and decides what the actor sees. Internal failures
    /// get a generic apology in the dispatch chat only.
    async fn report(&self, event: &InboundEvent, e: DormbiteError) -> Ack {
        if e.is_user_facing() {
            debug!(sender = %event.sender.id, error = %e, "rejected step");
            return Ack::alert(format!("⚠️ {e}"));
        }
        error!(sender = %event.sender.id, chat = %event.chat, error = %e, "failed to handle event");
        self.send(
            self.dispatch_chat,
            "⚠️ Sorry, something went wrong while handling an update. Details are in the logs.",
            None,
        )
        .await;
        Ack::silent()
    }

    /// Rejects an action visibly and records the attempt. `kind` is the
    /// metric label; `action` is the full description for logs and audit.
    pub(crate) async fn deny(
        &self,
        event: &InboundEvent,
        kind: &'static str,
        action: &str,
    ) -> Ack {
        warn!(
            actor = %event.sender.id,
            chat = %event.chat,
            action,
            "unauthorized action"
        );
        metrics::record_unauthorized(kind);
        if let Err(e) = self
            .store
            .log_suspicious_access(event.sender.id, event.chat, action)
            .await
        {
            warn!(error = %e, "failed to record suspicious access");
        }
        Ack::alert("⛔ Not authorized")
    }

    /// Best-effort send: failures are logged and swallowed.
    pub(crate) async fn send(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Option<MessageRef> {
        match self.messenger.send_text(chat, text, markup).await {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(chat = %chat, error = %e, "failed to send message");
                None
            }
        }
    }

    /// Best-effort edit: failures are logged and swallowed.
    pub(crate) async fn edit(&self, message: MessageRef, text: &str, markup: Option<Markup>) {
        if let Err(e) = self.messenger.edit_text(message, text, markup).await {
            warn!(chat = %message.chat, message_id = message.message_id, error = %e, "failed to edit message");
        }
    }

    pub(crate) async fn delete(&self, message: MessageRef) {
        if let Err(e) = self.messenger.delete_message(message).await {
            debug!(chat = %message.chat, error = %e, "failed to delete message");
        }
    }

    /// Moves a live-location message, sending a fresh one when the old one
    /// can no longer be edited. Returns the message now showing the point.
    pub(crate) async fn show_live_location(
        &self,
        chat: ChatId,
        existing: Option<MessageRef>,
        point: GeoPoint,
    ) -> Option<MessageRef> {
        if let Some(message) = existing {
            match self.messenger.edit_live_location(message, point).await {
                Ok(()) => return Some(message),
                Err(e) => debug!(chat = %chat, error = %e, "live location edit failed, resending"),
            }
        }
        match self
            .messenger
            .send_location(chat, point, Some(self.config.dispatch.live_period_secs))
            .await
        {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(chat = %chat, error = %e, "failed to send live location");
                None
            }
        }
    }

    /// Deliverers act in the dispatch chat, so only its members are kept.
    fn remember_sender(&self, event: &InboundEvent) {
        if self.known_senders.len() >= KNOWN_SENDERS_CAP
            && !self.known_senders.contains_key(&event.sender.id)
        {
            self.known_senders.clear();
        }
        self.known_senders
            .insert(event.sender.id, event.sender.display_name.clone());
    }

    /// Best available name for a user: registered name, last seen name, or id.
    pub(crate) async fn describe_user(&self, id: UserId) -> String {
        match self.store.get_customer(id).await {
            Ok(Some(customer)) => return customer.display(),
            Ok(None) => {}
            Err(e) => warn!(user = %id, error = %e, "customer lookup failed"),
        }
        self.known_senders
            .get(&id)
            .map(|name| name.value().clone())
            .unwrap_or_else(|| format!("user {id}"))
    }

    pub(crate) fn in_dispatch_chat(&self, event: &InboundEvent) -> bool {
        event.chat == self.dispatch_chat
    }

    pub(crate) fn is_private(&self, event: &InboundEvent) -> bool {
        event.chat == event.sender.id.chat()
    }
}
