// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer-side conversations: registration and the ordering cart, from
//! first prompt to order placement.

use chrono::{DateTime, Duration, Utc};
use dormbite_core::DormbiteError;
use dormbite_core::types::{
    Button, ContractPaymentOutcome, Customer, GeoPoint, InboundEvent, Markup, OrderId, OrderType,
    UserId,
};
use tracing::{debug, info, warn};

use crate::callback::Action;
use crate::engine::{Ack, Engine, PendingPin};
use crate::metrics;
use crate::ordering::{self, DraftReply, DraftStep, OrderDraft};
use crate::registration::{Registration, RegistrationReply};
use crate::session::OrderSession;

const CREDIT_LIMIT_REACHED: &str = "❌ Your contract balance is used up and both \
     credit meals are taken. Please top up before ordering on contract.";

#[derive(Debug, Clone)]
pub enum Flow {
    Registration(Registration),
    Ordering(OrderDraft),
}

/// An open conversation with the time of its last input.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub flow: Flow,
    pub touched: DateTime<Utc>,
}

impl Conversation {
    fn new(flow: Flow, at: DateTime<Utc>) -> Self {
        Self { flow, touched: at }
    }
}

impl Engine {
    /// Starts registration for the sender, replacing any open conversation.
    pub(crate) async fn start_registration(&self, event: &InboundEvent) {
        let (reg, reply) = Registration::start(event.sender.id, event.sender.handle.clone());
        self.conversations.insert(
            event.sender.id,
            Conversation::new(Flow::Registration(reg), event.at),
        );
        if let RegistrationReply::Prompt { text, markup } = reply {
            self.send(event.chat, &text, Some(markup)).await;
        }
    }

    /// Starts the cart for a registered, unbanned customer.
    pub(crate) async fn start_ordering(&self, event: &InboundEvent) -> Result<(), DormbiteError> {
        let customer = self.store.get_customer(event.sender.id).await?;
        match customer {
            None => {
                self.send(
                    event.chat,
                    "❌ Access denied.\nYou must register before ordering. Type /start to begin your registration.",
                    None,
                )
                .await;
            }
            Some(c) if c.is_banned => {
                self.send(event.chat, "🚫 Your account is banned from ordering.", None)
                    .await;
            }
            Some(_) => {
                let (draft, reply) = OrderDraft::new(event.sender.id, &self.config);
                self.conversations.insert(
                    event.sender.id,
                    Conversation::new(Flow::Ordering(draft), event.at),
                );
                self.send_draft_reply(event, reply).await;
            }
        }
        Ok(())
    }

    pub(crate) async fn on_text(
        &self,
        event: &InboundEvent,
        text: &str,
    ) -> Result<(), DormbiteError> {
        if !self.is_private(event) {
            return Ok(());
        }
        // Taken out of the map so no shard lock is held across awaits.
        let Some((user, mut conversation)) = self.conversations.remove(&event.sender.id) else {
            self.send(
                event.chat,
                "Send /order to place an order or /start to register.",
                None,
            )
            .await;
            return Ok(());
        };
        conversation.touched = event.at;

        let keep = match &mut conversation.flow {
            Flow::Registration(reg) => {
                let reply = reg.handle(
                    text,
                    &self.config.campus,
                    self.config.dispatch.phone_attempt_limit,
                );
                self.on_registration_reply(event, reply).await?
            }
            Flow::Ordering(draft) => {
                let reply = draft.handle_text(text, &self.config);
                self.on_draft_reply(event, draft, reply).await?
            }
        };
        if keep {
            self.conversations.insert(user, conversation);
        }
        Ok(())
    }

    /// Returns true when the conversation stays open.
    async fn on_registration_reply(
        &self,
        event: &InboundEvent,
        reply: RegistrationReply,
    ) -> Result<bool, DormbiteError> {
        match reply {
            RegistrationReply::Prompt { text, markup } => {
                self.send(event.chat, &text, Some(markup)).await;
                Ok(true)
            }
            RegistrationReply::Reset { text } => {
                info!(user = %event.sender.id, "registration reset after repeated invalid phone numbers");
                self.send(event.chat, &text, Some(Markup::RemoveKeyboard))
                    .await;
                Ok(false)
            }
            RegistrationReply::Complete(record) => {
                let changes = self.store.upsert_customer(&record).await?;
                info!(user = %record.id, created = changes.created, "registration complete");
                if !changes.changed.is_empty() {
                    let lines: Vec<String> = changes
                        .changed
                        .iter()
                        .map(|c| format!("{}: {} → {}", c.field, c.old, c.new))
                        .collect();
                    self.send(
                        self.dispatch_chat,
                        &format!(
                            "ℹ️ {} (ID: {}) updated their registration:\n{}",
                            record.name,
                            record.id,
                            lines.join("\n")
                        ),
                        None,
                    )
                    .await;
                }
                self.send(
                    event.chat,
                    "✅ Registration complete! You can now place your /order.",
                    Some(Markup::RemoveKeyboard),
                )
                .await;
                Ok(false)
            }
        }
    }

    async fn send_draft_reply(&self, event: &InboundEvent, reply: DraftReply) {
        if let DraftReply::Prompt { text, markup } = reply {
            self.send(event.chat, &text, Some(markup)).await;
        }
    }

    /// Returns true when the cart stays open.
    async fn on_draft_reply(
        &self,
        event: &InboundEvent,
        draft: &mut OrderDraft,
        reply: DraftReply,
    ) -> Result<bool, DormbiteError> {
        match reply {
            DraftReply::Prompt { text, markup } => {
                self.send(event.chat, &text, Some(markup)).await;
                Ok(true)
            }
            DraftReply::Cancelled { text } => {
                self.send(event.chat, &text, Some(Markup::RemoveKeyboard))
                    .await;
                Ok(false)
            }
            DraftReply::RestaurantChosen(name) => {
                let Some(restaurant) = self.config.restaurant(&name) else {
                    return Ok(true);
                };
                let sold_out = self.store.unavailable_items(&name).await?;
                let has_contract = self
                    .store
                    .get_contract(event.sender.id, &name)
                    .await?
                    .is_some();
                match draft.select_restaurant(
                    restaurant,
                    &sold_out,
                    has_contract,
                    &self.config.dispatch.currency,
                ) {
                    DraftReply::Prompt { text, markup } => {
                        self.send(event.chat, &text, Some(markup)).await;
                        Ok(true)
                    }
                    DraftReply::Cancelled { text } => {
                        self.send(event.chat, &text, Some(Markup::RemoveKeyboard))
                            .await;
                        Ok(false)
                    }
                    _ => Ok(true),
                }
            }
            DraftReply::PlaceAtDorm => {
                let customer = self
                    .store
                    .get_customer(event.sender.id)
                    .await?
                    .ok_or(DormbiteError::CustomerNotFound(event.sender.id))?;
                let delivery = dorm_location(&self.config, &customer);
                self.place_order(draft, &customer, delivery).await?;
                Ok(false)
            }
            DraftReply::VerifyPin(point) => {
                self.submit_pin(event, draft, point).await;
                Ok(true)
            }
        }
    }

    /// A location shared while the cart waits for a delivery point.
    /// Returns true when the cart consumed it.
    pub(crate) async fn offer_location_to_cart(
        &self,
        event: &InboundEvent,
        point: GeoPoint,
    ) -> bool {
        let Some((user, mut conversation)) = self.conversations.remove(&event.sender.id) else {
            return false;
        };
        let consumed = match &mut conversation.flow {
            Flow::Ordering(draft) => match draft.handle_location(point) {
                Some(DraftReply::VerifyPin(point)) => {
                    conversation.touched = event.at;
                    self.submit_pin(event, draft, point).await;
                    true
                }
                _ => false,
            },
            Flow::Registration(_) => false,
        };
        self.conversations.insert(user, conversation);
        consumed
    }

    async fn submit_pin(&self, event: &InboundEvent, draft: &mut OrderDraft, point: GeoPoint) {
        let pin = {
            let mut state = self.state.lock().await;
            state.drop_pins(event.sender.id);
            state.next_pin += 1;
            let pin = state.next_pin;
            state.pins.insert(
                pin,
                PendingPin {
                    customer: event.sender.id,
                    point,
                    prompt: None,
                },
            );
            pin
        };
        draft.await_pin(pin);
        self.send(
            event.chat,
            "📍 Location uploaded! Waiting for dispatcher verification...",
            Some(Markup::RemoveKeyboard),
        )
        .await;

        if let Err(e) = self
            .messenger
            .send_location(self.dispatch_chat, point, None)
            .await
        {
            warn!(error = %e, "failed to show pin to dispatch");
        }
        let name = self.describe_user(event.sender.id).await;
        let markup = Markup::Inline(vec![vec![
            Button::new("Accept", Action::PinAccept(pin).to_string()),
            Button::new("Reject", Action::PinReject(pin).to_string()),
        ]]);
        let prompt = self
            .send(
                self.dispatch_chat,
                &format!(
                    "{name} (ID: {}) uploaded a location for their order. Accept this location?",
                    event.sender.id
                ),
                Some(markup),
            )
            .await;
        if let Some(p) = self.state.lock().await.pins.get_mut(&pin) {
            p.prompt = prompt;
        }
    }

    /// Dispatcher verdict on a customer pin.
    pub(crate) async fn on_pin_verdict(
        &self,
        pin: u64,
        accepted: bool,
    ) -> Result<Ack, DormbiteError> {
        let Some(pending) = self.state.lock().await.pins.remove(&pin) else {
            return Ok(Ack::toast("This location was already handled."));
        };
        let Some((user, mut conversation)) = self.conversations.remove(&pending.customer) else {
            return Ok(Ack::alert("The customer's order is no longer open."));
        };
        let Flow::Ordering(draft) = &mut conversation.flow else {
            self.conversations.insert(user, conversation);
            return Ok(Ack::alert("The customer's order is no longer open."));
        };
        if draft.step() != (DraftStep::AwaitingPin { pin }) {
            self.conversations.insert(user, conversation);
            return Ok(Ack::alert("The customer's order is no longer open."));
        }

        let verdict = if accepted { "accepted" } else { "rejected" };
        if let Some(prompt) = pending.prompt {
            self.edit(
                prompt,
                &format!("Location for user {} {verdict}.", pending.customer),
                None,
            )
            .await;
        }

        if !accepted {
            if let DraftReply::Prompt { text, markup } = draft.reject_pin() {
                self.send(pending.customer.chat(), &text, Some(markup)).await;
            }
            self.conversations.insert(user, conversation);
            return Ok(Ack::toast("Location rejected"));
        }

        let customer = self
            .store
            .get_customer(pending.customer)
            .await?
            .ok_or(DormbiteError::CustomerNotFound(pending.customer))?;
        self.send(
            pending.customer.chat(),
            "✅ Your location was accepted by the dispatcher. Proceeding with your order.",
            None,
        )
        .await;
        self.place_order(draft, &customer, Some(pending.point)).await?;
        Ok(Ack::toast("Location accepted"))
    }

    /// Persists the cart as an order and opens its session.
    async fn place_order(
        &self,
        draft: &OrderDraft,
        customer: &Customer,
        delivery: Option<GeoPoint>,
    ) -> Result<Option<OrderId>, DormbiteError> {
        let fee = self.config.dispatch.delivery_fee_per_item;
        let currency = &self.config.dispatch.currency;
        let new_order = draft.to_new_order(
            delivery,
            fee,
            ordering::verification_code(),
            self.test_mode(),
        );

        let id = if new_order.order_type == OrderType::Contract {
            let placed = self.store.place_contract_order(&new_order).await?;
            match (placed.payment, placed.order_id) {
                (
                    ContractPaymentOutcome::Applied {
                        balance,
                        credit_meals,
                    },
                    Some(id),
                ) => {
                    debug!(customer = %customer.id, balance, credit_meals, "contract charged");
                    id
                }
                (ContractPaymentOutcome::CreditLimitReached, _) => {
                    self.send(
                        customer.id.chat(),
                        CREDIT_LIMIT_REACHED,
                        Some(Markup::RemoveKeyboard),
                    )
                    .await;
                    return Ok(None);
                }
                (ContractPaymentOutcome::NoContract, _) => {
                    self.send(
                        customer.id.chat(),
                        "❌ You have no contract with this restaurant.",
                        Some(Markup::RemoveKeyboard),
                    )
                    .await;
                    return Ok(None);
                }
                (ContractPaymentOutcome::Applied { .. }, None) => {
                    return Err(DormbiteError::Internal(
                        "contract charged without an order".to_string(),
                    ));
                }
            }
        } else {
            self.store.create_order(&new_order).await?
        };
        metrics::record_order_created(&new_order.order_type.to_string());
        info!(order_id = %id, customer = %customer.id, total = new_order.total_price, "order placed");

        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or(DormbiteError::OrderNotFound(id))?;
        let summary = crate::coordinator::order_summary(&order, Some(customer), currency);
        let mut session = OrderSession::new(id, customer.id, new_order.order_type, summary);
        session.delivery = delivery;

        let (text, markup) = crate::coordinator::render_panel(&session);
        session.panel = self.send(self.dispatch_chat, &text, markup).await;

        let mut mirror = None;
        if let Some(point) = delivery {
            mirror = self.show_live_location(self.dispatch_chat, None, point).await;
        }

        self.send(
            customer.id.chat(),
            &format!(
                "Order #{} placed! A deliverer will pick it up shortly.\n\n\
                 IMPORTANT: your verification code is {}. Keep it safe.",
                id.0, new_order.verification_code
            ),
            Some(Markup::RemoveKeyboard),
        )
        .await;
        session.customer_cancel = self
            .send(
                customer.id.chat(),
                crate::coordinator::CANCEL_PROMPT,
                Some(crate::coordinator::cancel_markup(id)),
            )
            .await;

        let mut state = self.state.lock().await;
        if let Some(m) = mirror {
            state.dispatch_mirrors.insert(customer.id, m);
        }
        state.sessions.insert(id, session);
        metrics::set_active_sessions(state.sessions.len());
        Ok(Some(id))
    }

    /// Closes conversations idle for longer than the configured timeout.
    /// Returns how many were closed.
    pub async fn expire_idle(&self, now: DateTime<Utc>) -> usize {
        let timeout = self.config.dispatch.conversation_idle_timeout_secs;
        if timeout == 0 {
            return 0;
        }
        let limit = Duration::seconds(i64::try_from(timeout).unwrap_or(i64::MAX / 1000));
        let stale: Vec<UserId> = self
            .conversations
            .iter()
            .filter(|c| now.signed_duration_since(c.touched) >= limit)
            .map(|c| *c.key())
            .collect();

        let mut expired = 0;
        for user in stale {
            let Some((_, conversation)) = self
                .conversations
                .remove_if(&user, |_, c| now.signed_duration_since(c.touched) >= limit)
            else {
                continue;
            };
            expired += 1;
            let what = match conversation.flow {
                Flow::Registration(_) => "registration",
                Flow::Ordering(_) => {
                    self.withdraw_pins(user).await;
                    "order"
                }
            };
            info!(user = %user, what, "conversation expired");
            self.send(
                user.chat(),
                &format!(
                    "⌛ Your {what} was closed after a period of inactivity. \
                     Send /start or /order to begin again."
                ),
                Some(Markup::RemoveKeyboard),
            )
            .await;
        }
        expired
    }

    /// Drops the sender's open conversation, if any.
    pub(crate) async fn cancel_conversation(&self, event: &InboundEvent) {
        self.conversations.remove(&event.sender.id);
        self.withdraw_pins(event.sender.id).await;
        self.send(event.chat, "Operation cancelled.", Some(Markup::RemoveKeyboard))
            .await;
    }

    /// Closes the dispatcher prompts of pins whose cart is gone.
    async fn withdraw_pins(&self, customer: UserId) {
        let prompts = self.state.lock().await.drop_pins(customer);
        for prompt in prompts {
            self.edit(
                prompt,
                &format!("Location for user {customer} withdrawn: the order was closed."),
                None,
            )
            .await;
        }
    }
}

/// Coordinates of the customer's registered block, if known.
fn dorm_location(
    config: &dormbite_config::DormbiteConfig,
    customer: &Customer,
) -> Option<GeoPoint> {
    customer
        .location
        .or_else(|| config.campus.block(&customer.block).and_then(|b| b.location()))
}
