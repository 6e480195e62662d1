// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch handshake: claims, the payment exchange, cancellation,
//! arrival and completion, driven by inline buttons.

use dormbite_core::DormbiteError;
use dormbite_core::types::{
    Button, Customer, InboundEvent, Markup, Order, OrderId, OrderStatus, OrderType, Rating,
};
use tracing::{debug, info, warn};

use crate::accounts::settlement_account;
use crate::callback::Action;
use crate::engine::{Ack, Engine, EngineState};
use crate::metrics;
use crate::ordering::format_price;
use crate::session::{Handshake, OrderSession, Stage};

pub(crate) const CANCEL_PROMPT: &str =
    "Need to cancel? You can do so until the deliverer pays at the restaurant.";

pub(crate) fn cancel_markup(id: OrderId) -> Markup {
    Markup::Inline(vec![vec![Button::new(
        "❌ Cancel Order",
        Action::CancelRequest(id).to_string(),
    )]])
}

fn rating_markup(id: OrderId) -> Markup {
    let row = |range: std::ops::RangeInclusive<u8>| -> Vec<Button> {
        range
            .map(|v| Button::new(v.to_string(), Action::Rate(id, v).to_string()))
            .collect()
    };
    Markup::Inline(vec![row(1..=5), row(6..=10)])
}

/// Details block shown on the dispatcher panel.
pub(crate) fn order_summary(order: &Order, customer: Option<&Customer>, currency: &str) -> String {
    let who = match customer {
        Some(c) => format!(
            "Customer: {} (ID: {})\nStudent ID: {}\nBlock/Dorm: {} / {}\nPhone: {}",
            c.name, c.id, c.institutional_id, c.block, c.dorm, c.phone
        ),
        None => format!("Customer: ID {}", order.customer_id),
    };
    format!(
        "{who}\nRestaurant: {}\nItems: {}\nPrice: {} {currency}{}\nVerification Code: {}",
        order.restaurant,
        order.items,
        format_price(order.total_price),
        if order.order_type == OrderType::Contract {
            " (contract)"
        } else {
            ""
        },
        order.verification_code,
    )
}

/// Text and buttons of the dispatcher panel for the session's stage.
pub(crate) fn render_panel(session: &OrderSession) -> (String, Option<Markup>) {
    let id = session.id;
    let deliverer = session.deliverer_name.as_deref().unwrap_or("a deliverer");
    let status = match session.stage {
        Stage::Pending => "⏳ Waiting for a deliverer".to_string(),
        Stage::Accepted(h) => match h {
            Handshake::Claimed => format!("🚚 Accepted by {deliverer}"),
            Handshake::AwaitingConfirmation => {
                format!("💳 {deliverer} is about to pay, waiting for the customer")
            }
            Handshake::PurchaseDeclined => "🔴 Customer cancelled the purchase".to_string(),
            Handshake::DeclineAcknowledged => {
                format!("🚚 Accepted by {deliverer}, customer declined one purchase")
            }
            Handshake::Locked => "🟢 Purchase confirmed by the customer".to_string(),
            Handshake::AwaitingProof => "💰 Waiting for the customer's payment proof".to_string(),
            Handshake::ProofSubmitted => {
                "🧾 Payment proof received, verify it and upload the receipt".to_string()
            }
            Handshake::ReceiptRequested { .. } => {
                "🧾 Waiting for a reply with the receipt photo".to_string()
            }
        },
        Stage::Complete => "✅ Completed".to_string(),
        Stage::Cancelled => "❌ Cancelled".to_string(),
    };
    let mut text = format!("🆕 Order {id}\n{}\n\nStatus: {status}", session.summary);
    if session.arrived() && !session.is_terminal() {
        text.push_str("\n📍 Arrived");
    }

    let button = |label: &str, action: Action| Button::new(label, action.to_string());
    let rows = match session.stage {
        Stage::Pending => vec![
            vec![button("✅ Accept", Action::Accept(id))],
            vec![button("❌ Cancel order", Action::AdminCancel(id))],
        ],
        Stage::Accepted(h) => {
            let mut rows = vec![vec![
                button("📍 Request location", Action::RequestLocation(id)),
                button("🏁 Force arrival", Action::ForceArrival(id)),
            ]];
            match h {
                Handshake::Claimed => {
                    rows.push(vec![button("💳 About to pay", Action::AboutToPay(id))]);
                    rows.push(vec![button("❌ Cancel order", Action::AdminCancel(id))]);
                }
                Handshake::DeclineAcknowledged => {
                    rows.push(vec![button("💳 About to pay", Action::AboutToPay(id))]);
                }
                Handshake::Locked => {
                    rows.push(vec![button("👀 Seen customer", Action::SeenCustomer(id))]);
                }
                Handshake::ProofSubmitted | Handshake::ReceiptRequested { .. } => {
                    rows.push(vec![button(
                        "🧾 Verify & Upload Receipt",
                        Action::VerifyProof(id),
                    )]);
                }
                Handshake::AwaitingConfirmation
                | Handshake::PurchaseDeclined
                | Handshake::AwaitingProof => {}
            }
            rows
        }
        Stage::Complete | Stage::Cancelled => return (text, None),
    };
    (text, Some(Markup::Inline(rows)))
}

fn gone(id: OrderId) -> Ack {
    Ack::alert(format!("Order {id} is no longer active."))
}

impl Engine {
    /// Routes a button press after checking who may press it.
    pub(crate) async fn on_action(
        &self,
        event: &InboundEvent,
        action: Action,
    ) -> Result<Ack, DormbiteError> {
        if action.is_dispatch_action() && !self.in_dispatch_chat(event) {
            return Ok(self.deny(event, action.tag(), &action.describe()).await);
        }
        debug!(sender = %event.sender.id, action = %action, "button pressed");

        match action {
            Action::Accept(id) => self.accept(event, id).await,
            Action::RequestLocation(id) => self.request_location(id).await,
            Action::ForceArrival(id) => self.force_arrival(id).await,
            Action::AboutToPay(id) => self.about_to_pay(id).await,
            Action::SeenCustomer(id) => self.seen_customer(id).await,
            Action::VerifyProof(id) => self.verify_proof(id).await,
            Action::AdminCancel(id) => self.admin_cancel_request(id).await,
            Action::AdminCancelConfirm(id) => {
                if let Some(message) = callback_message(event) {
                    self.clear_buttons(message).await;
                }
                self.cancel_order(id, false).await
            }
            Action::AdminCancelKeep(id) => {
                if let Some(message) = callback_message(event) {
                    self.edit(message, &format!("👍 Order {id} stays active."), None)
                        .await;
                }
                Ok(Ack::toast("Order kept"))
            }
            Action::PinAccept(pin) => self.on_pin_verdict(pin, true).await,
            Action::PinReject(pin) => self.on_pin_verdict(pin, false).await,
            Action::RecoveryReset => self.on_recovery(event, true).await,
            Action::RecoveryResume => self.on_recovery(event, false).await,
            Action::Rate(id, value) => self.rate(event, id, value).await,
            Action::ConfirmPurchase(id)
            | Action::CancelPurchase(id)
            | Action::AckDecline(id)
            | Action::CancelRequest(id)
            | Action::CancelConfirm(id)
            | Action::CancelKeep(id) => {
                let owner = self
                    .state
                    .lock()
                    .await
                    .sessions
                    .get(&id)
                    .map(|s| s.customer);
                match owner {
                    None => Ok(gone(id)),
                    Some(customer) if customer != event.sender.id => {
                        Ok(self.deny(event, action.tag(), &action.describe()).await)
                    }
                    Some(_) => self.on_customer_action(event, action).await,
                }
            }
        }
    }

    async fn on_customer_action(
        &self,
        event: &InboundEvent,
        action: Action,
    ) -> Result<Ack, DormbiteError> {
        match action {
            Action::ConfirmPurchase(id) => self.confirm_purchase(id).await,
            Action::CancelPurchase(id) => self.decline_purchase(id).await,
            Action::AckDecline(id) => self.acknowledge_decline(event, id).await,
            Action::CancelRequest(id) => self.cancel_request(id).await,
            Action::CancelConfirm(id) => self.cancel_order(id, true).await,
            Action::CancelKeep(id) => {
                if let Some(message) = callback_message(event) {
                    self.edit(message, &format!("👍 Your order {id} stays active."), None)
                        .await;
                }
                Ok(Ack::silent())
            }
            _ => Ok(Ack::silent()),
        }
    }

    /// Re-renders the session's dispatcher panel in place.
    pub(crate) async fn refresh_panel(&self, session: &OrderSession) {
        let Some(panel) = session.panel else {
            return;
        };
        let (text, markup) = render_panel(session);
        self.edit(panel, &text, markup).await;
    }

    async fn persist_stage(&self, session: &OrderSession) -> Result<(), DormbiteError> {
        let stage = session.handshake().map(|h| h.label());
        self.store.set_order_stage(session.id, stage).await
    }

    async fn accept(&self, event: &InboundEvent, id: OrderId) -> Result<Ack, DormbiteError> {
        let deliverer = event.sender.id;
        let won = self.store.claim_order(id, deliverer).await?;
        metrics::record_claim(won);
        if !won {
            let holder = self.store.get_order(id).await?.and_then(|o| o.deliverer_id);
            return Ok(match holder {
                Some(h) if h == deliverer => Ack::toast("You already hold this order."),
                Some(h) => {
                    let name = self.describe_user(h).await;
                    info!(order_id = %id, winner = %h, loser = %deliverer, "claim lost");
                    Ack::alert(format!("Order {id} was already accepted by {name}."))
                }
                None => Ack::alert(format!("Order {id} is no longer available.")),
            });
        }
        info!(order_id = %id, deliverer = %deliverer, "order claimed");

        let mut state = self.state.lock().await;
        if !state.sessions.contains_key(&id) {
            // Placed before a restart that was never resumed.
            let mut order = self
                .store
                .get_order(id)
                .await?
                .ok_or(DormbiteError::OrderNotFound(id))?;
            let customer = self.store.get_customer(order.customer_id).await?;
            let summary = order_summary(&order, customer.as_ref(), &self.config.dispatch.currency);
            order.status = OrderStatus::Pending;
            order.deliverer_id = None;
            state.sessions.insert(id, OrderSession::recover(&order, summary));
        }
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        session.claim(deliverer)?;
        session.deliverer_name = Some(event.sender.display_name.clone());
        session.deliverer_handle = event.sender.handle.clone();
        self.persist_stage(session).await?;
        self.refresh_panel(session).await;

        self.send(
            session.customer.chat(),
            &format!("🚚 Your order {id} is on the way!"),
            None,
        )
        .await;
        self.send(
            self.dispatch_chat,
            &format!(
                "{}, please share your live location so the customer of order {id} can follow the delivery.",
                event.sender.display_name
            ),
            None,
        )
        .await;
        Ok(Ack::toast(format!("You accepted order {id}")))
    }

    async fn request_location(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let (customer, fallback) = {
            let state = self.state.lock().await;
            match state.sessions.get(&id) {
                Some(s) => (s.customer, s.delivery),
                None => return Ok(gone(id)),
            }
        };
        let point = match self.store.latest_position(customer).await? {
            Some(position) => Some(position.point),
            None => fallback,
        };
        let Some(point) = point else {
            return Ok(Ack::alert("No location available for this customer."));
        };
        let info = match self.store.get_customer(customer).await? {
            Some(c) => format!(
                "📍 Location of {} for order {id}\nPhone: {}\nBlock/Dorm: {} / {}",
                c.name, c.phone, c.block, c.dorm
            ),
            None => format!("📍 Location of the customer for order {id}"),
        };
        self.send(self.dispatch_chat, &info, None).await;
        if let Err(e) = self
            .messenger
            .send_location(self.dispatch_chat, point, None)
            .await
        {
            warn!(order_id = %id, error = %e, "failed to post customer location");
            return Ok(Ack::alert("Could not post the location, try again."));
        }
        Ok(Ack::silent())
    }

    async fn force_arrival(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        if !session.is_accepted() {
            return Err(DormbiteError::InvalidTransition {
                order_id: id,
                from: session.stage.label().to_string(),
                action: "arrive".to_string(),
            });
        }
        if self.notify_arrival(session, "manual").await {
            Ok(Ack::toast("Arrival announced"))
        } else {
            Ok(Ack::toast("Arrival was already announced"))
        }
    }

    /// Tells both sides the deliverer is at the customer. Fires once per
    /// order whether triggered by proximity or by hand.
    pub(crate) async fn notify_arrival(
        &self,
        session: &mut OrderSession,
        trigger: &'static str,
    ) -> bool {
        if !session.mark_arrived() {
            return false;
        }
        metrics::record_arrival(trigger);
        info!(order_id = %session.id, trigger, "deliverer arrived");

        self.send(
            session.customer.chat(),
            "Your food has arrived! You will shortly receive a call from our agents.",
            None,
        )
        .await;
        let phone = match self.store.get_customer(session.customer).await {
            Ok(Some(c)) => c.phone,
            Ok(None) => "unknown".to_string(),
            Err(e) => {
                warn!(order_id = %session.id, error = %e, "customer lookup failed");
                "unknown".to_string()
            }
        };
        self.send(
            self.dispatch_chat,
            &format!(
                "📍 Arrived for order {}.\nCustomer phone: {phone}\nHave you seen the customer?",
                session.id
            ),
            Some(Markup::Inline(vec![vec![Button::new(
                "Yes (seen)",
                Action::SeenCustomer(session.id).to_string(),
            )]])),
        )
        .await;
        self.refresh_panel(session).await;
        true
    }

    async fn about_to_pay(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        session.about_to_pay()?;
        self.persist_stage(session).await?;
        if let Some(message) = session.customer_cancel.take() {
            self.delete(message).await;
        }
        self.send(
            session.customer.chat(),
            &format!(
                "💳 The deliverer is about to pay for your order {id} at the restaurant."
            ),
            None,
        )
        .await;
        session.purchase_prompt = self
            .send(
                session.customer.chat(),
                "Do you confirm the purchase?",
                Some(Markup::Inline(vec![vec![
                    Button::new("✅ Confirm Purchase", Action::ConfirmPurchase(id).to_string()),
                    Button::new("❌ Cancel Purchase", Action::CancelPurchase(id).to_string()),
                ]])),
            )
            .await;
        self.refresh_panel(session).await;
        Ok(Ack::toast("Waiting for the customer to confirm"))
    }

    async fn confirm_purchase(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        session.confirm_purchase()?;
        self.persist_stage(session).await?;
        info!(order_id = %id, "purchase confirmed");
        let text = "✅ Purchase confirmed. You cannot cancel this order anymore.";
        match session.purchase_prompt.take() {
            Some(prompt) => self.edit(prompt, text, None).await,
            None => {
                self.send(session.customer.chat(), text, None).await;
            }
        }
        self.refresh_panel(session).await;
        Ok(Ack::silent())
    }

    async fn decline_purchase(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        session.decline_purchase()?;
        self.persist_stage(session).await?;
        info!(order_id = %id, "purchase declined");
        if let Some(prompt) = session.purchase_prompt.take() {
            self.edit(prompt, "❌ You declined the purchase.", None).await;
        }
        self.send(
            session.customer.chat(),
            "⚠️ The deliverer was told not to pay. Repeatedly declining purchases \
             after a deliverer has gone to the restaurant may get your account banned.",
            Some(Markup::Inline(vec![vec![Button::new(
                "Acknowledge",
                Action::AckDecline(id).to_string(),
            )]])),
        )
        .await;
        self.refresh_panel(session).await;
        Ok(Ack::silent())
    }

    async fn acknowledge_decline(
        &self,
        event: &InboundEvent,
        id: OrderId,
    ) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        session.acknowledge_decline()?;
        self.persist_stage(session).await?;
        if let Some(message) = callback_message(event) {
            self.clear_buttons(message).await;
        }
        self.send(
            session.customer.chat(),
            &format!(
                "Noted. The deliverer will ask you again before paying for order {id}. \
                 The order can no longer be cancelled."
            ),
            None,
        )
        .await;
        self.refresh_panel(session).await;
        Ok(Ack::silent())
    }

    async fn clear_buttons(&self, message: dormbite_core::types::MessageRef) {
        if let Err(e) = self.messenger.edit_markup(message, None).await {
            debug!(error = %e, "failed to clear buttons");
        }
    }

    /// First step of a dispatcher cancel: asks the dispatch chat to confirm.
    async fn admin_cancel_request(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        {
            let state = self.state.lock().await;
            match state.sessions.get(&id) {
                Some(s) if s.can_cancel() => {}
                Some(_) => {
                    return Ok(Ack::alert(format!(
                        "Order {id} can no longer be cancelled: the purchase is under way."
                    )));
                }
                None => return Ok(gone(id)),
            }
        }
        self.send(
            self.dispatch_chat,
            &format!("⚠️ Cancel order {id}? The customer will be told."),
            Some(Markup::Inline(vec![vec![
                Button::new("Yes, cancel", Action::AdminCancelConfirm(id).to_string()),
                Button::new("No, keep it", Action::AdminCancelKeep(id).to_string()),
            ]])),
        )
        .await;
        Ok(Ack::silent())
    }

    async fn cancel_request(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let customer = {
            let state = self.state.lock().await;
            match state.sessions.get(&id) {
                Some(s) if s.can_cancel() => s.customer,
                Some(_) => {
                    return Ok(Ack::alert(
                        "This order can no longer be cancelled: the purchase is under way.",
                    ));
                }
                None => return Ok(gone(id)),
            }
        };
        self.send(
            customer.chat(),
            &format!("Are you sure you want to cancel order {id}?"),
            Some(Markup::Inline(vec![vec![
                Button::new("Yes, cancel", Action::CancelConfirm(id).to_string()),
                Button::new("No, keep it", Action::CancelKeep(id).to_string()),
            ]])),
        )
        .await;
        Ok(Ack::silent())
    }

    /// Cancels an order on behalf of the customer or the dispatch chat.
    async fn cancel_order(&self, id: OrderId, by_customer: bool) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        if !session.can_cancel() {
            return Ok(Ack::alert(format!(
                "Order {id} can no longer be cancelled: the purchase is under way."
            )));
        }
        session.cancel()?;
        self.store.set_order_status(id, OrderStatus::Cancelled).await?;
        info!(order_id = %id, by_customer, "order cancelled");
        self.refresh_panel(session).await;
        if let Some(message) = session.customer_cancel.take() {
            self.delete(message).await;
        }

        let customer = session.customer;
        if by_customer {
            self.send(customer.chat(), &format!("❌ Your order {id} was cancelled."), None)
                .await;
            self.send(
                self.dispatch_chat,
                &format!("❌ Order {id} was cancelled by the customer."),
                None,
            )
            .await;
        } else {
            self.send(
                customer.chat(),
                &format!("❌ Your order {id} was cancelled by the dispatcher."),
                None,
            )
            .await;
        }
        state.purge(id);
        Ok(Ack::toast("Order cancelled"))
    }

    async fn seen_customer(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        if session.seen_customer()? {
            self.finish_order(&mut state, id).await?;
            return Ok(Ack::toast("Contract order completed"));
        }
        self.persist_stage(session).await?;

        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or(DormbiteError::OrderNotFound(id))?;
        let payments = &self.config.payments;
        let account = settlement_account(payments, session.deliverer_handle.as_deref());
        self.send(
            session.customer.chat(),
            &format!(
                "💰 Please pay {} {} for order {id} to {} account {account}.\n\
                 Then send a screenshot of the payment here.",
                format_price(order.total_price),
                self.config.dispatch.currency,
                payments.bank,
            ),
            None,
        )
        .await;
        self.refresh_panel(session).await;
        Ok(Ack::toast("Payment instructions sent"))
    }

    async fn verify_proof(&self, id: OrderId) -> Result<Ack, DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(gone(id));
        };
        session.check_receipt_request()?;
        let request = self
            .send(
                self.dispatch_chat,
                &format!(
                    "🧾 RECEIPT UPLOAD REQUEST\n\nPlease REPLY to this message with the receipt photo for Order {id}"
                ),
                None,
            )
            .await
            .ok_or_else(|| DormbiteError::channel("failed to post the receipt request"))?;
        session.request_receipt(request)?;
        self.persist_stage(session).await?;
        self.refresh_panel(session).await;
        Ok(Ack::toast("Reply to the request with the receipt photo"))
    }

    async fn rate(
        &self,
        event: &InboundEvent,
        id: OrderId,
        value: u8,
    ) -> Result<Ack, DormbiteError> {
        let Some(order) = self.store.get_order(id).await? else {
            return Ok(Ack::alert(format!("Order {id} not found.")));
        };
        if order.customer_id != event.sender.id {
            let action = Action::Rate(id, value);
            return Ok(self.deny(event, action.tag(), &action.describe()).await);
        }
        if order.status != OrderStatus::Complete {
            return Ok(Ack::alert("You can rate an order once it is complete."));
        }
        if !(1..=10).contains(&value) {
            return Ok(Ack::alert("Ratings go from 1 to 10."));
        }
        let saved = self
            .store
            .save_rating(&Rating {
                order_id: id,
                value,
                comment: None,
            })
            .await?;
        if !saved {
            return Ok(Ack::alert("You already rated this order."));
        }
        info!(order_id = %id, value, "order rated");
        if let Some(message) = callback_message(event) {
            self.edit(
                message,
                &format!("Thank you! You rated this order {value}/10."),
                None,
            )
            .await;
        }
        Ok(Ack::toast("Thanks for your rating"))
    }

    /// Completes a session already in its final stage: persists it, posts
    /// the summary, asks for a rating and drops every transient handle.
    pub(crate) async fn finish_order(
        &self,
        state: &mut EngineState,
        id: OrderId,
    ) -> Result<(), DormbiteError> {
        let Some(session) = state.sessions.get(&id) else {
            return Ok(());
        };
        let completion = match session.deliverer {
            Some(d) => self.store.latest_position(d).await?.map(|p| p.point),
            None => None,
        };
        self.store.complete_order(id, completion).await?;
        metrics::record_completed(&session.order_type.to_string());
        info!(order_id = %id, deliverer = ?session.deliverer, "order completed");

        let order = self.store.get_order(id).await?;
        let customer = self.store.get_customer(session.customer).await?;
        if let (Some(order), Some(channel)) = (&order, self.config.dispatch.completed_channel_id) {
            self.post_completed(dormbite_core::types::ChatId(channel), order, customer.as_ref())
                .await;
        }

        self.send(
            session.customer.chat(),
            &format!("✅ Order {id} is complete. You can stop sharing your live location now."),
            Some(Markup::RemoveKeyboard),
        )
        .await;
        self.send(
            session.customer.chat(),
            "How was your delivery? Please rate 1 (Worst) to 10 (Best).",
            Some(rating_markup(id)),
        )
        .await;
        self.send(
            self.dispatch_chat,
            &format!(
                "✅ Order {id} completed. {}, you can stop sharing your live location.",
                session.deliverer_name.as_deref().unwrap_or("Deliverer")
            ),
            None,
        )
        .await;
        self.refresh_panel(session).await;
        state.purge(id);
        Ok(())
    }

    async fn post_completed(
        &self,
        channel: dormbite_core::types::ChatId,
        order: &Order,
        customer: Option<&Customer>,
    ) {
        if let Some(proof) = &order.customer_proof
            && let Err(e) = self
                .messenger
                .send_photo(channel, proof, Some("📤 Proof from customer"), None)
                .await
        {
            warn!(order_id = %order.id, error = %e, "failed to post customer proof");
        }
        if let Some(receipt) = &order.deliverer_proof
            && let Err(e) = self
                .messenger
                .send_photo(channel, receipt, Some("🧾 Receipt"), None)
                .await
        {
            warn!(order_id = %order.id, error = %e, "failed to post receipt");
        }
        let (user, phone, dorm) = match customer {
            Some(c) => (
                format!("{} (ID: {})", c.name, c.id),
                c.phone.clone(),
                format!("{} / {}", c.block, c.dorm),
            ),
            None => (format!("ID {}", order.customer_id), "-".into(), "-".into()),
        };
        let text = format!(
            "✅ Order {} completed{}\nUser: {user}\nPhone: {phone}\nDorm: {dorm}\n\
             Restaurant: {}\nItem: {}\nPrice: {} {}",
            order.id,
            if order.is_test { " (test)" } else { "" },
            order.restaurant,
            order.items,
            format_price(order.total_price),
            self.config.dispatch.currency,
        );
        self.send(channel, &text, None).await;
    }
}

fn callback_message(event: &InboundEvent) -> Option<dormbite_core::types::MessageRef> {
    match &event.kind {
        dormbite_core::types::EventKind::Callback { message, .. } => *message,
        _ => None,
    }
}
