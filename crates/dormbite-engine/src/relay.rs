// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-location ingestion: position history, customer status updates,
//! deliverer-to-customer relay and proximity arrival.

use dormbite_core::types::{GeoPoint, InboundEvent, OrderId, Position};
use dormbite_core::{DormbiteError, haversine};
use tracing::{debug, trace};

use crate::engine::Engine;
use crate::metrics;

impl Engine {
    pub(crate) async fn on_location(
        &self,
        event: &InboundEvent,
        point: GeoPoint,
        live: bool,
        edited: bool,
    ) -> Result<(), DormbiteError> {
        let sender = event.sender.id;
        trace!(sender = %sender, chat = %event.chat, live, edited, "location update");

        // Positions are recorded on every update, throttled or not.
        self.store
            .record_position(sender, Position { point, at: event.at })
            .await?;

        // A fresh pin from a customer choosing a delivery point.
        if !edited && self.is_private(event) && self.offer_location_to_cart(event, point).await {
            return Ok(());
        }

        let active = self.store.active_orders_for(sender).await?;
        if !active.is_empty() {
            self.track_customer(event, &active, point).await?;
        } else if live
            && !self.in_dispatch_chat(event)
            && !self.is_deliverer_in_flight(sender).await
        {
            // Deliverers share in the dispatch chat between orders.
            self.warn_lingering(event).await;
        }

        if !self.relay_throttle.allow((event.chat, sender), event.at) {
            debug!(sender = %sender, chat = %event.chat, "relay throttled");
            return Ok(());
        }

        let relayed = self.relay_from_deliverer(event, point).await;
        if !relayed && !self.in_dispatch_chat(event) {
            self.mirror_to_dispatch(event, point).await;
        }
        Ok(())
    }

    /// Refreshes delivery coordinates of the customer's orders and the
    /// throttled status line in the dispatch chat.
    async fn track_customer(
        &self,
        event: &InboundEvent,
        active: &[OrderId],
        point: GeoPoint,
    ) -> Result<(), DormbiteError> {
        let customer = event.sender.id;
        for id in active {
            self.store.update_order_location(*id, point).await?;
        }

        let (orders, deliverers, status) = {
            let mut state = self.state.lock().await;
            let mut deliverers = Vec::new();
            for id in active {
                if let Some(session) = state.sessions.get_mut(id) {
                    session.delivery = Some(point);
                    if let Some(name) = &session.deliverer_name {
                        deliverers.push(name.clone());
                    }
                }
            }
            let ids: Vec<String> = active.iter().map(ToString::to_string).collect();
            (ids, deliverers, state.status_messages.get(&customer).copied())
        };

        if !self.status_throttle.allow(customer, event.at) {
            return Ok(());
        }
        let (name, phone) = match self.store.get_customer(customer).await? {
            Some(c) => (c.display(), c.phone),
            None => (event.sender.display_name.clone(), "unknown".to_string()),
        };
        let text = format!(
            "📡 {name} (ID: {customer}) is sharing location\nPhone: {phone}\nOrders: {}\nDeliverer: {}\nUpdated: {}",
            orders.join(", "),
            if deliverers.is_empty() {
                "not assigned".to_string()
            } else {
                deliverers.join(", ")
            },
            event.at.format("%H:%M:%S"),
        );
        let message = match status {
            Some(message) => match self.messenger.edit_text(message, &text, None).await {
                Ok(()) => Some(message),
                Err(e) => {
                    debug!(error = %e, "status edit failed, resending");
                    self.send(self.dispatch_chat, &text, None).await
                }
            },
            None => self.send(self.dispatch_chat, &text, None).await,
        };
        if let Some(message) = message {
            self.state
                .lock()
                .await
                .status_messages
                .insert(customer, message);
        }
        Ok(())
    }

    async fn is_deliverer_in_flight(&self, user: dormbite_core::UserId) -> bool {
        self.state
            .lock()
            .await
            .sessions
            .values()
            .any(|s| s.is_accepted() && s.deliverer == Some(user))
    }

    /// Nudges the dispatch chat about a live share nobody needs anymore.
    async fn warn_lingering(&self, event: &InboundEvent) {
        let sender = event.sender.id;
        if self.conversations.contains_key(&sender) {
            return;
        }
        if !self.lingering_throttle.allow(sender, event.at) {
            return;
        }
        let name = self.describe_user(sender).await;
        self.send(
            self.dispatch_chat,
            &format!(
                "⚠️ {name} (ID: {sender}) is still sharing live location with no active order."
            ),
            None,
        )
        .await;
    }

    /// Forwards a deliverer's position to every customer it is bound to and
    /// checks arrival. Returns true when the sender is relaying.
    async fn relay_from_deliverer(&self, event: &InboundEvent, point: GeoPoint) -> bool {
        let sender = event.sender.id;
        let radius = self.config.dispatch.arrival_radius_m;
        let mut state = self.state.lock().await;
        let ids: Vec<OrderId> = state
            .sessions
            .iter_mut()
            .filter_map(|(id, s)| s.relays_from(sender).then_some(*id))
            .collect();

        for id in &ids {
            let Some(session) = state.sessions.get_mut(id) else {
                continue;
            };
            let target = session.customer.chat();
            if let Some(message) = self
                .show_live_location(target, session.live_message(), point)
                .await
            {
                session.set_live_message(message);
            }
            metrics::record_relay_forward();

            if let Some(delivery) = session.delivery {
                let distance = haversine(point, delivery);
                trace!(order_id = %id, distance, "distance to customer");
                if distance < radius {
                    self.notify_arrival(session, "proximity").await;
                }
            }
        }
        !ids.is_empty()
    }

    /// Keeps one dispatcher-facing live location per customer.
    async fn mirror_to_dispatch(&self, event: &InboundEvent, point: GeoPoint) {
        let customer = event.sender.id;
        let existing = self
            .state
            .lock()
            .await
            .dispatch_mirrors
            .get(&customer)
            .copied();
        if let Some(message) = self
            .show_live_location(self.dispatch_chat, existing, point)
            .await
        {
            self.state
                .lock()
                .await
                .dispatch_mirrors
                .insert(customer, message);
        }
    }
}
