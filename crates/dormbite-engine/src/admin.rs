// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash commands. Customer commands work in private chats; operator
//! commands only inside the dispatch chat.

use std::collections::BTreeSet;

use dormbite_core::DormbiteError;
use dormbite_core::types::{InboundEvent, UserId};
use tracing::{debug, info};

use crate::conversation::Flow;
use crate::engine::Engine;
use crate::metrics;
use crate::session::Stage;

/// Operator commands recognized in the dispatch chat.
const ADMIN_COMMANDS: &[&str] = &[
    "resetorders",
    "clearorders",
    "testmode",
    "set_test_mode",
    "ban",
    "archive",
    "promote",
    "soldout",
    "contract",
];

fn parse_user(args: &str) -> Option<UserId> {
    args.split_whitespace().next()?.parse().ok().map(UserId)
}

impl Engine {
    pub(crate) async fn on_command(
        &self,
        event: &InboundEvent,
        name: &str,
        args: &str,
    ) -> Result<(), DormbiteError> {
        if ADMIN_COMMANDS.contains(&name) {
            if !self.in_dispatch_chat(event) {
                let ack = self.deny(event, "command", &format!("run /{name}")).await;
                if let Some(text) = ack.text {
                    self.send(event.chat, &text, None).await;
                }
                return Ok(());
            }
            return self.on_admin_command(event, name, args.trim()).await;
        }

        if !self.is_private(event) {
            debug!(command = name, chat = %event.chat, "customer command outside a private chat");
            return Ok(());
        }
        match name {
            "start" => self.start_registration(event).await,
            "order" => self.start_ordering(event).await?,
            "cancel" => self.cancel_conversation(event).await,
            _ => {
                self.send(
                    event.chat,
                    "Unknown command. Use /start to register or /order to place an order.",
                    None,
                )
                .await;
            }
        }
        Ok(())
    }

    async fn on_admin_command(
        &self,
        event: &InboundEvent,
        name: &str,
        args: &str,
    ) -> Result<(), DormbiteError> {
        info!(actor = %event.sender.id, command = name, args, "admin command");
        let reply = match name {
            "resetorders" | "clearorders" => self.reset_orders().await?,
            "testmode" | "set_test_mode" => match args.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => {
                    self.set_test_mode(true);
                    "🧪 Test mode is ON. New orders are marked as test orders.".to_string()
                }
                "off" | "false" | "0" => {
                    self.set_test_mode(false);
                    "🧪 Test mode is OFF.".to_string()
                }
                _ => format!(
                    "Usage: /{name} on|off (currently {})",
                    if self.test_mode() { "on" } else { "off" }
                ),
            },
            "ban" => match parse_user(args) {
                Some(user) => match self.store.ban_customer(user).await {
                    Ok(()) => format!("🚫 User {user} is banned from ordering."),
                    Err(DormbiteError::CustomerNotFound(_)) => format!("No customer with ID {user}."),
                    Err(e) => return Err(e),
                },
                None => "Usage: /ban <user_id>".to_string(),
            },
            "archive" => match parse_user(args) {
                Some(user) => {
                    if self.store.archive_customer(user).await? {
                        format!("🗄 User {user} was archived.")
                    } else {
                        format!("No customer with ID {user}.")
                    }
                }
                None => "Usage: /archive <user_id>".to_string(),
            },
            "promote" => match parse_user(args) {
                Some(user) => match self.store.set_deliverer(user, true).await {
                    Ok(()) => format!("🚚 User {user} is now a deliverer."),
                    Err(DormbiteError::CustomerNotFound(_)) => format!("No customer with ID {user}."),
                    Err(e) => return Err(e),
                },
                None => "Usage: /promote <user_id>".to_string(),
            },
            "soldout" => self.toggle_sold_out(args).await?,
            "contract" => self.top_up_contract(args).await?,
            _ => return Ok(()),
        };
        self.send(event.chat, &reply, None).await;
        Ok(())
    }

    /// Cancels every in-flight order and drops all transient state.
    async fn reset_orders(&self) -> Result<String, DormbiteError> {
        let customers: BTreeSet<UserId> = self
            .store
            .active_orders()
            .await?
            .iter()
            .map(|o| o.customer_id)
            .collect();
        let cancelled = self.store.reset_in_flight_orders().await?;

        let (sessions, mirrors, statuses) = {
            let mut state = self.state.lock().await;
            state.pins.clear();
            state.recovery_prompt = None;
            let sessions = std::mem::take(&mut state.sessions);
            let mirrors = std::mem::take(&mut state.dispatch_mirrors);
            let statuses = std::mem::take(&mut state.status_messages);
            metrics::set_active_sessions(0);
            (sessions, mirrors, statuses)
        };
        for mut session in sessions.into_values() {
            if let Some(live) = session.live_message() {
                self.delete(live).await;
            }
            if let Some(message) = session.customer_cancel.take() {
                self.delete(message).await;
            }
            session.stage = Stage::Cancelled;
            self.refresh_panel(&session).await;
        }
        for message in mirrors.into_values().chain(statuses.into_values()) {
            self.delete(message).await;
        }
        self.conversations
            .retain(|_, c| matches!(c.flow, Flow::Registration(_)));
        self.relay_throttle.clear();
        self.status_throttle.clear();
        self.lingering_throttle.clear();

        for customer in customers {
            self.send(
                customer.chat(),
                "Your order has been interrupted and cancelled by the admin.",
                None,
            )
            .await;
        }
        info!(cancelled, "in-flight orders reset");
        Ok(format!("🧹 Reset complete: {cancelled} order(s) cancelled."))
    }

    async fn toggle_sold_out(&self, args: &str) -> Result<String, DormbiteError> {
        let usage = "Usage: /soldout <restaurant> | <item>";
        let Some((restaurant, item)) = args.split_once('|') else {
            return Ok(usage.to_string());
        };
        let (restaurant, item) = (restaurant.trim(), item.trim());
        let Some(config) = self.config.restaurant(restaurant) else {
            return Ok(format!("Unknown restaurant `{restaurant}`."));
        };
        if !config.menu.iter().any(|m| m.name == item) {
            return Ok(format!("{restaurant} has no item `{item}`."));
        }
        let unavailable = self.store.toggle_item_availability(restaurant, item).await?;
        Ok(if unavailable {
            format!("🚫 {item} at {restaurant} is now sold out.")
        } else {
            format!("✅ {item} at {restaurant} is available again.")
        })
    }

    async fn top_up_contract(&self, args: &str) -> Result<String, DormbiteError> {
        let usage = "Usage: /contract <user_id> <restaurant> <amount>";
        let tokens: Vec<&str> = args.split_whitespace().collect();
        let [user, middle @ .., amount] = tokens.as_slice() else {
            return Ok(usage.to_string());
        };
        let (Ok(user), Ok(amount)) = (user.parse::<i64>(), amount.parse::<f64>()) else {
            return Ok(usage.to_string());
        };
        if middle.is_empty() || !amount.is_finite() || amount <= 0.0 {
            return Ok(usage.to_string());
        }
        let restaurant = middle.join(" ");
        if self.config.restaurant(&restaurant).is_none() {
            return Ok(format!("Unknown restaurant `{restaurant}`."));
        }
        let user = UserId(user);
        if self.store.get_customer(user).await?.is_none() {
            return Ok(format!("No customer with ID {user}."));
        }
        let contract = self.store.top_up_contract(user, &restaurant, amount).await?;
        info!(customer = %user, restaurant = %restaurant, amount, "contract topped up");
        Ok(format!(
            "📄 Contract for {user} at {restaurant}: balance {} {}.",
            crate::ordering::format_price(contract.balance),
            self.config.dispatch.currency
        ))
    }
}
