// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Restart recovery: in-flight orders from a previous run are either reset
//! or resumed at the dispatcher's choice.

use dormbite_core::DormbiteError;
use dormbite_core::types::{Button, InboundEvent, Markup};
use tracing::info;

use crate::callback::Action;
use crate::coordinator::{CANCEL_PROMPT, cancel_markup, order_summary, render_panel};
use crate::engine::{Ack, Engine};
use crate::metrics;
use crate::session::OrderSession;

impl Engine {
    /// Asks the dispatch chat what to do with orders left from the last run.
    /// Returns how many in-flight orders were found.
    pub async fn announce_restart(&self) -> Result<usize, DormbiteError> {
        let orders = self.store.active_orders().await?;
        if orders.is_empty() {
            return Ok(0);
        }
        info!(count = orders.len(), "in-flight orders found at startup");
        let prompt = self
            .send(
                self.dispatch_chat,
                &format!(
                    "🔄 The bot restarted with {} order(s) still in flight.\n\
                     Was this restart intentional?",
                    orders.len()
                ),
                Some(Markup::Inline(vec![
                    vec![Button::new(
                        "Intentional (Reset Data)",
                        Action::RecoveryReset.to_string(),
                    )],
                    vec![Button::new(
                        "Unintentional (Resume)",
                        Action::RecoveryResume.to_string(),
                    )],
                ])),
            )
            .await;
        self.state.lock().await.recovery_prompt = prompt;
        Ok(orders.len())
    }

    pub(crate) async fn on_recovery(
        &self,
        event: &InboundEvent,
        reset: bool,
    ) -> Result<Ack, DormbiteError> {
        let Some(prompt) = self.state.lock().await.recovery_prompt.take() else {
            return Ok(Ack::toast("Already handled."));
        };
        let actor = self.describe_user(event.sender.id).await;
        if reset {
            let cancelled = self.store.reset_in_flight_orders().await?;
            info!(cancelled, actor = %actor, "in-flight orders reset after restart");
            self.edit(
                prompt,
                &format!("🧹 {actor} reset the data: {cancelled} order(s) cancelled."),
                None,
            )
            .await;
            return Ok(Ack::toast("Data reset"));
        }

        let resumed = self.resume_sessions().await?;
        info!(resumed, actor = %actor, "sessions resumed after restart");
        self.edit(
            prompt,
            &format!(
                "▶️ {actor} resumed {resumed} order(s). Deliverers, share your live location again to restore tracking."
            ),
            None,
        )
        .await;
        Ok(Ack::toast("Orders resumed"))
    }

    /// Rebuilds sessions for every in-flight order and posts fresh panels.
    async fn resume_sessions(&self) -> Result<usize, DormbiteError> {
        let orders = self.store.active_orders().await?;
        let currency = &self.config.dispatch.currency;
        let mut resumed = Vec::with_capacity(orders.len());
        for order in &orders {
            let customer = self.store.get_customer(order.customer_id).await?;
            let summary = order_summary(order, customer.as_ref(), currency);
            let mut session = OrderSession::recover(order, summary);
            if let Some(deliverer) = session.deliverer {
                session.deliverer_name = Some(self.describe_user(deliverer).await);
                if let Some(c) = self.store.get_customer(deliverer).await? {
                    session.deliverer_handle = c.handle;
                }
            }
            let (text, markup) = render_panel(&session);
            session.panel = self.send(self.dispatch_chat, &text, markup).await;
            if session.can_cancel() {
                session.customer_cancel = self
                    .send(
                        session.customer.chat(),
                        CANCEL_PROMPT,
                        Some(cancel_markup(session.id)),
                    )
                    .await;
            }
            resumed.push(session);
        }

        let mut state = self.state.lock().await;
        let count = resumed.len();
        for session in resumed {
            state.sessions.insert(session.id, session);
        }
        metrics::set_active_sessions(state.sessions.len());
        Ok(count)
    }
}
