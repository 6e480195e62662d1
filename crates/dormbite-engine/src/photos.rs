// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Photo routing: customer payment proofs and dispatcher receipts.
//!
//! A photo that matches neither path is ignored without a reply.

use dormbite_core::DormbiteError;
use dormbite_core::types::{Button, FileRef, InboundEvent, Markup, OrderId};
use tracing::{debug, info, warn};

use crate::callback::Action;
use crate::engine::Engine;
use crate::session::Handshake;

impl Engine {
    pub(crate) async fn on_photo(
        &self,
        event: &InboundEvent,
        file: &FileRef,
        reply_to: Option<i32>,
    ) -> Result<(), DormbiteError> {
        if self.in_dispatch_chat(event) {
            if let Some(reply_to) = reply_to {
                return self.on_receipt(file, reply_to).await;
            }
        } else if self.is_private(event) {
            return self.on_proof(event, file).await;
        }
        debug!(sender = %event.sender.id, chat = %event.chat, "unrouted photo ignored");
        Ok(())
    }

    /// A dispatcher's reply to a receipt request completes that order.
    async fn on_receipt(&self, file: &FileRef, reply_to: i32) -> Result<(), DormbiteError> {
        let mut state = self.state.lock().await;
        let Some(id) = state
            .sessions
            .values()
            .find(|s| s.awaits_receipt_on(reply_to))
            .map(|s| s.id)
        else {
            debug!(reply_to, "photo reply matches no receipt request");
            return Ok(());
        };
        let Some(session) = state.sessions.get_mut(&id) else {
            return Ok(());
        };
        self.store.set_deliverer_proof(id, file).await?;
        if let Err(e) = self
            .messenger
            .send_photo(
                session.customer.chat(),
                file,
                Some(&format!("🧾 Receipt for your order {id}")),
                None,
            )
            .await
        {
            warn!(order_id = %id, error = %e, "failed to forward receipt");
        }
        session.complete_with_receipt()?;
        info!(order_id = %id, "receipt received");
        self.finish_order(&mut state, id).await
    }

    /// A customer's payment screenshot for the order awaiting it.
    async fn on_proof(&self, event: &InboundEvent, file: &FileRef) -> Result<(), DormbiteError> {
        let customer = event.sender.id;
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.values_mut().find(|s| {
            s.customer == customer && s.handshake() == Some(Handshake::AwaitingProof)
        }) else {
            debug!(sender = %customer, "photo outside a proof step ignored");
            return Ok(());
        };
        let id: OrderId = session.id;
        session.submit_proof()?;
        self.store.set_customer_proof(id, file).await?;
        self.store
            .set_order_stage(id, session.handshake().map(|h| h.label()))
            .await?;
        info!(order_id = %id, "payment proof received");

        // The panel below also carries the verify button if this fails.
        if let Err(e) = self
            .messenger
            .send_photo(
                self.dispatch_chat,
                file,
                Some(&format!("📤 Payment proof for order {id}")),
                Some(Markup::Inline(vec![vec![Button::new(
                    "🧾 Verify & Upload Receipt",
                    Action::VerifyProof(id).to_string(),
                )]])),
            )
            .await
        {
            warn!(order_id = %id, error = %e, "failed to post payment proof");
        }
        self.refresh_panel(session).await;
        self.send(
            customer.chat(),
            "✅ Proof received. The dispatcher will verify it and send you the receipt.",
            None,
        )
        .await;
        Ok(())
    }
}
