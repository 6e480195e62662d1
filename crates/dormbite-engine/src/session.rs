// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-order session: one tagged stage plus the transient message handles
//! needed to keep every party's view current.
//!
//! All transitions go through methods that return
//! [`DormbiteError::InvalidTransition`] when the current stage does not
//! allow the step. Dropping the session purges every relay and handle
//! bound to the order.

use dormbite_core::DormbiteError;
use dormbite_core::types::{GeoPoint, MessageRef, Order, OrderId, OrderStatus, OrderType, UserId};

/// Progress of the payment handshake once a deliverer holds the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Claimed,
    /// Deliverer signalled "about to pay"; the customer must confirm.
    AwaitingConfirmation,
    /// Customer declined; waiting for them to acknowledge the warning.
    PurchaseDeclined,
    /// Warning acknowledged. The deliverer may signal payment again but
    /// the customer can no longer cancel.
    DeclineAcknowledged,
    /// Customer confirmed. Cancellation is permanently disabled.
    Locked,
    /// Visual contact made; customer was told where to pay.
    AwaitingProof,
    /// Customer proof arrived; dispatcher must verify.
    ProofSubmitted,
    /// Dispatcher was asked to reply to `request` with the receipt.
    ReceiptRequested { request: MessageRef },
}

impl Handshake {
    pub fn label(&self) -> &'static str {
        match self {
            Handshake::Claimed => "claimed",
            Handshake::AwaitingConfirmation => "awaiting_confirmation",
            Handshake::PurchaseDeclined => "purchase_declined",
            Handshake::DeclineAcknowledged => "decline_acknowledged",
            Handshake::Locked => "locked",
            Handshake::AwaitingProof => "awaiting_proof",
            Handshake::ProofSubmitted => "proof_submitted",
            Handshake::ReceiptRequested { .. } => "receipt_requested",
        }
    }

    /// True once the customer has confirmed the purchase.
    pub fn is_locked(&self) -> bool {
        !matches!(
            self,
            Handshake::Claimed
                | Handshake::AwaitingConfirmation
                | Handshake::PurchaseDeclined
                | Handshake::DeclineAcknowledged
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Accepted(Handshake),
    Complete,
    Cancelled,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Accepted(h) => h.label(),
            Stage::Complete => "complete",
            Stage::Cancelled => "cancelled",
        }
    }
}

/// Whether the deliverer's live location is wired to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayBinding {
    Unbound,
    /// Forwarding to the customer; `live_message` is the customer-side
    /// live-location message once one was sent.
    Bound { live_message: Option<MessageRef> },
    /// Rebuilt after a restart; the next deliverer position re-binds it.
    NeedsRebind,
}

/// Everything the engine tracks for one in-flight order.
#[derive(Debug, Clone)]
pub struct OrderSession {
    pub id: OrderId,
    pub customer: UserId,
    pub deliverer: Option<UserId>,
    /// How the deliverer is named on the panel.
    pub deliverer_name: Option<String>,
    /// Platform handle used to pick the settlement account.
    pub deliverer_handle: Option<String>,
    pub order_type: OrderType,
    pub stage: Stage,
    /// Delivery point, refreshed from the customer's position updates.
    pub delivery: Option<GeoPoint>,
    /// Order details shown on the dispatcher panel.
    pub summary: String,
    /// The dispatcher-facing control panel message.
    pub panel: Option<MessageRef>,
    /// The customer's message holding the Cancel Order button.
    pub customer_cancel: Option<MessageRef>,
    /// The customer's Confirm/Cancel Purchase prompt.
    pub purchase_prompt: Option<MessageRef>,
    pub relay: RelayBinding,
    arrived: bool,
}

impl OrderSession {
    pub fn new(id: OrderId, customer: UserId, order_type: OrderType, summary: String) -> Self {
        Self {
            id,
            customer,
            deliverer: None,
            deliverer_name: None,
            deliverer_handle: None,
            order_type,
            stage: Stage::Pending,
            delivery: None,
            summary,
            panel: None,
            customer_cancel: None,
            purchase_prompt: None,
            relay: RelayBinding::Unbound,
            arrived: false,
        }
    }

    /// Rebuilds a session from a stored row after a restart.
    ///
    /// Only status, stage label and deliverer survive; message handles are
    /// lost and the relay is marked for re-binding.
    pub fn recover(order: &Order, summary: String) -> Self {
        let mut session = Self::new(order.id, order.customer_id, order.order_type, summary);
        session.delivery = order.delivery;
        session.deliverer = order.deliverer_id;
        session.stage = match order.status {
            OrderStatus::Pending => Stage::Pending,
            OrderStatus::Complete => Stage::Complete,
            OrderStatus::Cancelled => Stage::Cancelled,
            OrderStatus::Accepted => Stage::Accepted(match order.stage.as_deref() {
                Some("awaiting_confirmation") => Handshake::AwaitingConfirmation,
                Some("purchase_declined") => Handshake::PurchaseDeclined,
                Some("decline_acknowledged") => Handshake::DeclineAcknowledged,
                Some("locked") => Handshake::Locked,
                Some("awaiting_proof") => Handshake::AwaitingProof,
                // The receipt request message is gone; ask again from here.
                Some("proof_submitted") | Some("receipt_requested") => Handshake::ProofSubmitted,
                _ => Handshake::Claimed,
            }),
        };
        if matches!(session.stage, Stage::Accepted(_)) {
            session.relay = RelayBinding::NeedsRebind;
        }
        session
    }

    pub fn handshake(&self) -> Option<Handshake> {
        match self.stage {
            Stage::Accepted(h) => Some(h),
            _ => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.stage, Stage::Accepted(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, Stage::Complete | Stage::Cancelled)
    }

    pub fn is_locked(&self) -> bool {
        self.handshake().is_some_and(|h| h.is_locked())
    }

    fn invalid(&self, action: &str) -> DormbiteError {
        DormbiteError::InvalidTransition {
            order_id: self.id,
            from: self.stage.label().to_string(),
            action: action.to_string(),
        }
    }

    fn expect_handshake(&self, expected: Handshake, action: &str) -> Result<(), DormbiteError> {
        match self.stage {
            Stage::Accepted(h) if h == expected => Ok(()),
            _ => Err(self.invalid(action)),
        }
    }

    /// Records the winner of the store-level claim.
    pub fn claim(&mut self, deliverer: UserId) -> Result<(), DormbiteError> {
        if self.stage != Stage::Pending {
            return Err(self.invalid("be claimed"));
        }
        self.deliverer = Some(deliverer);
        self.stage = Stage::Accepted(Handshake::Claimed);
        self.relay = RelayBinding::Bound { live_message: None };
        Ok(())
    }

    /// Allowed from a fresh claim and again after an acknowledged decline.
    pub fn about_to_pay(&mut self) -> Result<(), DormbiteError> {
        match self.stage {
            Stage::Accepted(Handshake::Claimed | Handshake::DeclineAcknowledged) => {
                self.stage = Stage::Accepted(Handshake::AwaitingConfirmation);
                Ok(())
            }
            _ => Err(self.invalid("signal payment")),
        }
    }

    pub fn confirm_purchase(&mut self) -> Result<(), DormbiteError> {
        self.expect_handshake(Handshake::AwaitingConfirmation, "confirm purchase")?;
        self.stage = Stage::Accepted(Handshake::Locked);
        Ok(())
    }

    pub fn decline_purchase(&mut self) -> Result<(), DormbiteError> {
        self.expect_handshake(Handshake::AwaitingConfirmation, "decline purchase")?;
        self.stage = Stage::Accepted(Handshake::PurchaseDeclined);
        Ok(())
    }

    pub fn acknowledge_decline(&mut self) -> Result<(), DormbiteError> {
        self.expect_handshake(Handshake::PurchaseDeclined, "acknowledge")?;
        self.stage = Stage::Accepted(Handshake::DeclineAcknowledged);
        Ok(())
    }

    /// Visual contact. Contract orders are settled already and go straight
    /// to completion; returns true in that case.
    pub fn seen_customer(&mut self) -> Result<bool, DormbiteError> {
        self.expect_handshake(Handshake::Locked, "confirm visual contact")?;
        if self.order_type == OrderType::Contract {
            self.stage = Stage::Complete;
            return Ok(true);
        }
        self.stage = Stage::Accepted(Handshake::AwaitingProof);
        Ok(false)
    }

    pub fn submit_proof(&mut self) -> Result<(), DormbiteError> {
        self.expect_handshake(Handshake::AwaitingProof, "accept payment proof")?;
        self.stage = Stage::Accepted(Handshake::ProofSubmitted);
        Ok(())
    }

    /// Fails unless a customer proof is waiting for verification.
    pub fn check_receipt_request(&self) -> Result<(), DormbiteError> {
        match self.stage {
            Stage::Accepted(Handshake::ProofSubmitted | Handshake::ReceiptRequested { .. }) => {
                Ok(())
            }
            _ => Err(self.invalid("request a receipt")),
        }
    }

    /// Binds the receipt request message. Pressing verify again replaces it.
    pub fn request_receipt(&mut self, request: MessageRef) -> Result<(), DormbiteError> {
        self.check_receipt_request()?;
        self.stage = Stage::Accepted(Handshake::ReceiptRequested { request });
        Ok(())
    }

    /// True when `reply_to` is this order's outstanding receipt request.
    pub fn awaits_receipt_on(&self, reply_to: i32) -> bool {
        matches!(
            self.stage,
            Stage::Accepted(Handshake::ReceiptRequested { request }) if request.message_id == reply_to
        )
    }

    pub fn complete_with_receipt(&mut self) -> Result<(), DormbiteError> {
        match self.stage {
            Stage::Accepted(Handshake::ReceiptRequested { .. }) => {
                self.stage = Stage::Complete;
                Ok(())
            }
            _ => Err(self.invalid("complete")),
        }
    }

    /// Cancellation is open until the deliverer first signals payment,
    /// whatever the customer answers afterwards.
    pub fn can_cancel(&self) -> bool {
        matches!(self.stage, Stage::Pending | Stage::Accepted(Handshake::Claimed))
    }

    pub fn cancel(&mut self) -> Result<(), DormbiteError> {
        if !self.can_cancel() {
            return Err(self.invalid("be cancelled"));
        }
        self.stage = Stage::Cancelled;
        self.relay = RelayBinding::Unbound;
        Ok(())
    }

    /// Sets the one-shot arrival flag. Returns true only the first time.
    pub fn mark_arrived(&mut self) -> bool {
        !std::mem::replace(&mut self.arrived, true)
    }

    pub fn arrived(&self) -> bool {
        self.arrived
    }

    /// Relays from `deliverer`, re-binding a recovered session on first use.
    pub fn relays_from(&mut self, deliverer: UserId) -> bool {
        if !self.is_accepted() || self.deliverer != Some(deliverer) {
            return false;
        }
        match self.relay {
            RelayBinding::Bound { .. } => true,
            RelayBinding::NeedsRebind => {
                self.relay = RelayBinding::Bound { live_message: None };
                true
            }
            RelayBinding::Unbound => false,
        }
    }

    pub fn live_message(&self) -> Option<MessageRef> {
        match self.relay {
            RelayBinding::Bound { live_message } => live_message,
            _ => None,
        }
    }

    pub fn set_live_message(&mut self, message: MessageRef) {
        if let RelayBinding::Bound { live_message } = &mut self.relay {
            *live_message = Some(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dormbite_core::types::ChatId;

    fn session(order_type: OrderType) -> OrderSession {
        OrderSession::new(OrderId(1), UserId(10), order_type, "Fle: Firfir".into())
    }

    fn msg(id: i32) -> MessageRef {
        MessageRef {
            chat: ChatId(-100),
            message_id: id,
        }
    }

    #[test]
    fn full_regular_handshake() {
        let mut s = session(OrderType::Regular);
        s.claim(UserId(20)).unwrap();
        s.about_to_pay().unwrap();
        s.confirm_purchase().unwrap();
        assert!(s.is_locked());
        assert!(!s.seen_customer().unwrap());
        s.submit_proof().unwrap();
        s.request_receipt(msg(5)).unwrap();
        assert!(s.awaits_receipt_on(5));
        assert!(!s.awaits_receipt_on(6));
        s.complete_with_receipt().unwrap();
        assert_eq!(s.stage, Stage::Complete);
    }

    #[test]
    fn contract_completes_on_visual_contact() {
        let mut s = session(OrderType::Contract);
        s.claim(UserId(20)).unwrap();
        s.about_to_pay().unwrap();
        s.confirm_purchase().unwrap();
        assert!(s.seen_customer().unwrap());
        assert_eq!(s.stage, Stage::Complete);
    }

    #[test]
    fn about_to_pay_requires_claim() {
        let mut s = session(OrderType::Regular);
        let err = s.about_to_pay().unwrap_err();
        assert!(matches!(err, DormbiteError::InvalidTransition { ref from, .. } if from == "pending"));
    }

    #[test]
    fn lock_is_irreversible() {
        let mut s = session(OrderType::Regular);
        assert!(s.can_cancel());
        s.claim(UserId(20)).unwrap();
        assert!(s.can_cancel());
        s.about_to_pay().unwrap();
        assert!(!s.can_cancel());
        s.confirm_purchase().unwrap();
        for _ in 0..3 {
            assert!(s.cancel().is_err());
        }
        s.seen_customer().unwrap();
        assert!(s.cancel().is_err());
        assert_eq!(s.handshake(), Some(Handshake::AwaitingProof));
    }

    #[test]
    fn acknowledged_decline_keeps_cancellation_closed() {
        let mut s = session(OrderType::Regular);
        s.claim(UserId(20)).unwrap();
        s.about_to_pay().unwrap();
        s.decline_purchase().unwrap();
        assert!(s.confirm_purchase().is_err());
        s.acknowledge_decline().unwrap();
        assert_eq!(s.handshake(), Some(Handshake::DeclineAcknowledged));
        assert!(!s.can_cancel());
        assert!(s.cancel().is_err());
        assert!(!s.is_locked());

        s.about_to_pay().unwrap();
        s.confirm_purchase().unwrap();
        assert!(s.is_locked());
    }

    #[test]
    fn acknowledged_decline_survives_recovery() {
        let order = Order {
            id: OrderId(9),
            customer_id: UserId(10),
            deliverer_id: Some(UserId(20)),
            restaurant: "Fle".into(),
            items: "Firfir".into(),
            total_price: 85.0,
            status: OrderStatus::Accepted,
            order_type: OrderType::Regular,
            verification_code: "1234".into(),
            pickup: None,
            delivery: None,
            customer_proof: None,
            deliverer_proof: None,
            stage: Some(Handshake::DeclineAcknowledged.label().into()),
            is_test: false,
            created_at: Utc::now(),
            completed_at: None,
            completion_point: None,
        };
        let s = OrderSession::recover(&order, String::new());
        assert_eq!(s.handshake(), Some(Handshake::DeclineAcknowledged));
        assert!(!s.can_cancel());
    }

    #[test]
    fn arrival_flag_is_one_shot() {
        let mut s = session(OrderType::Regular);
        assert!(s.mark_arrived());
        assert!(!s.mark_arrived());
        assert!(s.arrived());
    }

    #[test]
    fn second_claim_is_rejected() {
        let mut s = session(OrderType::Regular);
        s.claim(UserId(20)).unwrap();
        assert!(s.claim(UserId(30)).is_err());
        assert_eq!(s.deliverer, Some(UserId(20)));
    }

    #[test]
    fn recovered_session_rebinds_on_first_forward() {
        let order = Order {
            id: OrderId(9),
            customer_id: UserId(10),
            deliverer_id: Some(UserId(20)),
            restaurant: "Fle".into(),
            items: "Firfir".into(),
            total_price: 85.0,
            status: OrderStatus::Accepted,
            order_type: OrderType::Regular,
            verification_code: "1234".into(),
            pickup: None,
            delivery: Some(GeoPoint::new(6.0, 37.0)),
            customer_proof: None,
            deliverer_proof: None,
            stage: Some("receipt_requested".into()),
            is_test: false,
            created_at: Utc::now(),
            completed_at: None,
            completion_point: None,
        };
        let mut s = OrderSession::recover(&order, String::new());
        assert_eq!(s.handshake(), Some(Handshake::ProofSubmitted));
        assert_eq!(s.relay, RelayBinding::NeedsRebind);
        assert!(!s.relays_from(UserId(21)));
        assert!(s.relays_from(UserId(20)));
        assert_eq!(s.relay, RelayBinding::Bound { live_message: None });
        s.set_live_message(msg(3));
        assert_eq!(s.live_message(), Some(msg(3)));
    }

    #[test]
    fn stage_labels_are_stable() {
        assert_eq!(Stage::Pending.label(), "pending");
        assert_eq!(Stage::Accepted(Handshake::Locked).label(), "locked");
        assert_eq!(
            Stage::Accepted(Handshake::ReceiptRequested { request: msg(1) }).label(),
            "receipt_requested"
        );
    }
}
