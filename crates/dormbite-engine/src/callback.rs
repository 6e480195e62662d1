// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque callback tokens carried by inline buttons.
//!
//! Tokens are short `tag:arg[:arg]` strings so they fit the platform's
//! 64-byte callback data limit.

use std::fmt;
use std::str::FromStr;

use dormbite_core::OrderId;

/// What a button press asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Dispatch chat.
    Accept(OrderId),
    RequestLocation(OrderId),
    ForceArrival(OrderId),
    AboutToPay(OrderId),
    SeenCustomer(OrderId),
    VerifyProof(OrderId),
    /// Asks the dispatch chat to confirm; cancels nothing by itself.
    AdminCancel(OrderId),
    AdminCancelConfirm(OrderId),
    AdminCancelKeep(OrderId),
    PinAccept(u64),
    PinReject(u64),
    RecoveryReset,
    RecoveryResume,
    // Customer.
    ConfirmPurchase(OrderId),
    CancelPurchase(OrderId),
    AckDecline(OrderId),
    CancelRequest(OrderId),
    CancelConfirm(OrderId),
    CancelKeep(OrderId),
    Rate(OrderId, u8),
}

impl Action {
    /// Actions that may only be pressed inside the dispatch chat.
    pub fn is_dispatch_action(&self) -> bool {
        matches!(
            self,
            Action::Accept(_)
                | Action::RequestLocation(_)
                | Action::ForceArrival(_)
                | Action::AboutToPay(_)
                | Action::SeenCustomer(_)
                | Action::VerifyProof(_)
                | Action::AdminCancel(_)
                | Action::AdminCancelConfirm(_)
                | Action::AdminCancelKeep(_)
                | Action::PinAccept(_)
                | Action::PinReject(_)
                | Action::RecoveryReset
                | Action::RecoveryResume
        )
    }

    /// The order the action targets, if any.
    pub fn order(&self) -> Option<OrderId> {
        match *self {
            Action::Accept(o)
            | Action::RequestLocation(o)
            | Action::ForceArrival(o)
            | Action::AboutToPay(o)
            | Action::SeenCustomer(o)
            | Action::VerifyProof(o)
            | Action::AdminCancel(o)
            | Action::AdminCancelConfirm(o)
            | Action::AdminCancelKeep(o)
            | Action::ConfirmPurchase(o)
            | Action::CancelPurchase(o)
            | Action::AckDecline(o)
            | Action::CancelRequest(o)
            | Action::CancelConfirm(o)
            | Action::CancelKeep(o)
            | Action::Rate(o, _) => Some(o),
            Action::PinAccept(_)
            | Action::PinReject(_)
            | Action::RecoveryReset
            | Action::RecoveryResume => None,
        }
    }

    /// Token tag without arguments; bounded, so usable as a metric label.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::Accept(_) => "acc",
            Action::RequestLocation(_) => "loc",
            Action::ForceArrival(_) => "arr",
            Action::AboutToPay(_) => "pay",
            Action::SeenCustomer(_) => "seen",
            Action::VerifyProof(_) => "vrf",
            Action::AdminCancel(_) => "acx",
            Action::AdminCancelConfirm(_) => "acy",
            Action::AdminCancelKeep(_) => "acn",
            Action::PinAccept(_) => "pin+",
            Action::PinReject(_) => "pin-",
            Action::RecoveryReset | Action::RecoveryResume => "rst",
            Action::ConfirmPurchase(_) => "cfm",
            Action::CancelPurchase(_) => "dcl",
            Action::AckDecline(_) => "ack",
            Action::CancelRequest(_) => "cxl",
            Action::CancelConfirm(_) => "cxy",
            Action::CancelKeep(_) => "cxn",
            Action::Rate(_, _) => "rate",
        }
    }

    /// Human label for logs and audit rows.
    pub fn describe(&self) -> String {
        let verb = match self {
            Action::Accept(_) => "accept",
            Action::RequestLocation(_) => "request location for",
            Action::ForceArrival(_) => "force arrival on",
            Action::AboutToPay(_) => "signal payment for",
            Action::SeenCustomer(_) => "confirm visual contact on",
            Action::VerifyProof(_) => "verify proof of",
            Action::AdminCancel(_) | Action::AdminCancelConfirm(_) | Action::AdminCancelKeep(_) => {
                "cancel"
            }
            Action::PinAccept(_) | Action::PinReject(_) => "verify a location pin",
            Action::RecoveryReset | Action::RecoveryResume => "answer the restart prompt",
            Action::ConfirmPurchase(_) => "confirm purchase of",
            Action::CancelPurchase(_) => "decline purchase of",
            Action::AckDecline(_) => "acknowledge",
            Action::CancelRequest(_) | Action::CancelConfirm(_) | Action::CancelKeep(_) => {
                "cancel"
            }
            Action::Rate(_, _) => "rate",
        };
        match self.order() {
            Some(order) => format!("{verb} order {order}"),
            None => verb.to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        match self {
            Action::PinAccept(p) | Action::PinReject(p) => write!(f, "{tag}:{p}"),
            Action::RecoveryReset => f.write_str("rst:reset"),
            Action::RecoveryResume => f.write_str("rst:resume"),
            Action::Rate(o, v) => write!(f, "{tag}:{}:{v}", o.0),
            _ => match self.order() {
                Some(o) => write!(f, "{tag}:{}", o.0),
                None => f.write_str(tag),
            },
        }
    }
}

/// A callback token that does not name a known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown callback token `{0}`")]
pub struct UnknownToken(pub String);

impl FromStr for Action {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownToken(s.to_string());
        let (tag, rest) = s.split_once(':').ok_or_else(unknown)?;
        let order = || rest.parse::<i64>().map(OrderId).map_err(|_| unknown());
        let pin = || rest.parse::<u64>().map_err(|_| unknown());

        Ok(match tag {
            "acc" => Action::Accept(order()?),
            "loc" => Action::RequestLocation(order()?),
            "arr" => Action::ForceArrival(order()?),
            "pay" => Action::AboutToPay(order()?),
            "seen" => Action::SeenCustomer(order()?),
            "vrf" => Action::VerifyProof(order()?),
            "acx" => Action::AdminCancel(order()?),
            "acy" => Action::AdminCancelConfirm(order()?),
            "acn" => Action::AdminCancelKeep(order()?),
            "pin+" => Action::PinAccept(pin()?),
            "pin-" => Action::PinReject(pin()?),
            "rst" => match rest {
                "reset" => Action::RecoveryReset,
                "resume" => Action::RecoveryResume,
                _ => return Err(unknown()),
            },
            "cfm" => Action::ConfirmPurchase(order()?),
            "dcl" => Action::CancelPurchase(order()?),
            "ack" => Action::AckDecline(order()?),
            "cxl" => Action::CancelRequest(order()?),
            "cxy" => Action::CancelConfirm(order()?),
            "cxn" => Action::CancelKeep(order()?),
            "rate" => {
                let (id, value) = rest.split_once(':').ok_or_else(unknown)?;
                let id = id.parse::<i64>().map_err(|_| unknown())?;
                let value = value.parse::<u8>().map_err(|_| unknown())?;
                if !(1..=10).contains(&value) {
                    return Err(unknown());
                }
                Action::Rate(OrderId(id), value)
            }
            _ => return Err(unknown()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_back() {
        let samples = [
            Action::Accept(OrderId(42)),
            Action::SeenCustomer(OrderId(7)),
            Action::PinReject(9),
            Action::AdminCancelConfirm(OrderId(5)),
            Action::AdminCancelKeep(OrderId(5)),
            Action::RecoveryResume,
            Action::Rate(OrderId(3), 10),
        ];
        for action in samples {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
        assert_eq!(Action::Accept(OrderId(42)).to_string(), "acc:42");
    }

    #[test]
    fn malformed_tokens_rejected() {
        for bad in ["", "acc", "acc:x", "rate:3", "rate:3:11", "rate:3:0", "zzz:1", "rst:maybe"] {
            assert!(bad.parse::<Action>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn dispatch_actions_are_classified() {
        assert!(Action::Accept(OrderId(1)).is_dispatch_action());
        assert!(Action::RecoveryReset.is_dispatch_action());
        assert!(Action::AdminCancelConfirm(OrderId(1)).is_dispatch_action());
        assert!(Action::AdminCancelKeep(OrderId(1)).is_dispatch_action());
        assert!(!Action::ConfirmPurchase(OrderId(1)).is_dispatch_action());
        assert!(!Action::Rate(OrderId(1), 5).is_dispatch_action());
    }

    #[test]
    fn tag_carries_no_order_id() {
        assert_eq!(Action::AdminCancel(OrderId(981)).tag(), "acx");
        assert_eq!(Action::Rate(OrderId(3), 7).tag(), "rate");
        assert!(!Action::Accept(OrderId(77)).tag().contains("77"));
    }

    #[test]
    fn unknown_token_error_names_the_token() {
        let err = "zzz:1".parse::<Action>().unwrap_err();
        assert_eq!(err, UnknownToken("zzz:1".to_string()));
        assert_eq!(err.to_string(), "unknown callback token `zzz:1`");
    }

    #[test]
    fn tokens_fit_callback_limit() {
        let longest = Action::Rate(OrderId(i64::MAX), 10).to_string();
        assert!(longest.len() <= 64);
    }
}
