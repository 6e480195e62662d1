// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the store, the messenger and the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Platform identity of a person (customer or deliverer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Identity of a chat. Private chats share the numeric value of their user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Store-assigned order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl UserId {
    /// The private chat with this user.
    pub fn chat(self) -> ChatId {
        ChatId(self.0)
    }
}

/// Handle to a message that was sent and may later be edited or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat: ChatId,
    pub message_id: i32,
}

/// Opaque reference to an uploaded file (a photo) on the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef(pub String);

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A position reported by a user at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub point: GeoPoint,
    pub at: DateTime<Utc>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
}

// --- Customers ---

/// Interface language chosen at the start of registration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    Amharic,
}

/// Gender, asked only for residence areas that split blocks by gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// A registered customer. Deliverers are customers with `is_deliverer` set.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: UserId,
    pub name: String,
    pub handle: Option<String>,
    pub institutional_id: String,
    pub block: String,
    pub dorm: String,
    pub phone: String,
    pub language: Language,
    pub gender: Option<Gender>,
    pub location: Option<GeoPoint>,
    pub is_deliverer: bool,
    pub is_banned: bool,
    pub balance: f64,
    pub tokens: i64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Name shown to other parties, preferring the platform handle.
    pub fn display(&self) -> String {
        match &self.handle {
            Some(h) => format!("{} (@{h})", self.name),
            None => self.name.clone(),
        }
    }
}

/// The fields collected by a completed registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRecord {
    pub id: UserId,
    pub name: String,
    pub handle: Option<String>,
    pub institutional_id: String,
    pub block: String,
    pub dorm: String,
    pub phone: String,
    pub language: Language,
    pub gender: Option<Gender>,
    pub location: Option<GeoPoint>,
}

/// One field that changed on re-registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub old: String,
    pub new: String,
}

/// Result of upserting a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// The row did not exist before.
    pub created: bool,
    /// Tracked fields (name, phone) that differ from the prior row.
    pub changed: Vec<FieldChange>,
}

// --- Orders ---

/// Persisted order status. Handshake progress lives in the session stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Complete,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

/// Whether the order is paid per-delivery or settled against a contract.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum OrderType {
    #[default]
    Regular,
    Contract,
}

/// A stored order row.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub deliverer_id: Option<UserId>,
    pub restaurant: String,
    pub items: String,
    pub total_price: f64,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub verification_code: String,
    pub pickup: Option<GeoPoint>,
    pub delivery: Option<GeoPoint>,
    pub customer_proof: Option<FileRef>,
    pub deliverer_proof: Option<FileRef>,
    /// Serialized handshake stage, kept for restart recovery.
    pub stage: Option<String>,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_point: Option<GeoPoint>,
}

/// Input for creating an order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_id: UserId,
    pub restaurant: String,
    pub items: String,
    pub total_price: f64,
    pub verification_code: String,
    pub delivery: Option<GeoPoint>,
    pub pickup: Option<GeoPoint>,
    pub order_type: OrderType,
    pub is_test: bool,
}

// --- Contracts and ratings ---

/// Meals that may be taken on credit once the balance is exhausted.
pub const MAX_CREDIT_MEALS: u8 = 2;

/// A customer's prepaid subscription with one restaurant.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub customer_id: UserId,
    pub restaurant: String,
    pub total_paid: f64,
    pub used: f64,
    pub balance: f64,
    pub credit_meals: u8,
}

impl Contract {
    /// True when no further contract orders may be placed until top-up.
    pub fn is_exhausted(&self) -> bool {
        self.balance <= 0.0 && self.credit_meals >= MAX_CREDIT_MEALS
    }
}

/// Outcome of charging a contract for one order.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractPaymentOutcome {
    Applied { balance: f64, credit_meals: u8 },
    CreditLimitReached,
    NoContract,
}

/// Result of placing a contract order: the charge, and the new order when
/// the charge went through.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractOrder {
    pub payment: ContractPaymentOutcome,
    pub order_id: Option<OrderId>,
}

/// A customer's score for a completed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    pub order_id: OrderId,
    pub value: u8,
    pub comment: Option<String>,
}

// --- Messaging ---

/// An inline button bound to an opaque callback token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// A button on the reply keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyButton {
    pub text: String,
    /// Pressing the button shares the user's location.
    pub request_location: bool,
}

impl KeyButton {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_location: false,
        }
    }

    pub fn location(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_location: true,
        }
    }
}

/// Controls attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// Inline buttons, one inner `Vec` per row.
    Inline(Vec<Vec<Button>>),
    /// Reply keyboard, one inner `Vec` per row.
    Keyboard(Vec<Vec<KeyButton>>),
    /// Remove any reply keyboard.
    RemoveKeyboard,
}

impl Markup {
    /// Every callback token carried by inline buttons, in row order.
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            Markup::Inline(rows) => rows
                .iter()
                .flat_map(|r| r.iter().map(|b| b.token.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Every reply keyboard label, in row order.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Markup::Keyboard(rows) => rows
                .iter()
                .flat_map(|r| r.iter().map(|b| b.text.as_str()))
                .collect(),
            Markup::Inline(rows) => rows
                .iter()
                .flat_map(|r| r.iter().map(|b| b.label.as_str()))
                .collect(),
            Markup::RemoveKeyboard => Vec::new(),
        }
    }
}

/// The user behind an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub handle: Option<String>,
    pub display_name: String,
}

/// What an inbound event carries.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Text(String),
    Command {
        name: String,
        args: String,
    },
    Location {
        point: GeoPoint,
        /// The share is a continuously updating live location.
        live: bool,
        /// Delivered as an edit of an earlier live-location message.
        edited: bool,
    },
    Photo {
        file: FileRef,
        /// Message id this photo replies to, if any.
        reply_to: Option<i32>,
    },
    Callback {
        id: String,
        data: String,
        message: Option<MessageRef>,
    },
}

/// A normalized inbound chat event.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub chat: ChatId,
    pub sender: Sender,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn order_status_round_trips_as_snake_case() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Accepted,
            OrderStatus::Complete,
            OrderStatus::Cancelled,
        ] {
            let s = status.to_string();
            assert_eq!(s, s.to_lowercase());
            assert_eq!(OrderStatus::from_str(&s).unwrap(), status);
        }
        assert!(OrderStatus::Complete.is_terminal());
        assert!(!OrderStatus::Accepted.is_terminal());
    }

    #[test]
    fn contract_exhaustion_needs_both_conditions() {
        let mut c = Contract {
            customer_id: UserId(1),
            restaurant: "Fle".into(),
            total_paid: 500.0,
            used: 500.0,
            balance: 0.0,
            credit_meals: 1,
        };
        assert!(!c.is_exhausted());
        c.credit_meals = MAX_CREDIT_MEALS;
        assert!(c.is_exhausted());
        c.balance = 10.0;
        assert!(!c.is_exhausted());
    }

    #[test]
    fn markup_tokens_flatten_rows() {
        let m = Markup::Inline(vec![
            vec![Button::new("A", "a"), Button::new("B", "b")],
            vec![Button::new("C", "c")],
        ]);
        assert_eq!(m.tokens(), vec!["a", "b", "c"]);
        assert!(Markup::RemoveKeyboard.tokens().is_empty());
    }

    #[test]
    fn order_id_display_has_hash() {
        assert_eq!(OrderId(42).to_string(), "#42");
        assert_eq!(UserId(7).chat(), ChatId(7));
    }

    #[test]
    fn language_serializes() {
        let json = serde_json::to_string(&Language::Amharic).unwrap();
        let parsed: Language = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Language::Amharic);
    }
}
