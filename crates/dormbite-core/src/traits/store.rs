// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence capability consumed by the engine.

use async_trait::async_trait;

use crate::error::DormbiteError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChangeSet, ChatId, Contract, ContractOrder, ContractPaymentOutcome, Customer, FileRef,
    GeoPoint, NewOrder, Order, OrderId, OrderStatus, Position, Rating, RegistrationRecord, UserId,
};

/// Durable storage for customers, orders, contracts, ratings and positions.
#[async_trait]
pub trait Store: PluginAdapter {
    // --- Customers ---

    /// Creates or updates a customer. Changes to name or phone append a
    /// history row and are reported in the returned [`ChangeSet`].
    async fn upsert_customer(&self, record: &RegistrationRecord)
    -> Result<ChangeSet, DormbiteError>;

    async fn get_customer(&self, id: UserId) -> Result<Option<Customer>, DormbiteError>;

    async fn set_deliverer(&self, id: UserId, is_deliverer: bool) -> Result<(), DormbiteError>;

    async fn ban_customer(&self, id: UserId) -> Result<(), DormbiteError>;

    /// Moves the customer row to the quarantine table. Returns false if no
    /// such customer exists.
    async fn archive_customer(&self, id: UserId) -> Result<bool, DormbiteError>;

    // --- Orders ---

    async fn create_order(&self, order: &NewOrder) -> Result<OrderId, DormbiteError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, DormbiteError>;

    /// Atomically binds a deliverer to an unclaimed, uncancelled order.
    /// Returns false when someone else already holds it.
    async fn claim_order(&self, id: OrderId, deliverer: UserId) -> Result<bool, DormbiteError>;

    async fn set_order_status(&self, id: OrderId, status: OrderStatus)
    -> Result<(), DormbiteError>;

    /// Persists the handshake stage label for restart recovery.
    async fn set_order_stage(&self, id: OrderId, stage: Option<&str>)
    -> Result<(), DormbiteError>;

    /// Marks the order complete with a timestamp and the deliverer's last position.
    async fn complete_order(
        &self,
        id: OrderId,
        location: Option<GeoPoint>,
    ) -> Result<(), DormbiteError>;

    /// Pending or accepted orders owned by the customer.
    async fn active_orders_for(&self, customer: UserId) -> Result<Vec<OrderId>, DormbiteError>;

    /// Every pending or accepted order.
    async fn active_orders(&self) -> Result<Vec<Order>, DormbiteError>;

    async fn update_order_location(
        &self,
        id: OrderId,
        point: GeoPoint,
    ) -> Result<(), DormbiteError>;

    async fn set_customer_proof(&self, id: OrderId, file: &FileRef) -> Result<(), DormbiteError>;

    async fn set_deliverer_proof(&self, id: OrderId, file: &FileRef)
    -> Result<(), DormbiteError>;

    /// Cancels every in-flight order. Returns how many were cancelled.
    async fn reset_in_flight_orders(&self) -> Result<usize, DormbiteError>;

    // --- Ratings ---

    /// Stores a rating. Returns false if the order was already rated.
    async fn save_rating(&self, rating: &Rating) -> Result<bool, DormbiteError>;

    // --- Contracts ---

    async fn get_contract(
        &self,
        customer: UserId,
        restaurant: &str,
    ) -> Result<Option<Contract>, DormbiteError>;

    /// Charges `amount` against the contract, allowing at most
    /// [`crate::types::MAX_CREDIT_MEALS`] meals once the balance is spent.
    /// A rejected charge leaves the contract untouched.
    async fn apply_contract_payment(
        &self,
        customer: UserId,
        restaurant: &str,
        amount: f64,
    ) -> Result<ContractPaymentOutcome, DormbiteError>;

    /// Charges the order's total to the customer's contract and inserts
    /// the order in the same transaction. Nothing is written unless the
    /// charge is applied.
    async fn place_contract_order(&self, order: &NewOrder) -> Result<ContractOrder, DormbiteError>;

    /// Creates the contract or adds `amount` to it, clearing credit meals.
    async fn top_up_contract(
        &self,
        customer: UserId,
        restaurant: &str,
        amount: f64,
    ) -> Result<Contract, DormbiteError>;

    // --- Menu availability ---

    /// Flips the sold-out flag. Returns true when the item is now unavailable.
    async fn toggle_item_availability(
        &self,
        restaurant: &str,
        item: &str,
    ) -> Result<bool, DormbiteError>;

    async fn unavailable_items(&self, restaurant: &str) -> Result<Vec<String>, DormbiteError>;

    // --- Positions and audit ---

    async fn record_position(&self, user: UserId, position: Position)
    -> Result<(), DormbiteError>;

    async fn latest_position(&self, user: UserId) -> Result<Option<Position>, DormbiteError>;

    async fn log_suspicious_access(
        &self,
        actor: UserId,
        chat: ChatId,
        action: &str,
    ) -> Result<(), DormbiteError>;
}
