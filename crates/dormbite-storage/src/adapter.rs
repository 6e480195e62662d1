// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`Store`] trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use dormbite_config::model::StorageConfig;
use dormbite_core::types::{
    ChangeSet, ChatId, Contract, ContractOrder, ContractPaymentOutcome, Customer, FileRef,
    GeoPoint, NewOrder, Order, OrderId, OrderStatus, Position, Rating, RegistrationRecord, UserId,
};
use dormbite_core::{AdapterType, DormbiteError, HealthStatus, PluginAdapter, Store};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened by [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured path without opening it yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), DormbiteError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| DormbiteError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Checkpoint the WAL before the process exits.
    pub async fn close(&self) -> Result<(), DormbiteError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// The underlying database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, DormbiteError> {
        self.db.get().ok_or_else(|| DormbiteError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DormbiteError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DormbiteError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    // --- Customers ---

    async fn upsert_customer(
        &self,
        record: &RegistrationRecord,
    ) -> Result<ChangeSet, DormbiteError> {
        queries::customers::upsert_customer(self.db()?, record).await
    }

    async fn get_customer(&self, id: UserId) -> Result<Option<Customer>, DormbiteError> {
        queries::customers::get_customer(self.db()?, id).await
    }

    async fn set_deliverer(&self, id: UserId, is_deliverer: bool) -> Result<(), DormbiteError> {
        queries::customers::set_deliverer(self.db()?, id, is_deliverer).await
    }

    async fn ban_customer(&self, id: UserId) -> Result<(), DormbiteError> {
        queries::customers::ban_customer(self.db()?, id).await
    }

    async fn archive_customer(&self, id: UserId) -> Result<bool, DormbiteError> {
        queries::customers::archive_customer(self.db()?, id).await
    }

    // --- Orders ---

    async fn create_order(&self, order: &NewOrder) -> Result<OrderId, DormbiteError> {
        queries::orders::create_order(self.db()?, order).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, DormbiteError> {
        queries::orders::get_order(self.db()?, id).await
    }

    async fn claim_order(&self, id: OrderId, deliverer: UserId) -> Result<bool, DormbiteError> {
        queries::orders::claim_order(self.db()?, id, deliverer).await
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), DormbiteError> {
        queries::orders::set_order_status(self.db()?, id, status).await
    }

    async fn set_order_stage(
        &self,
        id: OrderId,
        stage: Option<&str>,
    ) -> Result<(), DormbiteError> {
        queries::orders::set_order_stage(self.db()?, id, stage).await
    }

    async fn complete_order(
        &self,
        id: OrderId,
        location: Option<GeoPoint>,
    ) -> Result<(), DormbiteError> {
        queries::orders::complete_order(self.db()?, id, location).await
    }

    async fn active_orders_for(&self, customer: UserId) -> Result<Vec<OrderId>, DormbiteError> {
        queries::orders::active_orders_for(self.db()?, customer).await
    }

    async fn active_orders(&self) -> Result<Vec<Order>, DormbiteError> {
        queries::orders::active_orders(self.db()?).await
    }

    async fn update_order_location(
        &self,
        id: OrderId,
        point: GeoPoint,
    ) -> Result<(), DormbiteError> {
        queries::orders::update_order_location(self.db()?, id, point).await
    }

    async fn set_customer_proof(&self, id: OrderId, file: &FileRef) -> Result<(), DormbiteError> {
        queries::orders::set_customer_proof(self.db()?, id, file).await
    }

    async fn set_deliverer_proof(
        &self,
        id: OrderId,
        file: &FileRef,
    ) -> Result<(), DormbiteError> {
        queries::orders::set_deliverer_proof(self.db()?, id, file).await
    }

    async fn reset_in_flight_orders(&self) -> Result<usize, DormbiteError> {
        queries::orders::reset_in_flight_orders(self.db()?).await
    }

    // --- Ratings ---

    async fn save_rating(&self, rating: &Rating) -> Result<bool, DormbiteError> {
        queries::ratings::save_rating(self.db()?, rating).await
    }

    // --- Contracts ---

    async fn get_contract(
        &self,
        customer: UserId,
        restaurant: &str,
    ) -> Result<Option<Contract>, DormbiteError> {
        queries::contracts::get_contract(self.db()?, customer, restaurant).await
    }

    async fn apply_contract_payment(
        &self,
        customer: UserId,
        restaurant: &str,
        amount: f64,
    ) -> Result<ContractPaymentOutcome, DormbiteError> {
        queries::contracts::apply_contract_payment(self.db()?, customer, restaurant, amount).await
    }

    async fn place_contract_order(
        &self,
        order: &NewOrder,
    ) -> Result<ContractOrder, DormbiteError> {
        queries::contracts::place_contract_order(self.db()?, order).await
    }

    async fn top_up_contract(
        &self,
        customer: UserId,
        restaurant: &str,
        amount: f64,
    ) -> Result<Contract, DormbiteError> {
        queries::contracts::top_up_contract(self.db()?, customer, restaurant, amount).await
    }

    // --- Menu availability ---

    async fn toggle_item_availability(
        &self,
        restaurant: &str,
        item: &str,
    ) -> Result<bool, DormbiteError> {
        queries::menu::toggle_item_availability(self.db()?, restaurant, item).await
    }

    async fn unavailable_items(&self, restaurant: &str) -> Result<Vec<String>, DormbiteError> {
        queries::menu::unavailable_items(self.db()?, restaurant).await
    }

    // --- Positions and audit ---

    async fn record_position(
        &self,
        user: UserId,
        position: Position,
    ) -> Result<(), DormbiteError> {
        queries::positions::record_position(self.db()?, user, position).await
    }

    async fn latest_position(&self, user: UserId) -> Result<Option<Position>, DormbiteError> {
        queries::positions::latest_position(self.db()?, user).await
    }

    async fn log_suspicious_access(
        &self,
        actor: UserId,
        chat: ChatId,
        action: &str,
    ) -> Result<(), DormbiteError> {
        queries::moderation::log_suspicious_access(self.db()?, actor, chat, action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_store_identity() {
        let store = SqliteStore::new(make_config("unused.db"));
        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn uninitialized_store_reports_unhealthy_and_errors() {
        let store = SqliteStore::new(make_config("unused.db"));
        assert!(matches!(
            store.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        assert!(store.get_order(OrderId(1)).await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let store = SqliteStore::new(make_config(path.to_str().unwrap()));
        store.initialize().await.unwrap();
        assert!(path.exists());
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(store.initialize().await.is_err());
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn store_trait_object_claims_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let store = SqliteStore::new(make_config(path.to_str().unwrap()));
        store.initialize().await.unwrap();
        let store: &dyn Store = &store;

        let id = store
            .create_order(&NewOrder {
                customer_id: UserId(1),
                restaurant: "Fle".into(),
                items: "Shiro".into(),
                total_price: 65.0,
                verification_code: "9999".into(),
                delivery: None,
                pickup: None,
                order_type: Default::default(),
                is_test: true,
            })
            .await
            .unwrap();
        assert!(store.claim_order(id, UserId(42)).await.unwrap());
        assert!(!store.claim_order(id, UserId(43)).await.unwrap());
        assert!(store.get_order(id).await.unwrap().unwrap().is_test);
    }
}
