// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prepaid restaurant contracts and the credit-meal cap.

use dormbite_core::DormbiteError;
use dormbite_core::types::{
    Contract, ContractOrder, ContractPaymentOutcome, MAX_CREDIT_MEALS, NewOrder, UserId,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_ts};
use crate::queries::orders::insert_order;

const SELECT_CONTRACT: &str = "SELECT customer_id, restaurant, total_paid, used, balance, credit_meals
     FROM contracts WHERE customer_id = ?1 AND restaurant = ?2";

fn contract_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contract> {
    Ok(Contract {
        customer_id: UserId(row.get(0)?),
        restaurant: row.get(1)?,
        total_paid: row.get(2)?,
        used: row.get(3)?,
        balance: row.get(4)?,
        credit_meals: row.get(5)?,
    })
}

pub async fn get_contract(
    db: &Database,
    customer: UserId,
    restaurant: &str,
) -> Result<Option<Contract>, DormbiteError> {
    let restaurant = restaurant.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(SELECT_CONTRACT, params![customer.0, restaurant], contract_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Charge one order against the contract inside a transaction.
///
/// While the balance is positive the charge is simply deducted. Once it is
/// spent, each further order consumes a credit meal; when both are exhausted
/// the charge is refused and nothing is written.
pub async fn apply_contract_payment(
    db: &Database,
    customer: UserId,
    restaurant: &str,
    amount: f64,
) -> Result<ContractPaymentOutcome, DormbiteError> {
    let restaurant = restaurant.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let outcome = charge(&tx, customer, &restaurant, amount)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Charge the contract and insert the order in one transaction, so a
/// charge never outlives a failed insert.
pub async fn place_contract_order(
    db: &Database,
    order: &NewOrder,
) -> Result<ContractOrder, DormbiteError> {
    let o = order.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let payment = charge(&tx, o.customer_id, &o.restaurant, o.total_price)?;
            let order_id = match payment {
                ContractPaymentOutcome::Applied { .. } => Some(insert_order(&tx, &o)?),
                ContractPaymentOutcome::CreditLimitReached | ContractPaymentOutcome::NoContract => {
                    None
                }
            };
            tx.commit()?;
            Ok(ContractOrder { payment, order_id })
        })
        .await
        .map_err(map_tr_err)
}

fn charge(
    conn: &rusqlite::Connection,
    customer: UserId,
    restaurant: &str,
    amount: f64,
) -> rusqlite::Result<ContractPaymentOutcome> {
    let Some(contract) = conn
        .query_row(SELECT_CONTRACT, params![customer.0, restaurant], contract_from_row)
        .optional()?
    else {
        return Ok(ContractPaymentOutcome::NoContract);
    };

    let credit_meals = if contract.balance <= 0.0 {
        if contract.credit_meals >= MAX_CREDIT_MEALS {
            return Ok(ContractPaymentOutcome::CreditLimitReached);
        }
        contract.credit_meals + 1
    } else {
        contract.credit_meals
    };
    let balance = contract.balance - amount;

    conn.execute(
        "UPDATE contracts SET balance = ?3, used = used + ?4, credit_meals = ?5,
             updated_at = ?6
         WHERE customer_id = ?1 AND restaurant = ?2",
        params![customer.0, restaurant, balance, amount, credit_meals, now_ts()],
    )?;
    Ok(ContractPaymentOutcome::Applied {
        balance,
        credit_meals,
    })
}

/// Create the contract or add `amount` to it. A positive resulting balance
/// clears the credit meals.
pub async fn top_up_contract(
    db: &Database,
    customer: UserId,
    restaurant: &str,
    amount: f64,
) -> Result<Contract, DormbiteError> {
    let restaurant = restaurant.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO contracts (customer_id, restaurant, total_paid, used, balance,
                     credit_meals, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?3, 0, ?4)
                 ON CONFLICT(customer_id, restaurant) DO UPDATE SET
                     total_paid = total_paid + excluded.total_paid,
                     balance = balance + excluded.balance,
                     credit_meals = CASE WHEN balance + excluded.balance > 0
                                         THEN 0 ELSE credit_meals END,
                     updated_at = excluded.updated_at",
                params![customer.0, restaurant, amount, now_ts()],
            )?;
            let contract =
                tx.query_row(SELECT_CONTRACT, params![customer.0, restaurant], contract_from_row)?;
            tx.commit()?;
            Ok(contract)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn no_contract_is_reported() {
        let (db, _dir) = setup_db().await;
        let outcome = apply_contract_payment(&db, UserId(1), "Fle", 50.0).await.unwrap();
        assert_eq!(outcome, ContractPaymentOutcome::NoContract);
    }

    #[tokio::test]
    async fn exactly_two_credit_meals_after_balance_runs_out() {
        let (db, _dir) = setup_db().await;
        top_up_contract(&db, UserId(1), "Fle", 100.0).await.unwrap();

        // Spends the balance down to zero: no credit meal yet.
        let first = apply_contract_payment(&db, UserId(1), "Fle", 100.0).await.unwrap();
        assert_eq!(
            first,
            ContractPaymentOutcome::Applied {
                balance: 0.0,
                credit_meals: 0
            }
        );

        for expected in 1..=2u8 {
            match apply_contract_payment(&db, UserId(1), "Fle", 60.0).await.unwrap() {
                ContractPaymentOutcome::Applied { credit_meals, .. } => {
                    assert_eq!(credit_meals, expected)
                }
                other => panic!("expected credit meal {expected}, got {other:?}"),
            }
        }

        let before = get_contract(&db, UserId(1), "Fle").await.unwrap().unwrap();
        let third = apply_contract_payment(&db, UserId(1), "Fle", 60.0).await.unwrap();
        assert_eq!(third, ContractPaymentOutcome::CreditLimitReached);
        let after = get_contract(&db, UserId(1), "Fle").await.unwrap().unwrap();
        assert_eq!(before, after, "rejected charge must not mutate the contract");
        assert!(after.is_exhausted());
    }

    #[tokio::test]
    async fn top_up_restores_ordering() {
        let (db, _dir) = setup_db().await;
        top_up_contract(&db, UserId(1), "Zebra", 50.0).await.unwrap();
        for _ in 0..3 {
            apply_contract_payment(&db, UserId(1), "Zebra", 50.0).await.unwrap();
        }
        let c = top_up_contract(&db, UserId(1), "Zebra", 500.0).await.unwrap();
        assert_eq!(c.total_paid, 550.0);
        assert_eq!(c.balance, 400.0);
        assert_eq!(c.credit_meals, 0);
        assert!(matches!(
            apply_contract_payment(&db, UserId(1), "Zebra", 50.0).await.unwrap(),
            ContractPaymentOutcome::Applied { .. }
        ));
    }

    fn contract_order(restaurant: &str, price: f64) -> NewOrder {
        NewOrder {
            customer_id: UserId(1),
            restaurant: restaurant.into(),
            items: "Firfir".into(),
            total_price: price,
            verification_code: "1234".into(),
            delivery: None,
            pickup: None,
            order_type: dormbite_core::types::OrderType::Contract,
            is_test: false,
        }
    }

    async fn order_count(db: &Database) -> i64 {
        db.connection()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0)))
            .await
            .map_err(map_tr_err)
            .unwrap()
    }

    #[tokio::test]
    async fn contract_order_charges_and_inserts_together() {
        let (db, _dir) = setup_db().await;
        top_up_contract(&db, UserId(1), "Fle", 100.0).await.unwrap();

        let placed = place_contract_order(&db, &contract_order("Fle", 85.0)).await.unwrap();
        assert!(placed.order_id.is_some());
        assert_eq!(
            placed.payment,
            ContractPaymentOutcome::Applied {
                balance: 15.0,
                credit_meals: 0
            }
        );
        assert_eq!(order_count(&db).await, 1);

        let missing = place_contract_order(&db, &contract_order("Zebra", 85.0)).await.unwrap();
        assert_eq!(missing.payment, ContractPaymentOutcome::NoContract);
        assert_eq!(missing.order_id, None);
        assert_eq!(order_count(&db).await, 1);
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_the_charge() {
        let (db, _dir) = setup_db().await;
        top_up_contract(&db, UserId(1), "Fle", 100.0).await.unwrap();
        let before = get_contract(&db, UserId(1), "Fle").await.unwrap().unwrap();

        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_orders BEFORE INSERT ON orders
                     BEGIN SELECT RAISE(ABORT, 'orders closed'); END;",
                )
            })
            .await
            .map_err(map_tr_err)
            .unwrap();
        assert!(place_contract_order(&db, &contract_order("Fle", 85.0)).await.is_err());

        let after = get_contract(&db, UserId(1), "Fle").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn contracts_are_per_restaurant() {
        let (db, _dir) = setup_db().await;
        top_up_contract(&db, UserId(1), "Fle", 100.0).await.unwrap();
        assert!(get_contract(&db, UserId(1), "Zebra").await.unwrap().is_none());
    }
}
