// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order rows: creation, the atomic claim, status, proofs, and recovery.

use dormbite_core::DormbiteError;
use dormbite_core::types::{
    FileRef, GeoPoint, NewOrder, Order, OrderId, OrderStatus, UserId,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_ts, parse_text, parse_ts};

const ORDER_COLUMNS: &str = "order_id, customer_id, deliverer_id, restaurant, items, total_price,
     status, order_type, verification_code, pickup_lat, pickup_lon, delivery_lat, delivery_lon,
     customer_proof, deliverer_proof, stage, is_test, created_at, completed_at,
     completion_lat, completion_lon";

fn point(lat: Option<f64>, lon: Option<f64>) -> Option<GeoPoint> {
    lat.zip(lon).map(|(lat, lon)| GeoPoint::new(lat, lon))
}

fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let deliverer: Option<i64> = row.get(2)?;
    let status: String = row.get(6)?;
    let order_type: String = row.get(7)?;
    let created_at: String = row.get(17)?;
    let completed_at: Option<String> = row.get(18)?;
    Ok(Order {
        id: OrderId(row.get(0)?),
        customer_id: UserId(row.get(1)?),
        // Legacy rows used 0 for "unassigned".
        deliverer_id: deliverer.filter(|d| *d != 0).map(UserId),
        restaurant: row.get(3)?,
        items: row.get(4)?,
        total_price: row.get(5)?,
        status: parse_text(6, &status)?,
        order_type: parse_text(7, &order_type)?,
        verification_code: row.get(8)?,
        pickup: point(row.get(9)?, row.get(10)?),
        delivery: point(row.get(11)?, row.get(12)?),
        customer_proof: row.get::<_, Option<String>>(13)?.map(FileRef),
        deliverer_proof: row.get::<_, Option<String>>(14)?.map(FileRef),
        stage: row.get(15)?,
        is_test: row.get(16)?,
        created_at: parse_ts(17, &created_at)?,
        completed_at: completed_at.as_deref().map(|t| parse_ts(18, t)).transpose()?,
        completion_point: point(row.get(19)?, row.get(20)?),
    })
}

/// Insert a pending order. Returns the store-assigned id.
pub async fn create_order(db: &Database, order: &NewOrder) -> Result<OrderId, DormbiteError> {
    let o = order.clone();
    db.connection()
        .call(move |conn| insert_order(conn, &o))
        .await
        .map_err(map_tr_err)
}

/// The bare insert, usable inside a caller's transaction.
pub(crate) fn insert_order(
    conn: &rusqlite::Connection,
    o: &NewOrder,
) -> rusqlite::Result<OrderId> {
    conn.execute(
        "INSERT INTO orders (customer_id, restaurant, items, total_price, order_type,
             verification_code, pickup_lat, pickup_lon, delivery_lat, delivery_lon,
             is_test, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            o.customer_id.0,
            o.restaurant,
            o.items,
            o.total_price,
            o.order_type.to_string(),
            o.verification_code,
            o.pickup.map(|p| p.lat),
            o.pickup.map(|p| p.lon),
            o.delivery.map(|p| p.lat),
            o.delivery.map(|p| p.lon),
            o.is_test,
            now_ts()
        ],
    )?;
    Ok(OrderId(conn.last_insert_rowid()))
}

/// Fetch one order.
pub async fn get_order(db: &Database, id: OrderId) -> Result<Option<Order>, DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
                params![id.0],
                order_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Bind `deliverer` to the order if nobody holds it yet.
///
/// A single conditional UPDATE: concurrent claims race inside SQLite and
/// exactly one sees a changed row.
pub async fn claim_order(
    db: &Database,
    id: OrderId,
    deliverer: UserId,
) -> Result<bool, DormbiteError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE orders SET deliverer_id = ?2, status = 'accepted'
                 WHERE order_id = ?1
                   AND (deliverer_id IS NULL OR deliverer_id = 0)
                   AND status NOT IN ('cancelled', 'complete')",
                params![id.0, deliverer.0],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

async fn execute_on_order(
    db: &Database,
    id: OrderId,
    sql: &'static str,
    value: Option<String>,
) -> Result<(), DormbiteError> {
    let changed = db
        .connection()
        .call(move |conn| conn.execute(sql, params![id.0, value]))
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(DormbiteError::OrderNotFound(id));
    }
    Ok(())
}

/// Overwrite the status column. Terminal statuses also clear the stage.
pub async fn set_order_status(
    db: &Database,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), DormbiteError> {
    let sql = if status.is_terminal() {
        "UPDATE orders SET status = ?2, stage = NULL WHERE order_id = ?1"
    } else {
        "UPDATE orders SET status = ?2 WHERE order_id = ?1"
    };
    execute_on_order(db, id, sql, Some(status.to_string())).await
}

/// Persist the handshake stage label.
pub async fn set_order_stage(
    db: &Database,
    id: OrderId,
    stage: Option<&str>,
) -> Result<(), DormbiteError> {
    execute_on_order(
        db,
        id,
        "UPDATE orders SET stage = ?2 WHERE order_id = ?1",
        stage.map(str::to_string),
    )
    .await
}

/// Mark the order complete, stamping the time and optional final position.
pub async fn complete_order(
    db: &Database,
    id: OrderId,
    location: Option<GeoPoint>,
) -> Result<(), DormbiteError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE orders SET status = 'complete', stage = NULL, completed_at = ?2,
                     completion_lat = ?3, completion_lon = ?4
                 WHERE order_id = ?1",
                params![
                    id.0,
                    now_ts(),
                    location.map(|p| p.lat),
                    location.map(|p| p.lon)
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(DormbiteError::OrderNotFound(id));
    }
    Ok(())
}

/// Ids of the customer's pending or accepted orders, oldest first.
pub async fn active_orders_for(
    db: &Database,
    customer: UserId,
) -> Result<Vec<OrderId>, DormbiteError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT order_id FROM orders
                 WHERE customer_id = ?1 AND status IN ('pending', 'accepted')
                 ORDER BY order_id ASC",
            )?;
            let rows = stmt.query_map(params![customer.0], |row| Ok(OrderId(row.get(0)?)))?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Every pending or accepted order, oldest first.
pub async fn active_orders(db: &Database) -> Result<Vec<Order>, DormbiteError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders
                 WHERE status IN ('pending', 'accepted')
                 ORDER BY order_id ASC"
            ))?;
            let rows = stmt.query_map([], order_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Move the delivery point of an order.
pub async fn update_order_location(
    db: &Database,
    id: OrderId,
    point: GeoPoint,
) -> Result<(), DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE orders SET delivery_lat = ?2, delivery_lon = ?3 WHERE order_id = ?1",
                params![id.0, point.lat, point.lon],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_customer_proof(
    db: &Database,
    id: OrderId,
    file: &FileRef,
) -> Result<(), DormbiteError> {
    execute_on_order(
        db,
        id,
        "UPDATE orders SET customer_proof = ?2 WHERE order_id = ?1",
        Some(file.0.clone()),
    )
    .await
}

pub async fn set_deliverer_proof(
    db: &Database,
    id: OrderId,
    file: &FileRef,
) -> Result<(), DormbiteError> {
    execute_on_order(
        db,
        id,
        "UPDATE orders SET deliverer_proof = ?2 WHERE order_id = ?1",
        Some(file.0.clone()),
    )
    .await
}

/// Cancel every pending or accepted order. Returns the number cancelled.
pub async fn reset_in_flight_orders(db: &Database) -> Result<usize, DormbiteError> {
    db.connection()
        .call(|conn| {
            conn.execute(
                "UPDATE orders SET status = 'cancelled', stage = NULL
                 WHERE status IN ('pending', 'accepted')",
                [],
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dormbite_core::types::OrderType;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn new_order(customer: i64) -> NewOrder {
        NewOrder {
            customer_id: UserId(customer),
            restaurant: "Fle".into(),
            items: "Firfir, Shiro".into(),
            total_price: 150.0,
            verification_code: "4821".into(),
            delivery: Some(GeoPoint::new(6.0660, 37.5610)),
            pickup: Some(GeoPoint::new(6.0653, 37.5601)),
            order_type: OrderType::Regular,
            is_test: false,
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let (db, _dir) = setup_db().await;
        let id = create_order(&db, &new_order(7)).await.unwrap();
        let order = get_order(&db, id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.deliverer_id, None);
        assert_eq!(order.total_price, 150.0);
        assert_eq!(order.delivery, Some(GeoPoint::new(6.0660, 37.5610)));
        assert!(get_order(&db, OrderId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_claim_fails_and_keeps_first_deliverer() {
        let (db, _dir) = setup_db().await;
        let id = create_order(&db, &new_order(7)).await.unwrap();
        assert!(claim_order(&db, id, UserId(100)).await.unwrap());
        assert!(!claim_order(&db, id, UserId(200)).await.unwrap());

        let order = get_order(&db, id).await.unwrap().unwrap();
        assert_eq!(order.deliverer_id, Some(UserId(100)));
        assert_eq!(order.status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let (db, _dir) = setup_db().await;
        let db = Arc::new(db);
        let id = create_order(&db, &new_order(7)).await.unwrap();

        let handles: Vec<_> = (1..=8)
            .map(|d| {
                let db = Arc::clone(&db);
                tokio::spawn(async move { (d, claim_order(&db, id, UserId(d)).await.unwrap()) })
            })
            .collect();
        let results = futures::future::join_all(handles).await;
        let winners: Vec<i64> = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|(_, won)| *won)
            .map(|(d, _)| d)
            .collect();
        assert_eq!(winners.len(), 1);

        let order = get_order(&db, id).await.unwrap().unwrap();
        assert_eq!(order.deliverer_id, Some(UserId(winners[0])));
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_claimed() {
        let (db, _dir) = setup_db().await;
        let id = create_order(&db, &new_order(7)).await.unwrap();
        set_order_status(&db, id, OrderStatus::Cancelled).await.unwrap();
        assert!(!claim_order(&db, id, UserId(100)).await.unwrap());
    }

    #[tokio::test]
    async fn active_orders_excludes_terminal() {
        let (db, _dir) = setup_db().await;
        let a = create_order(&db, &new_order(7)).await.unwrap();
        let b = create_order(&db, &new_order(7)).await.unwrap();
        let c = create_order(&db, &new_order(8)).await.unwrap();
        complete_order(&db, a, Some(GeoPoint::new(6.0, 37.0))).await.unwrap();

        assert_eq!(active_orders_for(&db, UserId(7)).await.unwrap(), vec![b]);
        let all: Vec<OrderId> = active_orders(&db).await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(all, vec![b, c]);

        let done = get_order(&db, a).await.unwrap().unwrap();
        assert_eq!(done.status, OrderStatus::Complete);
        assert!(done.completed_at.is_some());
        assert_eq!(done.completion_point, Some(GeoPoint::new(6.0, 37.0)));
    }

    #[tokio::test]
    async fn stage_and_proofs_persist() {
        let (db, _dir) = setup_db().await;
        let id = create_order(&db, &new_order(7)).await.unwrap();
        set_order_stage(&db, id, Some("locked")).await.unwrap();
        set_customer_proof(&db, id, &FileRef("cust-photo".into())).await.unwrap();
        set_deliverer_proof(&db, id, &FileRef("recv-photo".into())).await.unwrap();
        update_order_location(&db, id, GeoPoint::new(1.0, 2.0)).await.unwrap();

        let order = get_order(&db, id).await.unwrap().unwrap();
        assert_eq!(order.stage.as_deref(), Some("locked"));
        assert_eq!(order.customer_proof, Some(FileRef("cust-photo".into())));
        assert_eq!(order.deliverer_proof, Some(FileRef("recv-photo".into())));
        assert_eq!(order.delivery, Some(GeoPoint::new(1.0, 2.0)));

        set_order_status(&db, id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(get_order(&db, id).await.unwrap().unwrap().stage, None);
    }

    #[tokio::test]
    async fn reset_cancels_only_in_flight() {
        let (db, _dir) = setup_db().await;
        let a = create_order(&db, &new_order(7)).await.unwrap();
        let b = create_order(&db, &new_order(7)).await.unwrap();
        create_order(&db, &new_order(7)).await.unwrap();
        complete_order(&db, a, None).await.unwrap();
        claim_order(&db, b, UserId(1)).await.unwrap();

        assert_eq!(reset_in_flight_orders(&db).await.unwrap(), 2);
        assert!(active_orders(&db).await.unwrap().is_empty());
        assert_eq!(get_order(&db, a).await.unwrap().unwrap().status, OrderStatus::Complete);
    }

    #[tokio::test]
    async fn missing_order_errors() {
        let (db, _dir) = setup_db().await;
        let err = set_order_stage(&db, OrderId(77), Some("x")).await.unwrap_err();
        assert!(matches!(err, DormbiteError::OrderNotFound(OrderId(77))));
    }
}
