// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-delivery ratings.

use dormbite_core::DormbiteError;
use dormbite_core::types::{OrderId, Rating};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_ts};

/// Store a rating for a completed order.
///
/// Returns false when the order already has a rating or is not complete;
/// the first rating is never overwritten.
pub async fn save_rating(db: &Database, rating: &Rating) -> Result<bool, DormbiteError> {
    let r = rating.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO ratings (order_id, rating, comment, created_at)
                 SELECT ?1, ?2, ?3, ?4
                 WHERE EXISTS (SELECT 1 FROM orders WHERE order_id = ?1 AND status = 'complete')
                 ON CONFLICT(order_id) DO NOTHING",
                params![r.order_id.0, r.value, r.comment, now_ts()],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(inserted == 1)
}

pub async fn get_rating(db: &Database, order: OrderId) -> Result<Option<Rating>, DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT order_id, rating, comment FROM ratings WHERE order_id = ?1",
                params![order.0],
                |row| {
                    Ok(Rating {
                        order_id: OrderId(row.get(0)?),
                        value: row.get(1)?,
                        comment: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
