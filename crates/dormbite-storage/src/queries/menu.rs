// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sold-out menu items.

use dormbite_core::DormbiteError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_ts};

/// Flip an item between available and sold out. Returns true when the item
/// is now unavailable.
pub async fn toggle_item_availability(
    db: &Database,
    restaurant: &str,
    item: &str,
) -> Result<bool, DormbiteError> {
    let restaurant = restaurant.to_string();
    let item = item.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM unavailable_items WHERE restaurant = ?1 AND item = ?2",
                params![restaurant, item],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO unavailable_items (restaurant, item, since) VALUES (?1, ?2, ?3)",
                    params![restaurant, item, now_ts()],
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn unavailable_items(db: &Database, restaurant: &str) -> Result<Vec<String>, DormbiteError> {
    let restaurant = restaurant.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT item FROM unavailable_items WHERE restaurant = ?1 ORDER BY item",
            )?;
            let rows = stmt.query_map(params![restaurant], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
