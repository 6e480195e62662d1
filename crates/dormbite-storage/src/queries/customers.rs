// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer registration, roles, and archival.

use dormbite_core::DormbiteError;
use dormbite_core::types::{ChangeSet, Customer, FieldChange, GeoPoint, RegistrationRecord, UserId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, now_ts, parse_text, parse_ts};

const CUSTOMER_COLUMNS: &str = "user_id, name, handle, institutional_id, block, dorm, phone,
     language, gender, lat, lon, is_deliverer, is_banned, balance, tokens, created_at";

fn customer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    let language: String = row.get(7)?;
    let gender: Option<String> = row.get(8)?;
    let lat: Option<f64> = row.get(9)?;
    let lon: Option<f64> = row.get(10)?;
    let created_at: String = row.get(15)?;
    Ok(Customer {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        handle: row.get(2)?,
        institutional_id: row.get(3)?,
        block: row.get(4)?,
        dorm: row.get(5)?,
        phone: row.get(6)?,
        language: parse_text(7, &language)?,
        gender: gender.as_deref().map(|g| parse_text(8, g)).transpose()?,
        location: lat.zip(lon).map(|(lat, lon)| GeoPoint::new(lat, lon)),
        is_deliverer: row.get(11)?,
        is_banned: row.get(12)?,
        balance: row.get(13)?,
        tokens: row.get(14)?,
        created_at: parse_ts(15, &created_at)?,
    })
}

/// Insert or update a customer from a completed registration.
///
/// Runs in one transaction: the prior row is read, a history row is written
/// when name or phone changed, then the live row is updated. Role, ban,
/// balance, and tokens are left untouched on update.
pub async fn upsert_customer(
    db: &Database,
    record: &RegistrationRecord,
) -> Result<ChangeSet, DormbiteError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now_ts();

            let prior: Option<(String, String, String, String, String)> = tx
                .query_row(
                    "SELECT name, phone, institutional_id, block, dorm
                     FROM customers WHERE user_id = ?1",
                    params![r.id.0],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .optional()?;

            let lat = r.location.map(|p| p.lat);
            let lon = r.location.map(|p| p.lon);
            let language = r.language.to_string();
            let gender = r.gender.map(|g| g.to_string());

            let changes = match prior {
                None => {
                    tx.execute(
                        "INSERT INTO customers (user_id, name, handle, institutional_id, block,
                             dorm, phone, language, gender, lat, lon, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                        params![
                            r.id.0,
                            r.name,
                            r.handle,
                            r.institutional_id,
                            r.block,
                            r.dorm,
                            r.phone,
                            language,
                            gender,
                            lat,
                            lon,
                            now
                        ],
                    )?;
                    ChangeSet {
                        created: true,
                        changed: Vec::new(),
                    }
                }
                Some((name, phone, institutional_id, block, dorm)) => {
                    let mut changed = Vec::new();
                    if name != r.name {
                        changed.push(FieldChange {
                            field: "name".into(),
                            old: name.clone(),
                            new: r.name.clone(),
                        });
                    }
                    if phone != r.phone {
                        changed.push(FieldChange {
                            field: "phone".into(),
                            old: phone.clone(),
                            new: r.phone.clone(),
                        });
                    }
                    if !changed.is_empty() {
                        tx.execute(
                            "INSERT INTO customer_history
                                 (user_id, name, phone, institutional_id, block, dorm, changed_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                            params![r.id.0, name, phone, institutional_id, block, dorm, now],
                        )?;
                    }
                    tx.execute(
                        "UPDATE customers SET name = ?2, handle = ?3, institutional_id = ?4,
                             block = ?5, dorm = ?6, phone = ?7, language = ?8, gender = ?9,
                             lat = ?10, lon = ?11, updated_at = ?12
                         WHERE user_id = ?1",
                        params![
                            r.id.0,
                            r.name,
                            r.handle,
                            r.institutional_id,
                            r.block,
                            r.dorm,
                            r.phone,
                            language,
                            gender,
                            lat,
                            lon,
                            now
                        ],
                    )?;
                    ChangeSet {
                        created: false,
                        changed,
                    }
                }
            };
            tx.commit()?;
            Ok(changes)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a customer by platform id.
pub async fn get_customer(db: &Database, id: UserId) -> Result<Option<Customer>, DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE user_id = ?1"),
                params![id.0],
                customer_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of history rows recorded for a customer.
pub async fn history_count(db: &Database, id: UserId) -> Result<i64, DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM customer_history WHERE user_id = ?1",
                params![id.0],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

async fn update_flag(
    db: &Database,
    id: UserId,
    sql: &'static str,
    value: bool,
) -> Result<(), DormbiteError> {
    let updated = db
        .connection()
        .call(move |conn| conn.execute(sql, params![id.0, value, now_ts()]))
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(DormbiteError::CustomerNotFound(id));
    }
    Ok(())
}

/// Grant or revoke the deliverer role.
pub async fn set_deliverer(db: &Database, id: UserId, is_deliverer: bool) -> Result<(), DormbiteError> {
    update_flag(
        db,
        id,
        "UPDATE customers SET is_deliverer = ?2, updated_at = ?3 WHERE user_id = ?1",
        is_deliverer,
    )
    .await
}

/// Ban a customer from ordering.
pub async fn ban_customer(db: &Database, id: UserId) -> Result<(), DormbiteError> {
    update_flag(
        db,
        id,
        "UPDATE customers SET is_banned = ?2, updated_at = ?3 WHERE user_id = ?1",
        true,
    )
    .await
}

/// Move a customer into `quarantined_customers` and delete the live row.
///
/// Returns false when the customer does not exist.
pub async fn archive_customer(db: &Database, id: UserId) -> Result<bool, DormbiteError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let copied = tx.execute(
                "INSERT INTO quarantined_customers (user_id, name, handle, institutional_id,
                     block, dorm, phone, is_deliverer, is_banned, balance, tokens, created_at,
                     archived_at)
                 SELECT user_id, name, handle, institutional_id, block, dorm, phone,
                        is_deliverer, is_banned, balance, tokens, created_at, ?2
                 FROM customers WHERE user_id = ?1",
                params![id.0, now_ts()],
            )?;
            if copied == 0 {
                return Ok(false);
            }
            tx.execute("DELETE FROM customers WHERE user_id = ?1", params![id.0])?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}
