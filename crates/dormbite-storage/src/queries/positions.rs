// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Latest known position per user.

use dormbite_core::DormbiteError;
use dormbite_core::types::{GeoPoint, Position, UserId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, format_ts, map_tr_err, parse_ts};

/// Overwrite the user's latest position.
pub async fn record_position(
    db: &Database,
    user: UserId,
    position: Position,
) -> Result<(), DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO positions (user_id, lat, lon, recorded_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     lat = excluded.lat, lon = excluded.lon, recorded_at = excluded.recorded_at",
                params![
                    user.0,
                    position.point.lat,
                    position.point.lon,
                    format_ts(position.at)
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn latest_position(db: &Database, user: UserId) -> Result<Option<Position>, DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT lat, lon, recorded_at FROM positions WHERE user_id = ?1",
                params![user.0],
                |row| {
                    let at: String = row.get(2)?;
                    Ok(Position {
                        point: GeoPoint::new(row.get(0)?, row.get(1)?),
                        at: parse_ts(2, &at)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    #[tokio::test]
    async fn latest_write_wins() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        assert!(latest_position(&db, UserId(3)).await.unwrap().is_none());

        let t0 = Utc::now();
        record_position(&db, UserId(3), Position { point: GeoPoint::new(1.0, 1.0), at: t0 })
            .await
            .unwrap();
        let t1 = t0 + Duration::seconds(2);
        record_position(&db, UserId(3), Position { point: GeoPoint::new(2.0, 2.0), at: t1 })
            .await
            .unwrap();

        let p = latest_position(&db, UserId(3)).await.unwrap().unwrap();
        assert_eq!(p.point, GeoPoint::new(2.0, 2.0));
        assert_eq!(p.at.timestamp_millis(), t1.timestamp_millis());
    }
}
