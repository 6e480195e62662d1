// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit trail of rejected privileged actions.

use dormbite_core::DormbiteError;
use dormbite_core::types::{ChatId, UserId};
use rusqlite::params;

use crate::database::{Database, map_tr_err, now_ts};

pub async fn log_suspicious_access(
    db: &Database,
    actor: UserId,
    chat: ChatId,
    action: &str,
) -> Result<(), DormbiteError> {
    let action = action.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO suspicious_access (actor_id, chat_id, action, logged_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![actor.0, chat.0, action, now_ts()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Number of logged attempts by an actor.
pub async fn suspicious_access_count(db: &Database, actor: UserId) -> Result<i64, DormbiteError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM suspicious_access WHERE actor_id = ?1",
                params![actor.0],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn attempts_accumulate() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap()).await.unwrap();
        log_suspicious_access(&db, UserId(9), ChatId(9), "accept order #1").await.unwrap();
        log_suspicious_access(&db, UserId(9), ChatId(9), "reset orders").await.unwrap();
        assert_eq!(suspicious_access_count(&db, UserId(9)).await.unwrap(), 2);
        assert_eq!(suspicious_access_count(&db, UserId(1)).await.unwrap(), 0);
    }
}
