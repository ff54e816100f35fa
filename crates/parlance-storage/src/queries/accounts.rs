// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account rows. An account starts as a temporary placeholder created at
//! the start of a login handshake and becomes permanent once the transport
//! confirms the identity.

use parlance_core::ParlanceError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::AccountRow;

fn row_to_account(row: &Row<'_>) -> Result<AccountRow, rusqlite::Error> {
    Ok(AccountRow {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        is_temporary: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, telegram_id, username, first_name, is_temporary, created_at, updated_at";

/// Create a placeholder account for a login attempt that has not yet been
/// confirmed. Returns the new account id.
pub async fn create_temporary(db: &Database) -> Result<String, ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let id_out = id.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO accounts (id, is_temporary) VALUES (?1, 1)",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(id_out)
}

/// Promote a temporary account with the identity confirmed by the
/// transport. Returns false if the account is missing or already permanent.
pub async fn complete_handshake(
    db: &Database,
    id: &str,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let username = username.map(str::to_string);
    let first_name = first_name.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE accounts
                 SET telegram_id = ?2, username = ?3, first_name = ?4, is_temporary = 0,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND is_temporary = 1",
                params![id, telegram_id, username, first_name],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<AccountRow>, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AccountRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id],
                row_to_account,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_telegram_id(
    db: &Database,
    telegram_id: i64,
) -> Result<Option<AccountRow>, ParlanceError> {
    db.connection()
        .call(move |conn| -> Result<Option<AccountRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE telegram_id = ?1"),
                params![telegram_id],
                row_to_account,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one account. Cascades remove its credentials, sessions, and
/// dialogs.
pub async fn delete(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete temporary accounts created before `cutoff` whose handshake never
/// completed. Cascades remove their sessions and credentials.
pub async fn delete_stale_temporary(db: &Database, cutoff: &str) -> Result<usize, ParlanceError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM accounts WHERE is_temporary = 1 AND created_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}
