// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Login session rows.
//!
//! Transitions: `pending -> authenticated`, `pending -> error`, and any
//! live state `-> expired`. A session never returns to `pending`; the
//! conditional UPDATE guards enforce that at the SQL level.

use parlance_core::ParlanceError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{SessionRow, parse_enum_column};

fn row_to_session(row: &Row<'_>) -> Result<SessionRow, rusqlite::Error> {
    Ok(SessionRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        status: parse_enum_column(2, row.get::<_, String>(2)?)?,
        token: row.get(3)?,
        refresh_token: row.get(4)?,
        expires_at: row.get(5)?,
        last_activity: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const SESSION_COLUMNS: &str = "id, account_id, status, token, refresh_token, expires_at,
     last_activity, created_at, updated_at";

/// Insert a new `pending` session for an account.
pub async fn create(
    db: &Database,
    account_id: &str,
    token: &str,
    expires_at: &str,
) -> Result<String, ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let id_out = id.clone();
    let account_id = account_id.to_string();
    let token = token.to_string();
    let expires_at = expires_at.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO sessions (id, account_id, status, token, expires_at)
                 VALUES (?1, ?2, 'pending', ?3, ?4)",
                params![id, account_id, token, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(id_out)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<SessionRow>, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SessionRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                row_to_session,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_token(db: &Database, token: &str) -> Result<Option<SessionRow>, ParlanceError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SessionRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token = ?1"),
                params![token],
                row_to_session,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_refresh_token(
    db: &Database,
    refresh_token: &str,
) -> Result<Option<SessionRow>, ParlanceError> {
    let refresh_token = refresh_token.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SessionRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token = ?1"),
                params![refresh_token],
                row_to_session,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Re-point a still-pending session at another account. Used when a login
/// handshake resolves to an identity that already has a permanent account.
pub async fn reassign_account(
    db: &Database,
    id: &str,
    account_id: &str,
) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE sessions
                 SET account_id = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending'",
                params![id, account_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// `pending -> authenticated`, issuing the refresh token.
pub async fn authenticate(
    db: &Database,
    id: &str,
    refresh_token: &str,
    expires_at: &str,
) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let refresh_token = refresh_token.to_string();
    let expires_at = expires_at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE sessions
                 SET status = 'authenticated', refresh_token = ?2, expires_at = ?3,
                     last_activity = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending'",
                params![id, refresh_token, expires_at],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// `pending -> error` when the login handshake fails.
pub async fn mark_error(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE sessions
                 SET status = 'error',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Bump the idle clock on an authenticated session.
pub async fn touch_activity(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE sessions
                 SET last_activity = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'authenticated'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Rotate both tokens on an authenticated session. The old access token
/// stops resolving the moment this commits.
pub async fn rotate(
    db: &Database,
    id: &str,
    token: &str,
    refresh_token: &str,
    expires_at: &str,
) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let token = token.to_string();
    let refresh_token = refresh_token.to_string();
    let expires_at = expires_at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE sessions
                 SET token = ?2, refresh_token = ?3, expires_at = ?4,
                     last_activity = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'authenticated'",
                params![id, token, refresh_token, expires_at],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Force a single session to `expired` (logout).
pub async fn expire(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE sessions
                 SET status = 'expired',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status IN ('pending', 'authenticated')",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Expire every live session whose deadline passed or whose idle clock ran
/// out. Returns the number of sessions expired.
pub async fn expire_stale(
    db: &Database,
    now: &str,
    idle_cutoff: &str,
) -> Result<usize, ParlanceError> {
    let now = now.to_string();
    let idle_cutoff = idle_cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE sessions
                 SET status = 'expired',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status IN ('pending', 'authenticated')
                   AND (expires_at <= ?1 OR last_activity <= ?2)",
                params![now, idle_cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Delete `expired` and `error` sessions last touched before `cutoff`.
pub async fn prune_dead(db: &Database, cutoff: &str) -> Result<usize, ParlanceError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM sessions
                 WHERE status IN ('expired', 'error') AND updated_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}
