// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dialog selections and their processing cursor.
//!
//! The cursor (`last_processed_message_id`) only ever moves forward;
//! `advance_cursor` enforces that in the UPDATE guard so a slow worker
//! finishing late can never rewind a dialog past messages a faster run
//! already covered.

use parlance_core::ParlanceError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::DialogRow;

fn row_to_dialog(row: &Row<'_>) -> Result<DialogRow, rusqlite::Error> {
    Ok(DialogRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        telegram_dialog_id: row.get(2)?,
        title: row.get(3)?,
        processing_enabled: row.get(4)?,
        auto_send_enabled: row.get(5)?,
        priority: row.get(6)?,
        last_processed_message_id: row.get(7)?,
        last_processed_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const DIALOG_COLUMNS: &str = "id, account_id, telegram_dialog_id, title, processing_enabled,
     auto_send_enabled, priority, last_processed_message_id, last_processed_at,
     created_at, updated_at";

/// Select a dialog for processing (or re-enable a previously deselected
/// one). The cursor is preserved across deselect/reselect so reselection
/// does not replay already-seen messages.
pub async fn upsert(
    db: &Database,
    account_id: &str,
    telegram_dialog_id: i64,
    title: &str,
) -> Result<DialogRow, ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let account_id = account_id.to_string();
    let title = title.to_string();
    db.connection()
        .call(move |conn| -> Result<DialogRow, rusqlite::Error> {
            conn.execute(
                "INSERT INTO dialogs (id, account_id, telegram_dialog_id, title,
                                      processing_enabled)
                 VALUES (?1, ?2, ?3, ?4, 1)
                 ON CONFLICT(account_id, telegram_dialog_id) DO UPDATE SET
                     title = excluded.title,
                     processing_enabled = 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![id, account_id, telegram_dialog_id, title],
            )?;
            conn.query_row(
                &format!(
                    "SELECT {DIALOG_COLUMNS} FROM dialogs
                     WHERE account_id = ?1 AND telegram_dialog_id = ?2"
                ),
                params![account_id, telegram_dialog_id],
                row_to_dialog,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Turn processing off for a dialog without forgetting its cursor.
pub async fn deselect(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE dialogs
                 SET processing_enabled = 0,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND processing_enabled = 1",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Toggle unattended delivery of approved-by-default drafts.
pub async fn set_auto_send(db: &Database, id: &str, enabled: bool) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE dialogs
                 SET auto_send_enabled = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, enabled],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Set the scheduling weight used when dialog tasks are enqueued.
pub async fn set_priority(db: &Database, id: &str, priority: i64) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE dialogs
                 SET priority = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, priority],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<DialogRow>, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<DialogRow>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {DIALOG_COLUMNS} FROM dialogs WHERE id = ?1"),
                params![id],
                row_to_dialog,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_external(
    db: &Database,
    account_id: &str,
    telegram_dialog_id: i64,
) -> Result<Option<DialogRow>, ParlanceError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<DialogRow>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {DIALOG_COLUMNS} FROM dialogs
                     WHERE account_id = ?1 AND telegram_dialog_id = ?2"
                ),
                params![account_id, telegram_dialog_id],
                row_to_dialog,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All dialogs for one account, processing-enabled or not.
pub async fn list_for_account(
    db: &Database,
    account_id: &str,
) -> Result<Vec<DialogRow>, ParlanceError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<DialogRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DIALOG_COLUMNS} FROM dialogs
                 WHERE account_id = ?1
                 ORDER BY priority DESC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![account_id], row_to_dialog)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Enabled dialogs not processed since `stale_cutoff` (or never processed),
/// for the periodic tick to enqueue.
pub async fn due_for_processing(
    db: &Database,
    stale_cutoff: &str,
) -> Result<Vec<DialogRow>, ParlanceError> {
    let stale_cutoff = stale_cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<DialogRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DIALOG_COLUMNS} FROM dialogs
                 WHERE processing_enabled = 1
                   AND (last_processed_at IS NULL OR last_processed_at <= ?1)
                 ORDER BY priority DESC, last_processed_at ASC"
            ))?;
            let rows = stmt.query_map(params![stale_cutoff], row_to_dialog)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Move the cursor forward to `message_id` and stamp `last_processed_at`.
/// The guard keeps the cursor monotonic: a smaller (late) value is a no-op.
pub async fn advance_cursor(
    db: &Database,
    id: &str,
    message_id: i64,
) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE dialogs
                 SET last_processed_message_id = ?2,
                     last_processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1
                   AND (last_processed_message_id IS NULL
                        OR last_processed_message_id < ?2)",
                params![id, message_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a processing run that found nothing new. The cursor is untouched.
pub async fn touch_processed_at(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE dialogs
                 SET last_processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}
