// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response rows: the one-per-dialog draft plus its review lifecycle.
//!
//! A dialog holds at most one row here (UNIQUE on dialog_id). A fresh draft
//! replaces the previous row only when the previous row is terminal, or is
//! still awaiting review for an older message. An `approved` draft is never
//! overwritten; the send pipeline owns it until it reaches `sent`/`failed`.
//!
//! Every lifecycle transition is a conditional UPDATE; `changes()` is the
//! race arbiter, so two concurrent approvals resolve to exactly one winner.

use parlance_core::ParlanceError;
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{ResponseRow, parse_enum_column};

fn row_to_response(row: &Row<'_>) -> Result<ResponseRow, rusqlite::Error> {
    Ok(ResponseRow {
        id: row.get(0)?,
        dialog_id: row.get(1)?,
        last_message_id: row.get(2)?,
        last_message_timestamp: row.get(3)?,
        suggested_text: row.get(4)?,
        edited_text: row.get(5)?,
        status: parse_enum_column(6, row.get::<_, String>(6)?)?,
        model_name: row.get(7)?,
        error: row.get(8)?,
        approved_at: row.get(9)?,
        sent_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

const RESPONSE_COLUMNS: &str = "id, dialog_id, last_message_id, last_message_timestamp,
     suggested_text, edited_text, status, model_name, error, approved_at, sent_at,
     created_at, updated_at";

/// Write a fresh `pending_approval` draft for a dialog, superseding any
/// replaceable previous draft. Returns true if the draft was written, false
/// if an existing row blocked it (approved, or pending for a newer message).
pub async fn upsert_pending(
    db: &Database,
    dialog_id: &str,
    last_message_id: i64,
    last_message_timestamp: &str,
    suggested_text: &str,
    model_name: &str,
) -> Result<bool, ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let dialog_id = dialog_id.to_string();
    let last_message_timestamp = last_message_timestamp.to_string();
    let suggested_text = suggested_text.to_string();
    let model_name = model_name.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "INSERT INTO responses
                     (id, dialog_id, last_message_id, last_message_timestamp,
                      suggested_text, status, model_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending_approval', ?6)
                 ON CONFLICT(dialog_id) DO UPDATE SET
                     last_message_id = excluded.last_message_id,
                     last_message_timestamp = excluded.last_message_timestamp,
                     suggested_text = excluded.suggested_text,
                     edited_text = NULL,
                     status = 'pending_approval',
                     model_name = excluded.model_name,
                     error = NULL,
                     approved_at = NULL,
                     sent_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE responses.status IN ('rejected', 'sent', 'failed')
                    OR (responses.status = 'pending_approval'
                        AND excluded.last_message_id > responses.last_message_id)",
                params![
                    id,
                    dialog_id,
                    last_message_id,
                    last_message_timestamp,
                    suggested_text,
                    model_name
                ],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a draft that could not be generated: a `failed` row with the
/// error, covering the batch up to `last_message_id`. Follows the same
/// supersession guard as [`upsert_pending`], so an approved row in flight
/// is never disturbed.
pub async fn record_draft_failure(
    db: &Database,
    dialog_id: &str,
    last_message_id: i64,
    last_message_timestamp: &str,
    error: &str,
    model_name: &str,
) -> Result<bool, ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let dialog_id = dialog_id.to_string();
    let last_message_timestamp = last_message_timestamp.to_string();
    let error = error.to_string();
    let model_name = model_name.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "INSERT INTO responses
                     (id, dialog_id, last_message_id, last_message_timestamp,
                      suggested_text, status, model_name, error)
                 VALUES (?1, ?2, ?3, ?4, '', 'failed', ?5, ?6)
                 ON CONFLICT(dialog_id) DO UPDATE SET
                     last_message_id = excluded.last_message_id,
                     last_message_timestamp = excluded.last_message_timestamp,
                     suggested_text = '',
                     edited_text = NULL,
                     status = 'failed',
                     model_name = excluded.model_name,
                     error = excluded.error,
                     approved_at = NULL,
                     sent_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE responses.status IN ('rejected', 'sent', 'failed')
                    OR (responses.status = 'pending_approval'
                        AND excluded.last_message_id > responses.last_message_id)",
                params![
                    id,
                    dialog_id,
                    last_message_id,
                    last_message_timestamp,
                    model_name,
                    error
                ],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// `pending_approval` -> `approved`, optionally recording a human edit.
/// Returns false when the row is in any other state.
pub async fn approve(
    db: &Database,
    id: &str,
    edited_text: Option<&str>,
) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let edited_text = edited_text.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE responses
                 SET status = 'approved',
                     edited_text = COALESCE(?2, edited_text),
                     approved_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending_approval'",
                params![id, edited_text],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// `pending_approval` -> `rejected`.
pub async fn reject(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE responses
                 SET status = 'rejected',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending_approval'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// `approved` -> `sent`, stamping `sent_at`.
pub async fn mark_sent(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE responses
                 SET status = 'sent',
                     sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'approved'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// `approved` -> `failed` with the delivery error recorded.
pub async fn mark_failed(db: &Database, id: &str, error: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE responses
                 SET status = 'failed', error = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'approved'",
                params![id, error],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one response by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<ResponseRow>, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ResponseRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM responses WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_response) {
                Ok(r) => Ok(Some(r)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the single response row for a dialog, if any.
pub async fn get_for_dialog(
    db: &Database,
    dialog_id: &str,
) -> Result<Option<ResponseRow>, ParlanceError> {
    let dialog_id = dialog_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ResponseRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM responses WHERE dialog_id = ?1"
            ))?;
            match stmt.query_row(params![dialog_id], row_to_response) {
                Ok(r) => Ok(Some(r)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// All drafts awaiting review for one account's dialogs, newest first.
pub async fn list_pending_for_account(
    db: &Database,
    account_id: &str,
) -> Result<Vec<ResponseRow>, ParlanceError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<ResponseRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.dialog_id, r.last_message_id, r.last_message_timestamp,
                        r.suggested_text, r.edited_text, r.status, r.model_name, r.error,
                        r.approved_at, r.sent_at, r.created_at, r.updated_at
                 FROM responses r
                 JOIN dialogs d ON d.id = r.dialog_id
                 WHERE d.account_id = ?1 AND r.status = 'pending_approval'
                 ORDER BY r.updated_at DESC",
            )?;
            let rows = stmt.query_map(params![account_id], row_to_response)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Responses approved before `cutoff` that are still waiting on delivery.
pub async fn list_approved_before(
    db: &Database,
    cutoff: &str,
) -> Result<Vec<ResponseRow>, ParlanceError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<ResponseRow>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM responses
                 WHERE status = 'approved' AND approved_at < ?1
                 ORDER BY approved_at ASC"
            ))?;
            let rows = stmt.query_map(params![cutoff], row_to_response)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete terminal responses last touched before `cutoff`.
pub async fn prune_terminal(db: &Database, cutoff: &str) -> Result<usize, ParlanceError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM responses
                 WHERE status IN ('rejected', 'sent', 'failed') AND updated_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{accounts, dialogs};
    use parlance_core::types::ResponseStatus;
    use tempfile::tempdir;

    async fn setup() -> (Database, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("resp.db").to_str().unwrap())
            .await
            .unwrap();
        let account_id = accounts::create_temporary(&db).await.unwrap();
        let dialog = dialogs::upsert(&db, &account_id, 42, "Alice").await.unwrap();
        (db, dialog.id, dir)
    }

    #[tokio::test]
    async fn draft_supersedes_older_pending() {
        let (db, dialog_id, _dir) = setup().await;

        assert!(
            upsert_pending(&db, &dialog_id, 100, "2026-01-01T00:00:00.000Z", "v1", "m")
                .await
                .unwrap()
        );
        // Newer message wins.
        assert!(
            upsert_pending(&db, &dialog_id, 105, "2026-01-01T01:00:00.000Z", "v2", "m")
                .await
                .unwrap()
        );
        // Stale draft (same or older message id) is dropped.
        assert!(
            !upsert_pending(&db, &dialog_id, 105, "2026-01-01T01:00:00.000Z", "v3", "m")
                .await
                .unwrap()
        );
        assert!(
            !upsert_pending(&db, &dialog_id, 99, "2026-01-01T00:30:00.000Z", "v4", "m")
                .await
                .unwrap()
        );

        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert_eq!(row.suggested_text, "v2");
        assert_eq!(row.last_message_id, 105);
        assert_eq!(row.status, ResponseStatus::PendingApproval);
    }

    #[tokio::test]
    async fn approved_draft_is_never_overwritten() {
        let (db, dialog_id, _dir) = setup().await;

        upsert_pending(&db, &dialog_id, 100, "2026-01-01T00:00:00.000Z", "v1", "m")
            .await
            .unwrap();
        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert!(approve(&db, &row.id, None).await.unwrap());

        // Even a draft for a newer message cannot replace an approved one.
        assert!(
            !upsert_pending(&db, &dialog_id, 200, "2026-01-02T00:00:00.000Z", "v2", "m")
                .await
                .unwrap()
        );
        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert_eq!(row.suggested_text, "v1");
        assert_eq!(row.status, ResponseStatus::Approved);
    }

    #[tokio::test]
    async fn terminal_draft_is_replaceable() {
        let (db, dialog_id, _dir) = setup().await;

        upsert_pending(&db, &dialog_id, 100, "2026-01-01T00:00:00.000Z", "v1", "m")
            .await
            .unwrap();
        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert!(reject(&db, &row.id).await.unwrap());

        // A rejected row is replaceable regardless of message id ordering.
        assert!(
            upsert_pending(&db, &dialog_id, 90, "2026-01-01T00:10:00.000Z", "v2", "m")
                .await
                .unwrap()
        );
        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::PendingApproval);
        assert_eq!(row.suggested_text, "v2");
        assert!(row.approved_at.is_none());
        assert!(row.sent_at.is_none());
    }

    #[tokio::test]
    async fn draft_failure_is_recorded_but_never_displaces_approved() {
        let (db, dialog_id, _dir) = setup().await;

        assert!(
            record_draft_failure(&db, &dialog_id, 100, "2026-01-01T00:00:00.000Z", "refused", "m")
                .await
                .unwrap()
        );
        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::Failed);
        assert_eq!(row.error.as_deref(), Some("refused"));
        assert_eq!(row.last_message_id, 100);

        // A later successful draft replaces the failed row.
        assert!(
            upsert_pending(&db, &dialog_id, 110, "2026-01-01T01:00:00.000Z", "v1", "m")
                .await
                .unwrap()
        );
        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::PendingApproval);
        assert!(row.error.is_none());

        // An approved row blocks a failure record the same way it blocks
        // a fresh draft.
        assert!(approve(&db, &row.id, None).await.unwrap());
        assert!(
            !record_draft_failure(&db, &dialog_id, 200, "2026-01-02T00:00:00.000Z", "x", "m")
                .await
                .unwrap()
        );
        let row = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::Approved);
    }

    #[tokio::test]
    async fn lifecycle_transitions_are_guarded() {
        let (db, dialog_id, _dir) = setup().await;

        upsert_pending(&db, &dialog_id, 100, "2026-01-01T00:00:00.000Z", "v1", "m")
            .await
            .unwrap();
        let id = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap().id;

        // Cannot send or fail before approval.
        assert!(!mark_sent(&db, &id).await.unwrap());
        assert!(!mark_failed(&db, &id, "x").await.unwrap());

        assert!(approve(&db, &id, Some("edited")).await.unwrap());
        // Second approval loses the race arbiter.
        assert!(!approve(&db, &id, None).await.unwrap());
        assert!(!reject(&db, &id).await.unwrap());

        assert!(mark_sent(&db, &id).await.unwrap());
        assert!(!mark_sent(&db, &id).await.unwrap());
        assert!(!mark_failed(&db, &id, "x").await.unwrap());

        let row = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::Sent);
        assert_eq!(row.outgoing_text(), "edited");
        assert!(row.approved_at.is_some());
        assert!(row.sent_at.is_some());
    }

    #[tokio::test]
    async fn failed_send_records_error() {
        let (db, dialog_id, _dir) = setup().await;

        upsert_pending(&db, &dialog_id, 100, "2026-01-01T00:00:00.000Z", "v1", "m")
            .await
            .unwrap();
        let id = get_for_dialog(&db, &dialog_id).await.unwrap().unwrap().id;
        approve(&db, &id, None).await.unwrap();
        assert!(mark_failed(&db, &id, "delivery refused").await.unwrap());

        let row = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::Failed);
        assert_eq!(row.error.as_deref(), Some("delivery refused"));
    }

    #[tokio::test]
    async fn pending_listing_and_prune() {
        let (db, dialog_id, _dir) = setup().await;

        upsert_pending(&db, &dialog_id, 100, "2026-01-01T00:00:00.000Z", "v1", "m")
            .await
            .unwrap();
        let account_id = dialogs::get(&db, &dialog_id).await.unwrap().unwrap().account_id;

        let pending = list_pending_for_account(&db, &account_id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].dialog_id, dialog_id);

        let id = pending[0].id.clone();
        reject(&db, &id).await.unwrap();
        assert!(list_pending_for_account(&db, &account_id).await.unwrap().is_empty());

        let removed = prune_terminal(&db, "2999-01-01T00:00:00.000Z").await.unwrap();
        assert_eq!(removed, 1);
    }
}
