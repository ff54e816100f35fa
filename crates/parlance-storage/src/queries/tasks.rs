// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task queue operations.
//!
//! Leasing is a single transaction: select the best eligible task, then a
//! conditional UPDATE re-checking eligibility. Eligible means `pending` and
//! due, or `processing` with an expired lease (a crashed worker's orphan).
//! The conditional re-check keeps the lease safe even when several engine
//! processes share the database file.

use parlance_core::ParlanceError;
use parlance_core::types::{TaskStatus, TaskType};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err, now_string};
use crate::models::{TaskRow, parse_enum_column};

fn row_to_task(row: &Row<'_>) -> Result<TaskRow, rusqlite::Error> {
    Ok(TaskRow {
        id: row.get(0)?,
        task_type: parse_enum_column(1, row.get::<_, String>(1)?)?,
        status: parse_enum_column(2, row.get::<_, String>(2)?)?,
        priority: row.get(3)?,
        payload: row.get(4)?,
        error: row.get(5)?,
        attempt_count: row.get(6)?,
        scheduled_at: row.get(7)?,
        locked_by: row.get(8)?,
        locked_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const TASK_COLUMNS: &str = "id, task_type, status, priority, payload, error, attempt_count,
     scheduled_at, locked_by, locked_at, created_at, updated_at";

/// Insert a new `pending` task. Returns the generated task id.
///
/// `scheduled_at` earlier than now means "due immediately".
pub async fn enqueue(
    db: &Database,
    task_type: TaskType,
    priority: i64,
    payload: &str,
    scheduled_at: &str,
) -> Result<String, ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let id_out = id.clone();
    let task_type = task_type.to_string();
    let payload = payload.to_string();
    let scheduled_at = scheduled_at.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO tasks (id, task_type, status, priority, payload, scheduled_at)
                 VALUES (?1, ?2, 'pending', ?3, ?4, ?5)",
                params![id, task_type, priority, payload, scheduled_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(id_out)
}

/// Atomically lease the next eligible task for `worker_id`.
///
/// Selection order: highest priority first, then earliest `scheduled_at`.
/// `lease_cutoff` is `now - lease_duration`: any `processing` task locked
/// at or before it is considered abandoned and re-leasable.
pub async fn lease(
    db: &Database,
    worker_id: &str,
    lease_cutoff: &str,
) -> Result<Option<TaskRow>, ParlanceError> {
    let worker_id = worker_id.to_string();
    let lease_cutoff = lease_cutoff.to_string();
    let now = now_string();
    db.connection()
        .call(move |conn| -> Result<Option<TaskRow>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let candidate = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE (status = 'pending' AND scheduled_at <= ?1)
                        OR (status = 'processing' AND locked_at IS NOT NULL AND locked_at <= ?2)
                     ORDER BY priority DESC, scheduled_at ASC
                     LIMIT 1"
                ))?;
                match stmt.query_row(params![now, lease_cutoff], row_to_task) {
                    Ok(task) => Some(task),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };

            let Some(task) = candidate else {
                tx.commit()?;
                return Ok(None);
            };

            // Re-check eligibility in the UPDATE itself; changes() == 0
            // means another worker won the race between select and update.
            let claimed = tx.execute(
                "UPDATE tasks
                 SET status = 'processing', locked_by = ?1, locked_at = ?2, updated_at = ?2
                 WHERE id = ?3
                   AND ((status = 'pending' AND scheduled_at <= ?2)
                        OR (status = 'processing' AND locked_at IS NOT NULL AND locked_at <= ?4))",
                params![worker_id, now, task.id, lease_cutoff],
            )?;
            tx.commit()?;

            if claimed == 0 {
                return Ok(None);
            }
            Ok(Some(TaskRow {
                status: TaskStatus::Processing,
                locked_by: Some(worker_id.clone()),
                locked_at: Some(now.clone()),
                ..task
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a leased task `completed`. Returns false if the task was not in
/// `processing` (e.g. its lease expired and another worker reclaimed it).
pub async fn complete(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE tasks
                 SET status = 'completed', locked_by = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'processing'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Re-queue a failed task for retry: increment `attempt_count`, record the
/// error, clear the lease, and push `scheduled_at` to `retry_at`.
pub async fn retry(
    db: &Database,
    id: &str,
    error: &str,
    retry_at: &str,
) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let error = error.to_string();
    let retry_at = retry_at.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE tasks
                 SET status = 'pending', attempt_count = attempt_count + 1, error = ?2,
                     scheduled_at = ?3, locked_by = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'processing'",
                params![id, error, retry_at],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Transition a leased task to terminal `failed` with the error recorded.
pub async fn mark_failed(db: &Database, id: &str, error: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE tasks
                 SET status = 'failed', attempt_count = attempt_count + 1, error = ?2,
                     locked_by = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'processing'",
                params![id, error],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Cancel a task that has not yet finished.
pub async fn cancel(db: &Database, id: &str) -> Result<bool, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE tasks
                 SET status = 'cancelled', locked_by = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status IN ('pending', 'processing')",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one task by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<TaskRow>, ParlanceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<TaskRow>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_task) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a live (pending or processing) task with this exact payload
/// already exists. The periodic tick uses this to avoid piling up
/// duplicate work for a slow dialog.
pub async fn has_live_with_payload(db: &Database, payload: &str) -> Result<bool, ParlanceError> {
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE payload = ?1 AND status IN ('pending', 'processing')",
                params![payload],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Count tasks per status, for the observability surface.
pub async fn counts_by_status(db: &Database) -> Result<Vec<(TaskStatus, i64)>, ParlanceError> {
    db.connection()
        .call(|conn| -> Result<Vec<(TaskStatus, i64)>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                let status: TaskStatus = parse_enum_column(0, row.get::<_, String>(0)?)?;
                Ok((status, row.get::<_, i64>(1)?))
            })?;
            let mut counts = Vec::new();
            for row in rows {
                counts.push(row?);
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete terminal tasks last touched before `cutoff`. Returns rows removed.
pub async fn prune_terminal(db: &Database, cutoff: &str) -> Result<usize, ParlanceError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM tasks
                 WHERE status IN ('completed', 'failed', 'cancelled') AND updated_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}
