// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable task queue over the record store.
//!
//! The queue owns the retry policy: a worker reports success or failure and
//! [`TaskQueue::fail`] decides between re-queueing with exponential backoff
//! and terminal failure. Retries stop when the error is not retryable or
//! the attempt ceiling is reached.

use chrono::{Duration, SecondsFormat, Utc};
use parlance_config::model::EngineConfig;
use parlance_core::ParlanceError;
use parlance_core::types::{TaskStatus, TaskType};
use parlance_storage::{Database, TaskRow, now_string};
use parlance_storage::queries::tasks;
use tracing::{debug, info, warn};

use crate::task::TaskPayload;

/// What [`TaskQueue::fail`] decided to do with a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Re-queued with backoff; the attempt count was incremented.
    Retried,
    /// Terminal failure: not retryable, or the attempt ceiling was hit.
    Failed,
    /// The task was no longer leased (reclaimed by another worker).
    Lost,
}

#[derive(Clone)]
pub struct TaskQueue {
    db: Database,
    max_attempts: u32,
    backoff_base_secs: u64,
    backoff_cap_secs: u64,
    lease_secs: u64,
}

impl TaskQueue {
    pub fn new(db: Database, config: &EngineConfig) -> Self {
        Self {
            db,
            max_attempts: config.max_attempts,
            backoff_base_secs: config.backoff_base_secs,
            backoff_cap_secs: config.backoff_cap_secs,
            lease_secs: config.lease_secs,
        }
    }

    /// Enqueue a payload as a new pending task, due immediately.
    ///
    /// Returns the task id, or `None` when an identical live task already
    /// exists (the tick uses this to avoid duplicate dialog work).
    pub async fn enqueue_unique(
        &self,
        task_type: TaskType,
        priority: i64,
        payload: &TaskPayload,
    ) -> Result<Option<String>, ParlanceError> {
        let json = payload.to_json()?;
        if tasks::has_live_with_payload(&self.db, &json).await? {
            debug!(payload = %json, "skipping enqueue, live task exists");
            return Ok(None);
        }
        let id = tasks::enqueue(&self.db, task_type, priority, &json, &now_string()).await?;
        Ok(Some(id))
    }

    /// Enqueue without the duplicate check.
    pub async fn enqueue(
        &self,
        task_type: TaskType,
        priority: i64,
        payload: &TaskPayload,
    ) -> Result<String, ParlanceError> {
        let json = payload.to_json()?;
        tasks::enqueue(&self.db, task_type, priority, &json, &now_string()).await
    }

    /// Lease the next eligible task for `worker_id`. Tasks whose lease
    /// expired (crashed worker) are eligible again.
    pub async fn lease(&self, worker_id: &str) -> Result<Option<TaskRow>, ParlanceError> {
        let cutoff = (Utc::now() - Duration::seconds(self.lease_secs as i64))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        tasks::lease(&self.db, worker_id, &cutoff).await
    }

    /// Mark a leased task completed. Returns false if the lease was lost.
    pub async fn complete(&self, task_id: &str) -> Result<bool, ParlanceError> {
        let ok = tasks::complete(&self.db, task_id).await?;
        if !ok {
            warn!(task_id, "complete dropped: lease was reclaimed");
        }
        Ok(ok)
    }

    /// Record a failure and decide retry versus terminal failure.
    pub async fn fail(&self, task: &TaskRow, error: &ParlanceError) -> Result<FailOutcome, ParlanceError> {
        let message = error.to_string();
        // attempt_count counts finished attempts; this one is in flight.
        let attempts_after = task.attempt_count + 1;

        if error.is_retryable() && attempts_after < self.max_attempts {
            let delay = self.backoff_delay_secs(task.attempt_count);
            let retry_at = (Utc::now() + Duration::seconds(delay as i64))
                .to_rfc3339_opts(SecondsFormat::Millis, true);
            if tasks::retry(&self.db, &task.id, &message, &retry_at).await? {
                info!(
                    task_id = %task.id,
                    attempt = attempts_after,
                    delay_secs = delay,
                    error = %message,
                    "task re-queued with backoff"
                );
                return Ok(FailOutcome::Retried);
            }
            return Ok(FailOutcome::Lost);
        }

        if tasks::mark_failed(&self.db, &task.id, &message).await? {
            warn!(
                task_id = %task.id,
                attempts = attempts_after,
                retryable = error.is_retryable(),
                error = %message,
                "task failed terminally"
            );
            return Ok(FailOutcome::Failed);
        }
        Ok(FailOutcome::Lost)
    }

    /// Cancel a task that has not yet finished.
    pub async fn cancel(&self, task_id: &str) -> Result<bool, ParlanceError> {
        tasks::cancel(&self.db, task_id).await
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<TaskRow>, ParlanceError> {
        tasks::get(&self.db, task_id).await
    }

    /// Queue depth per status.
    pub async fn depth(&self) -> Result<Vec<(TaskStatus, i64)>, ParlanceError> {
        tasks::counts_by_status(&self.db).await
    }

    /// Backoff for the retry after `attempt` finished attempts:
    /// `base * 2^attempt`, capped.
    pub fn backoff_delay_secs(&self, attempt: u32) -> u64 {
        backoff_delay_secs(self.backoff_base_secs, self.backoff_cap_secs, attempt)
    }
}

/// `base * 2^attempt` saturating at `cap`.
pub fn backoff_delay_secs(base: u64, cap: u64, attempt: u32) -> u64 {
    1u64.checked_shl(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(cap)
        .min(cap)
}
