// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human review actions on drafted responses.
//!
//! Approve and reject are race-safe: the underlying conditional UPDATE
//! admits exactly one winner, and the loser gets
//! [`ParlanceError::InvalidStateTransition`] with no side effect. Approval
//! is the only path that queues delivery, so a response is sent at most
//! once per approval.

use parlance_core::ParlanceError;
use parlance_core::types::TaskType;
use parlance_storage::queries::responses;
use parlance_storage::{Database, ResponseRow};
use tracing::info;

use crate::queue::TaskQueue;
use crate::task::TaskPayload;

pub struct ResponseLifecycle {
    db: Database,
    queue: TaskQueue,
}

impl ResponseLifecycle {
    pub fn new(db: Database, queue: TaskQueue) -> Self {
        Self { db, queue }
    }

    /// Approve a pending draft, optionally replacing its text with a human
    /// edit, and queue exactly one delivery task.
    pub async fn approve(
        &self,
        response_id: &str,
        edited_text: Option<&str>,
    ) -> Result<String, ParlanceError> {
        if !responses::approve(&self.db, response_id, edited_text).await? {
            return Err(self.transition_error(response_id, "approve").await?);
        }
        let task_id = self
            .queue
            .enqueue(
                TaskType::System,
                0,
                &TaskPayload::SendResponse {
                    response_id: response_id.to_string(),
                },
            )
            .await?;
        info!(response_id, task_id, "response approved, delivery queued");
        Ok(task_id)
    }

    /// Reject a pending draft. The dialog becomes eligible for a fresh
    /// draft on its next processing run.
    pub async fn reject(&self, response_id: &str) -> Result<(), ParlanceError> {
        if !responses::reject(&self.db, response_id).await? {
            return Err(self.transition_error(response_id, "reject").await?);
        }
        info!(response_id, "response rejected");
        Ok(())
    }

    pub async fn get(&self, response_id: &str) -> Result<Option<ResponseRow>, ParlanceError> {
        responses::get(&self.db, response_id).await
    }

    /// Drafts awaiting review across one account's dialogs.
    pub async fn pending_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<ResponseRow>, ParlanceError> {
        responses::list_pending_for_account(&self.db, account_id).await
    }

    /// Build the precise transition error for a guarded update that
    /// matched no row.
    async fn transition_error(
        &self,
        response_id: &str,
        action: &str,
    ) -> Result<ParlanceError, ParlanceError> {
        let from = match responses::get(&self.db, response_id).await? {
            Some(row) => row.status.to_string(),
            None => {
                return Ok(ParlanceError::Validation(format!(
                    "response not found: {response_id}"
                )));
            }
        };
        Ok(ParlanceError::InvalidStateTransition {
            from,
            action: action.to_string(),
        })
    }
}
