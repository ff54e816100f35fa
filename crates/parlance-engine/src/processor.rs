// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dialog pipeline: pull new messages, draft a reply, park it for
//! approval.
//!
//! The cursor only advances after a draft is durably recorded (or the
//! batch turned out to need no reply). Any failure before that point
//! leaves the cursor untouched, so a retry re-reads the same messages.

use std::sync::Arc;
use std::time::Duration;

use parlance_config::model::EngineConfig;
use parlance_core::types::TaskType;
use parlance_core::{MessagingGateway, ParlanceError, ResponseGenerator};
use parlance_storage::queries::{dialogs, model_prefs, responses};
use parlance_storage::{Database, DialogRow};
use parlance_vault::Vault;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::queue::TaskQueue;
use crate::task::TaskPayload;

/// What a processing run did for a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The dialog is deselected; nothing to do.
    Disabled,
    /// No messages past the cursor.
    NoNewMessages,
    /// New messages, but none of them incoming; cursor advanced.
    NothingToAnswer,
    /// A draft was written and is awaiting review.
    Drafted,
    /// A draft was written, auto-approved, and queued for delivery.
    AutoSent,
    /// The draft was blocked by an existing approved response.
    Blocked,
}

pub struct DialogProcessor {
    db: Database,
    vault: Arc<Vault>,
    gateway: Arc<dyn MessagingGateway>,
    generator: Arc<dyn ResponseGenerator>,
    queue: TaskQueue,
    default_model: String,
    call_timeout: Duration,
    initial_fetch_limit: u32,
}

impl DialogProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        vault: Arc<Vault>,
        gateway: Arc<dyn MessagingGateway>,
        generator: Arc<dyn ResponseGenerator>,
        queue: TaskQueue,
        config: &EngineConfig,
        default_model: String,
    ) -> Self {
        Self {
            db,
            vault,
            gateway,
            generator,
            queue,
            default_model,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            initial_fetch_limit: config.initial_fetch_limit,
        }
    }

    /// Run the full pipeline for one dialog.
    pub async fn process(&self, dialog_id: &str) -> Result<ProcessOutcome, ParlanceError> {
        let Some(dialog) = dialogs::get(&self.db, dialog_id).await? else {
            return Err(ParlanceError::Validation(format!(
                "dialog not found: {dialog_id}"
            )));
        };
        if !dialog.processing_enabled {
            debug!(dialog_id, "dialog deselected, skipping");
            return Ok(ProcessOutcome::Disabled);
        }

        let auth = self.vault.materialize(&dialog.account_id).await?;

        let mut messages = self
            .bounded(self.gateway.list_new_messages(
                &auth,
                dialog.telegram_dialog_id,
                dialog.last_processed_message_id,
                self.initial_fetch_limit,
            ))
            .await?;
        // Normalize the batch: ascending external id, duplicates dropped.
        messages.sort_by_key(|m| m.id);
        messages.dedup_by_key(|m| m.id);

        if messages.is_empty() {
            dialogs::touch_processed_at(&self.db, &dialog.id).await?;
            return Ok(ProcessOutcome::NoNewMessages);
        }

        let newest = messages
            .iter()
            .max_by_key(|m| m.id)
            .cloned()
            .ok_or_else(|| ParlanceError::Internal("empty batch after check".to_string()))?;

        if !messages.iter().any(|m| !m.outgoing) {
            // Only our own messages arrived; nothing to reply to.
            dialogs::advance_cursor(&self.db, &dialog.id, newest.id).await?;
            return Ok(ProcessOutcome::NothingToAnswer);
        }

        let (model, system_prompt) = self.resolve_model(&dialog).await?;
        let draft = match self
            .bounded(self.generator.draft(&messages, &model, &system_prompt))
            .await
        {
            Ok(draft) => draft,
            Err(e) if !e.is_retryable() => {
                // A refusal will not succeed on a re-run. Record the failure
                // where a reviewer can see it and mark the batch covered, or
                // the tick would re-draft the same messages forever.
                warn!(dialog_id, error = %e, "draft generation failed permanently");
                responses::record_draft_failure(
                    &self.db,
                    &dialog.id,
                    newest.id,
                    &newest.timestamp.to_rfc3339(),
                    &e.to_string(),
                    &model,
                )
                .await?;
                dialogs::advance_cursor(&self.db, &dialog.id, newest.id).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let written = responses::upsert_pending(
            &self.db,
            &dialog.id,
            newest.id,
            &newest.timestamp.to_rfc3339(),
            &draft.text,
            &draft.model,
        )
        .await?;

        // The batch is answered (or deliberately blocked); either way these
        // messages are covered and must not be re-read.
        dialogs::advance_cursor(&self.db, &dialog.id, newest.id).await?;

        if !written {
            info!(dialog_id, "draft blocked by an approved response in flight");
            return Ok(ProcessOutcome::Blocked);
        }

        if dialog.auto_send_enabled {
            return self.auto_send(&dialog).await;
        }

        info!(dialog_id, newest_message_id = newest.id, "draft awaiting approval");
        Ok(ProcessOutcome::Drafted)
    }

    /// Auto-approve the fresh draft and queue its delivery.
    async fn auto_send(&self, dialog: &DialogRow) -> Result<ProcessOutcome, ParlanceError> {
        let Some(response) = responses::get_for_dialog(&self.db, &dialog.id).await? else {
            return Err(ParlanceError::Internal(
                "draft disappeared before auto-send".to_string(),
            ));
        };
        if !responses::approve(&self.db, &response.id, None).await? {
            // A human raced us; leave their decision alone.
            warn!(dialog_id = %dialog.id, "auto-send skipped, response no longer pending");
            return Ok(ProcessOutcome::Drafted);
        }
        self.queue
            .enqueue(
                TaskType::System,
                dialog.priority,
                &TaskPayload::SendResponse {
                    response_id: response.id.clone(),
                },
            )
            .await?;
        info!(dialog_id = %dialog.id, response_id = %response.id, "draft auto-approved and queued");
        Ok(ProcessOutcome::AutoSent)
    }

    async fn resolve_model(&self, dialog: &DialogRow) -> Result<(String, String), ParlanceError> {
        match model_prefs::get(&self.db, &dialog.account_id).await? {
            Some(pref) => Ok((pref.model_name, pref.system_prompt.unwrap_or_default())),
            None => Ok((self.default_model.clone(), String::new())),
        }
    }

    /// Apply the hard call timeout; an elapsed timer is a transient error.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ParlanceError>>,
    ) -> Result<T, ParlanceError> {
        match timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ParlanceError::transient("upstream call timed out")),
        }
    }
}
