// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of approved responses through the messaging gateway.

use std::sync::Arc;

use parlance_core::types::ResponseStatus;
use parlance_core::{MessagingGateway, ParlanceError};
use parlance_storage::queries::{dialogs, responses};
use parlance_storage::Database;
use parlance_vault::Vault;
use tracing::{info, warn};

pub struct ResponseSender {
    db: Database,
    vault: Arc<Vault>,
    gateway: Arc<dyn MessagingGateway>,
}

impl ResponseSender {
    pub fn new(db: Database, vault: Arc<Vault>, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self { db, vault, gateway }
    }

    /// Deliver one approved response.
    ///
    /// Transient gateway failures propagate so the queue retries the task;
    /// the response stays `approved` until delivery succeeds or the task
    /// goes terminal. Terminal errors mark the response `failed` here.
    pub async fn send(&self, response_id: &str) -> Result<(), ParlanceError> {
        let Some(response) = responses::get(&self.db, response_id).await? else {
            return Err(ParlanceError::Validation(format!(
                "response not found: {response_id}"
            )));
        };
        match response.status {
            ResponseStatus::Approved => {}
            // A retried task may find the response already delivered.
            ResponseStatus::Sent => {
                info!(response_id, "response already sent, nothing to do");
                return Ok(());
            }
            other => {
                return Err(ParlanceError::InvalidStateTransition {
                    from: other.to_string(),
                    action: "send".to_string(),
                });
            }
        }

        let Some(dialog) = dialogs::get(&self.db, &response.dialog_id).await? else {
            return Err(ParlanceError::Validation(format!(
                "dialog not found for response: {response_id}"
            )));
        };

        let auth = self.vault.materialize(&dialog.account_id).await?;

        match self
            .gateway
            .send_message(&auth, dialog.telegram_dialog_id, response.outgoing_text())
            .await
        {
            Ok(message_id) => {
                responses::mark_sent(&self.db, response_id).await?;
                // Our own outgoing message must not trigger a reply draft.
                dialogs::advance_cursor(&self.db, &dialog.id, message_id).await?;
                info!(response_id, message_id, "response delivered");
                Ok(())
            }
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                warn!(response_id, error = %e, "delivery failed terminally");
                responses::mark_failed(&self.db, response_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    /// Record terminal failure for a response whose delivery task exhausted
    /// its retries.
    pub async fn mark_failed(&self, response_id: &str, error: &str) -> Result<(), ParlanceError> {
        if responses::mark_failed(&self.db, response_id, error).await? {
            warn!(response_id, error, "response marked failed after retries");
        }
        Ok(())
    }
}
