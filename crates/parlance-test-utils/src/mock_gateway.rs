// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging gateway with scripted dialogs and failure injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use parlance_core::{ChatMessage, MessagingGateway, ParlanceError, TransportAuth};

/// What the next gateway call should do instead of succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Return a transient error (retryable).
    Transient,
    /// Return a credentials-invalid error (terminal).
    CredentialsInvalid,
}

/// A scripted gateway: per-dialog message logs, recorded sends, and
/// injectable failures.
///
/// Failures are one-shot per queued entry: each injected failure consumes
/// itself, so "fail twice then succeed" is two pushes.
pub struct MockGateway {
    messages: Arc<Mutex<HashMap<i64, Vec<ChatMessage>>>>,
    sent: Arc<Mutex<Vec<(i64, String)>>>,
    failures: Arc<Mutex<Vec<FailureMode>>>,
    next_message_id: AtomicI64,
    authorized: Arc<Mutex<bool>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
            next_message_id: AtomicI64::new(1000),
            authorized: Arc::new(Mutex::new(true)),
        }
    }

    /// Append an incoming message to a dialog's log and return its id.
    pub async fn push_message(&self, dialog_id: i64, sender: &str, text: &str) -> i64 {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let msg = ChatMessage {
            id,
            sender_name: sender.to_string(),
            text: text.to_string(),
            timestamp: chrono::Utc::now(),
            outgoing: false,
        };
        self.messages.lock().await.entry(dialog_id).or_default().push(msg);
        id
    }

    /// Queue a one-shot failure for the next gateway call.
    pub async fn inject_failure(&self, mode: FailureMode) {
        self.failures.lock().await.push(mode);
    }

    /// Flip the answer `is_authorized` gives.
    pub async fn set_authorized(&self, authorized: bool) {
        *self.authorized.lock().await = authorized;
    }

    /// Everything sent through this gateway, as `(dialog_id, text)`.
    pub async fn sent_messages(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }

    async fn take_failure(&self, auth: &TransportAuth) -> Result<(), ParlanceError> {
        let mode = self.failures.lock().await.pop();
        match mode {
            Some(FailureMode::Transient) => {
                Err(ParlanceError::transient("injected transport failure"))
            }
            Some(FailureMode::CredentialsInvalid) => Err(ParlanceError::CredentialsInvalid {
                account_id: auth.account_id.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingGateway for MockGateway {
    async fn list_new_messages(
        &self,
        auth: &TransportAuth,
        dialog_id: i64,
        since_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, ParlanceError> {
        self.take_failure(auth).await?;
        let messages = self.messages.lock().await;
        let log = messages.get(&dialog_id).cloned().unwrap_or_default();
        let filtered: Vec<ChatMessage> = log
            .into_iter()
            .filter(|m| since_id.is_none_or(|since| m.id > since))
            .take(limit as usize)
            .collect();
        Ok(filtered)
    }

    async fn send_message(
        &self,
        auth: &TransportAuth,
        dialog_id: i64,
        text: &str,
    ) -> Result<i64, ParlanceError> {
        self.take_failure(auth).await?;
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().await.push((dialog_id, text.to_string()));
        // The outgoing message also lands in the dialog log.
        self.messages.lock().await.entry(dialog_id).or_default().push(ChatMessage {
            id,
            sender_name: "me".to_string(),
            text: text.to_string(),
            timestamp: chrono::Utc::now(),
            outgoing: true,
        });
        Ok(id)
    }

    async fn is_authorized(&self, auth: &TransportAuth) -> Result<bool, ParlanceError> {
        self.take_failure(auth).await?;
        Ok(*self.authorized.lock().await)
    }
}
