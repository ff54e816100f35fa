// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Parlance workspace.
//!
//! Status enums are the single source of truth for the state machines in
//! the engine. They serialize to `snake_case` strings, which is exactly how
//! the record store persists them -- guarded SQL transitions compare against
//! the same strings these enums render to.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Type of a queued background task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Process new messages in one dialog.
    Dialog,
    /// Account-scoped work (handshake completion, preference sync).
    User,
    /// Engine-internal work (sending an approved response).
    System,
}

/// Lifecycle status of a queued task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses admit no further automatic transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Lifecycle status of a web login session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Authenticated,
    Error,
    Expired,
}

/// Lifecycle status of a generated response.
///
/// `PendingApproval -> Approved | Rejected`, then `Approved -> Sent | Failed`.
/// `Rejected`, `Sent`, and `Failed` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    PendingApproval,
    Approved,
    Rejected,
    Sent,
    Failed,
}

impl ResponseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResponseStatus::Rejected | ResponseStatus::Sent | ResponseStatus::Failed
        )
    }
}

/// One message fetched from an external dialog.
///
/// Message bodies are never persisted -- this type only lives between a
/// gateway fetch and the generated response derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// External message id; ordering of ids follows the external service.
    pub id: i64,
    /// Display name of the sender.
    pub sender_name: String,
    /// Message text.
    pub text: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// True if the account owner sent this message.
    pub outgoing: bool,
}

/// A decrypted transport credential handle for one account.
///
/// Produced only by the vault's decrypt boundary. The session string is
/// wrapped in [`SecretString`] so it is redacted from Debug output and
/// zeroized on drop.
#[derive(Clone)]
pub struct TransportAuth {
    /// Internal account id this handle belongs to.
    pub account_id: String,
    /// Opaque externally-issued session credential.
    pub session: SecretString,
}

impl std::fmt::Debug for TransportAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportAuth")
            .field("account_id", &self.account_id)
            .field("session", &"[REDACTED]")
            .finish()
    }
}

/// A drafted reply produced by a [`crate::ResponseGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Suggested reply text.
    pub text: String,
    /// Model that produced the draft.
    pub model: String,
}
