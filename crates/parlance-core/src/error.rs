// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the Parlance engine.
//!
//! Every failure that reaches the task queue boundary is classified by
//! [`ParlanceError::is_retryable`]: retryable errors re-queue the task with
//! backoff, everything else is terminal for that task.

use thiserror::Error;

/// The primary error type used across the Parlance workspace.
#[derive(Debug, Error)]
pub enum ParlanceError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Record store errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transient upstream failures: network errors, provider 5xx,
    /// timeouts, rate limits. Retried with exponential backoff.
    #[error("transient error: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The stored transport credentials are missing, revoked, or expired.
    /// Never retried automatically; requires human re-authentication.
    #[error("credentials invalid for account {account_id}")]
    CredentialsInvalid { account_id: String },

    /// A guarded state-machine transition was attempted from the wrong
    /// source state. Rejected locally with no side effect.
    #[error("invalid state transition: cannot {action} from {from}")]
    InvalidStateTransition { from: String, action: String },

    /// The generation provider refused the request permanently
    /// (bad request, content policy). Recorded on the response, no retry.
    #[error("content policy error: {0}")]
    ContentPolicy(String),

    /// Malformed task payload, missing dialog, or similar caller error.
    /// Terminal; logged with payload context.
    #[error("validation error: {0}")]
    Validation(String),

    /// Credential vault errors: key derivation, seal/open failures,
    /// corrupted vault metadata.
    #[error("vault error: {0}")]
    Vault(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParlanceError {
    /// Whether the task queue should re-queue the failed task with backoff.
    ///
    /// Storage errors count as retryable: the record store is a network
    /// collaborator and a failed write says nothing about the task itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ParlanceError::Transient { .. } | ParlanceError::Storage { .. }
        )
    }

    /// Shorthand for a transient error with no underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        ParlanceError::Transient {
            message: message.into(),
            source: None,
        }
    }
}
