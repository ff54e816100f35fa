// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task payloads carried through the queue as JSON.

use parlance_core::ParlanceError;
use serde::{Deserialize, Serialize};

/// The work a queued task describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Pull new messages for a dialog and draft a reply.
    ProcessDialog { dialog_id: String },
    /// Deliver an approved response.
    SendResponse { response_id: String },
}

impl TaskPayload {
    pub fn to_json(&self) -> Result<String, ParlanceError> {
        serde_json::to_string(self)
            .map_err(|e| ParlanceError::Internal(format!("payload serialization failed: {e}")))
    }

    /// Parse a stored payload. Malformed JSON is a validation error: the
    /// task is terminal, not retryable.
    pub fn from_json(raw: &str) -> Result<Self, ParlanceError> {
        serde_json::from_str(raw)
            .map_err(|e| ParlanceError::Validation(format!("malformed task payload: {e}")))
    }
}
