// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response generator capability: the language-model service.

use async_trait::async_trait;

use crate::error::ParlanceError;
use crate::types::{ChatMessage, Draft};

/// Capability interface over the language-model provider.
///
/// Implementations classify their failures: provider 5xx, timeouts, and
/// rate limits surface as [`ParlanceError::Transient`]; policy refusals and
/// malformed requests surface as [`ParlanceError::ContentPolicy`] /
/// [`ParlanceError::Validation`] and are never retried.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Draft a reply to the given conversation context.
    ///
    /// `context` is ordered oldest first; the last entry is the message
    /// being replied to.
    async fn draft(
        &self,
        context: &[ChatMessage],
        model_name: &str,
        system_prompt: &str,
    ) -> Result<Draft, ParlanceError>;
}
