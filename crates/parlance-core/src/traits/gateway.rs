// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging gateway capability: the external conversation service.

use async_trait::async_trait;

use crate::error::ParlanceError;
use crate::types::{ChatMessage, TransportAuth};

/// Capability interface over the external messaging service.
///
/// The wire format is owned by the implementation; the engine only sees
/// this contract. `parlance-telegram` is the production implementation and
/// `parlance-test-utils::MockGateway` is the deterministic test fake.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Fetch messages from a dialog newer than `since_id`, oldest first.
    ///
    /// With `since_id = None` the implementation returns a bounded recent
    /// window of at most `limit` messages.
    async fn list_new_messages(
        &self,
        auth: &TransportAuth,
        dialog_id: i64,
        since_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, ParlanceError>;

    /// Send `text` to a dialog. Returns the external id of the sent message.
    async fn send_message(
        &self,
        auth: &TransportAuth,
        dialog_id: i64,
        text: &str,
    ) -> Result<i64, ParlanceError>;

    /// Whether the external service still honors this credential.
    async fn is_authorized(&self, auth: &TransportAuth) -> Result<bool, ParlanceError>;
}
