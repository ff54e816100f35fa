// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the session-bridge HTTP API.

use chrono::{DateTime, Utc};
use parlance_core::types::ChatMessage;
use serde::{Deserialize, Serialize};

/// One message as the bridge reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: i64,
    pub sender_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub outgoing: bool,
}

impl From<WireMessage> for ChatMessage {
    fn from(m: WireMessage) -> Self {
        ChatMessage {
            id: m.id,
            sender_name: m.sender_name,
            text: m.text,
            timestamp: m.timestamp,
            outgoing: m.outgoing,
        }
    }
}

/// Body of `GET /dialogs/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<WireMessage>,
}

/// Request body for `POST /dialogs/{id}/messages`.
#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub text: &'a str,
}

/// Body of a successful send.
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub message_id: i64,
}

/// Error body the bridge returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct BridgeErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_parses_and_converts() {
        let raw = r#"{
            "id": 42,
            "sender_name": "Alice",
            "text": "hello",
            "timestamp": "2026-03-01T12:00:00.000Z",
            "outgoing": false
        }"#;
        let wire: WireMessage = serde_json::from_str(raw).unwrap();
        let msg: ChatMessage = wire.into();
        assert_eq!(msg.id, 42);
        assert_eq!(msg.sender_name, "Alice");
        assert!(!msg.outgoing);
    }
}
