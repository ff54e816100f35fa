// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the record store, one struct per table.
//!
//! Timestamps stay as the ISO-8601 strings the store writes; callers that
//! need arithmetic parse them with chrono. Status columns are parsed into
//! the typed enums from `parlance-core` at read time.

use std::str::FromStr;

use parlance_core::types::{ResponseStatus, SessionStatus, TaskStatus, TaskType};

/// An external identity, possibly still mid-handshake.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub id: String,
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub is_temporary: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Encrypted transport credential blob for one account.
#[derive(Debug, Clone)]
pub struct CredentialRow {
    pub id: String,
    pub account_id: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Web login session record.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub account_id: String,
    pub status: SessionStatus,
    pub token: String,
    pub refresh_token: Option<String>,
    pub expires_at: String,
    pub last_activity: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A dialog opted into processing.
#[derive(Debug, Clone)]
pub struct DialogRow {
    pub id: String,
    pub account_id: String,
    pub telegram_dialog_id: i64,
    pub title: String,
    pub processing_enabled: bool,
    pub auto_send_enabled: bool,
    pub priority: i64,
    pub last_processed_message_id: Option<i64>,
    pub last_processed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A queued background task.
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: i64,
    pub payload: String,
    pub error: Option<String>,
    pub attempt_count: u32,
    pub scheduled_at: String,
    pub locked_by: Option<String>,
    pub locked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A generated response awaiting or past human review.
#[derive(Debug, Clone)]
pub struct ResponseRow {
    pub id: String,
    pub dialog_id: String,
    pub last_message_id: i64,
    pub last_message_timestamp: String,
    pub suggested_text: String,
    pub edited_text: Option<String>,
    pub status: ResponseStatus,
    pub model_name: String,
    pub error: Option<String>,
    pub approved_at: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ResponseRow {
    /// The text that will actually be sent: the human edit when present,
    /// otherwise the model's suggestion.
    pub fn outgoing_text(&self) -> &str {
        self.edited_text.as_deref().unwrap_or(&self.suggested_text)
    }
}

/// Per-account model/prompt preference.
#[derive(Debug, Clone)]
pub struct ModelPrefRow {
    pub id: String,
    pub account_id: String,
    pub model_name: String,
    pub system_prompt: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Parse a status TEXT column into its enum, reporting malformed values as
/// a column conversion failure instead of panicking.
pub(crate) fn parse_enum_column<T>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
{
    raw.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized enum value: {raw}").into(),
        )
    })
}
