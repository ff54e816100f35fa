// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for Parlance.
//!
//! Implements [`parlance_core::MessagingGateway`] against the session
//! bridge's HTTP API. See [`gateway::TelegramGateway`].

pub mod gateway;
pub mod types;

pub use gateway::TelegramGateway;
