// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parlance background processing engine.
//!
//! Defines the error taxonomy, the domain status enums, and the two
//! capability traits ([`MessagingGateway`], [`ResponseGenerator`]) that the
//! engine consumes. Everything else in the workspace depends on this crate.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ParlanceError;
pub use traits::{MessagingGateway, ResponseGenerator};
pub use types::{
    ChatMessage, Draft, ResponseStatus, SessionStatus, TaskStatus, TaskType, TransportAuth,
};
