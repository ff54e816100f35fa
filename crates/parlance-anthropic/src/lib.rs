// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API integration for Parlance.
//!
//! [`AnthropicGenerator`] implements [`parlance_core::ResponseGenerator`]
//! by folding a dialog's recent messages into an alternating-role
//! conversation and requesting one completion. Failure classification is
//! the contract here: rate limits and provider 5xx are retried by the task
//! queue, policy refusals are terminal.

pub mod client;
pub mod generator;
pub mod types;

pub use client::AnthropicClient;
pub use generator::AnthropicGenerator;
