// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits consumed by the engine.

pub mod gateway;
pub mod generator;

pub use gateway::MessagingGateway;
pub use generator::ResponseGenerator;
