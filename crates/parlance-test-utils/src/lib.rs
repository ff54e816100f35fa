// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic test doubles for the engine's external seams.
//!
//! `MockGateway` and `MockGenerator` implement the core traits with
//! scripted behavior, enabling fast, CI-runnable tests without a live
//! transport bridge or model provider.

pub mod mock_gateway;
pub mod mock_generator;

pub use mock_gateway::MockGateway;
pub use mock_generator::MockGenerator;
