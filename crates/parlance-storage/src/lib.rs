// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed record store for the engine.
//!
//! One database file holds accounts, sealed credentials, sessions, dialog
//! selections, the task queue, generated responses, and model preferences.
//! Migrations are embedded and applied on open. All cross-worker
//! coordination happens through conditional writes in [`queries`].

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, now_string};
pub use models::{
    AccountRow, CredentialRow, DialogRow, ModelPrefRow, ResponseRow, SessionRow, TaskRow,
};
