// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod accounts;
pub mod credentials;
pub mod dialogs;
pub mod model_prefs;
pub mod responses;
pub mod sessions;
pub mod tasks;
pub mod vault_meta;
