// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted credential vault.
//!
//! Transport sessions are sealed with AES-256-GCM under a random master
//! key; the master key is wrapped by an Argon2id-derived key from the
//! operator passphrase. See [`vault::Vault`].

pub mod crypto;
pub mod kdf;
pub mod prompt;
pub mod vault;

pub use prompt::{get_vault_passphrase, get_vault_passphrase_with_confirm};
pub use vault::Vault;
