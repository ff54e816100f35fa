// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./parlance.toml` > `~/.config/parlance/parlance.toml`
//! > `/etc/parlance/parlance.toml`, with environment overrides via the
//! `PARLANCE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ParlanceConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/parlance/parlance.toml` (system-wide)
/// 3. `~/.config/parlance/parlance.toml` (user XDG config)
/// 4. `./parlance.toml` (local directory)
/// 5. `PARLANCE_*` environment variables
pub fn load_config() -> Result<ParlanceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlanceConfig::default()))
        .merge(Toml::file("/etc/parlance/parlance.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("parlance/parlance.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("parlance.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<ParlanceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlanceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ParlanceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlanceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` instead of `Env::split("_")` so underscore-containing
/// key names stay unambiguous: `PARLANCE_ANTHROPIC_API_KEY` must map to
/// `anthropic.api_key`, not `anthropic.api.key`.
fn env_provider() -> Env {
    // PARLANCE_VAULT_KEY is the vault passphrase, read directly by
    // parlance-vault; it must never land in the config tree.
    Env::prefixed("PARLANCE_").ignore(&["vault_key"]).map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("telegram_", "telegram.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("session_", "session.", 1)
            .replacen("cleanup_", "cleanup.", 1)
            .replacen("vault_", "vault.", 1);
        mapped.into()
    })
}
