// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parlance engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so typos in config keys
//! fail loudly at startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Parlance configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with `PARLANCE_*`
/// environment variable overrides. All sections default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParlanceConfig {
    /// Worker pool, ticker, and retry policy settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Record store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Messaging gateway settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Web login session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Cleanup sweeper settings.
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,
}

/// Worker pool, ticker, and retry policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of concurrent workers leasing from the task queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between scheduler ticks that enqueue due dialog tasks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// How long a worker's lease on a task lasts before it is presumed
    /// abandoned and reclaimed.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Retry ceiling: a task failing more than this many times goes terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential backoff schedule, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Cap on a single backoff delay, in seconds.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,

    /// Hard timeout for gateway and generator calls, in seconds.
    /// Must stay below `lease_secs` so a stuck call cannot outlive a lease.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Recent-window size when a dialog has no cursor yet.
    #[serde(default = "default_initial_fetch_limit")]
    pub initial_fetch_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            tick_interval_secs: default_tick_interval_secs(),
            lease_secs: default_lease_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            initial_fetch_limit: default_initial_fetch_limit(),
        }
    }
}

fn default_workers() -> usize {
    5
}

fn default_tick_interval_secs() -> u64 {
    1800
}

fn default_lease_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_backoff_cap_secs() -> u64 {
    3600
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_initial_fetch_limit() -> u32 {
    20
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "parlance.db".to_string()
}

/// Messaging gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Base URL of the Telegram session bridge.
    #[serde(default = "default_telegram_base_url")]
    pub base_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            base_url: default_telegram_base_url(),
        }
    }
}

fn default_telegram_base_url() -> String {
    "https://bridge.parlance.local/api/v1".to_string()
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires an environment variable override.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default model when an account has no model preference.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per draft.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Web login session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Access token lifetime in minutes.
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,

    /// Refresh token lifetime in minutes.
    #[serde(default = "default_refresh_ttl_minutes")]
    pub refresh_ttl_minutes: i64,

    /// Authenticated sessions idle longer than this are expired.
    #[serde(default = "default_idle_days")]
    pub idle_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_minutes: default_refresh_ttl_minutes(),
            idle_days: default_idle_days(),
        }
    }
}

fn default_access_ttl_minutes() -> i64 {
    60
}

fn default_refresh_ttl_minutes() -> i64 {
    10080
}

fn default_idle_days() -> i64 {
    7
}

/// Cleanup sweeper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Seconds between sweeper runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Hours a temporary account may exist without completing the handshake.
    #[serde(default = "default_account_grace_hours")]
    pub account_grace_hours: i64,

    /// Days to keep terminal task and response rows before pruning.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            account_grace_hours: default_account_grace_hours(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_account_grace_hours() -> i64 {
    24
}

fn default_retention_days() -> i64 {
    30
}

/// Credential vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Argon2id memory cost in KiB.
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id lane count.
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}
