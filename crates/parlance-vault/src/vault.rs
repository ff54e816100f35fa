// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault lifecycle: create, unlock, and the per-account credential flow.
//!
//! The vault uses a key-wrapping pattern:
//! - A random master key seals every credential blob (credentials table).
//! - The master key itself is sealed with a key derived from the operator
//!   passphrase via Argon2id and stored in vault_meta.
//! - Changing the passphrase only re-wraps the master key; credential blobs
//!   are never re-encrypted.

use parlance_config::model::VaultConfig;
use parlance_core::{ParlanceError, TransportAuth};
use parlance_storage::Database;
use parlance_storage::queries::{credentials, vault_meta};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const META_WRAPPED_MASTER_KEY: &str = "wrapped_master_key";
const META_MASTER_KEY_NONCE: &str = "master_key_nonce";
const META_KDF_SALT: &str = "kdf_salt";
const META_KDF_PARAMS: &str = "kdf_params";

use crate::crypto;
use crate::kdf;

/// The unlocked vault, holding the master key in memory only.
pub struct Vault {
    master_key: Zeroizing<[u8; 32]>,
    db: Database,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

impl Vault {
    /// Whether a vault has been initialized in this database.
    pub async fn exists(db: &Database) -> Result<bool, ParlanceError> {
        Ok(vault_meta::get(db, META_WRAPPED_MASTER_KEY).await?.is_some())
    }

    /// Initialize a new vault: generate a random master key and store it
    /// wrapped by the passphrase-derived key.
    pub async fn create(
        db: Database,
        passphrase: &SecretString,
        config: &VaultConfig,
    ) -> Result<Self, ParlanceError> {
        let master_key = crypto::generate_random_key()?;

        let salt = kdf::generate_salt()?;
        let wrapping_key = kdf::derive_key(
            passphrase.expose_secret().as_bytes(),
            &salt,
            config.kdf_memory_cost,
            config.kdf_iterations,
            config.kdf_parallelism,
        )?;
        let (wrapped_master_key, wrap_nonce) = crypto::seal(&wrapping_key, &master_key)?;

        let kdf_params = serde_json::json!({
            "memory_cost": config.kdf_memory_cost,
            "iterations": config.kdf_iterations,
            "parallelism": config.kdf_parallelism,
        });

        // First writer wins; a second initializer races cleanly into unlock.
        let created =
            vault_meta::set_if_absent(&db, META_WRAPPED_MASTER_KEY, &wrapped_master_key).await?;
        if !created {
            return Err(ParlanceError::Vault(
                "vault already initialized".to_string(),
            ));
        }
        vault_meta::set(&db, META_MASTER_KEY_NONCE, &wrap_nonce).await?;
        vault_meta::set(&db, META_KDF_SALT, &salt).await?;
        vault_meta::set(&db, META_KDF_PARAMS, kdf_params.to_string().as_bytes()).await?;

        info!("vault created");
        Ok(Self {
            master_key: Zeroizing::new(master_key),
            db,
        })
    }

    /// Unlock an existing vault by unwrapping the stored master key.
    pub async fn unlock(db: Database, passphrase: &SecretString) -> Result<Self, ParlanceError> {
        let wrapped = require_meta(&db, META_WRAPPED_MASTER_KEY).await?;
        let nonce_vec = require_meta(&db, META_MASTER_KEY_NONCE).await?;
        let salt_vec = require_meta(&db, META_KDF_SALT).await?;
        let params_bytes = require_meta(&db, META_KDF_PARAMS).await?;

        let kdf_params: serde_json::Value = serde_json::from_slice(&params_bytes)
            .map_err(|e| ParlanceError::Vault(format!("corrupted KDF params: {e}")))?;
        let memory_cost = read_param(&kdf_params, "memory_cost")?;
        let iterations = read_param(&kdf_params, "iterations")?;
        let parallelism = read_param(&kdf_params, "parallelism")?;

        let salt: [u8; 16] = salt_vec
            .try_into()
            .map_err(|_| ParlanceError::Vault("corrupted salt (expected 16 bytes)".to_string()))?;
        let nonce: [u8; 12] = nonce_vec
            .try_into()
            .map_err(|_| ParlanceError::Vault("corrupted nonce (expected 12 bytes)".to_string()))?;

        let wrapping_key = kdf::derive_key(
            passphrase.expose_secret().as_bytes(),
            &salt,
            memory_cost,
            iterations,
            parallelism,
        )?;

        let master_key_bytes = crypto::open(&wrapping_key, &nonce, &wrapped).map_err(|_| {
            ParlanceError::Vault(
                "invalid passphrase or corrupted vault -- decryption failed".to_string(),
            )
        })?;
        let master_key: [u8; 32] = master_key_bytes.try_into().map_err(|_| {
            ParlanceError::Vault("corrupted master key (expected 32 bytes)".to_string())
        })?;

        debug!("vault unlocked");
        Ok(Self {
            master_key: Zeroizing::new(master_key),
            db,
        })
    }

    /// Open an existing vault or initialize a fresh one.
    pub async fn open(
        db: Database,
        passphrase: &SecretString,
        config: &VaultConfig,
    ) -> Result<Self, ParlanceError> {
        if Self::exists(&db).await? {
            Self::unlock(db, passphrase).await
        } else {
            Self::create(db, passphrase, config).await
        }
    }

    /// Seal a transport session string for an account and store it as the
    /// account's active credentials.
    pub async fn store_credentials(
        &self,
        account_id: &str,
        session: &SecretString,
    ) -> Result<(), ParlanceError> {
        let (ciphertext, nonce) =
            crypto::seal(&self.master_key, session.expose_secret().as_bytes())?;
        credentials::upsert(&self.db, account_id, &ciphertext, &nonce).await?;
        debug!(account_id, "credentials sealed and stored");
        Ok(())
    }

    /// Decrypt an account's active credentials into a [`TransportAuth`].
    ///
    /// Missing, invalidated, or undecryptable credentials all surface as
    /// [`ParlanceError::CredentialsInvalid`]; callers treat that as a
    /// terminal, human-actionable condition.
    pub async fn materialize(&self, account_id: &str) -> Result<TransportAuth, ParlanceError> {
        let Some(row) = credentials::get_active(&self.db, account_id).await? else {
            return Err(ParlanceError::CredentialsInvalid {
                account_id: account_id.to_string(),
            });
        };

        let nonce: [u8; 12] = row.nonce.try_into().map_err(|_| {
            ParlanceError::Vault("corrupted nonce in credential row".to_string())
        })?;
        let plaintext = match crypto::open(&self.master_key, &nonce, &row.ciphertext) {
            Ok(p) => p,
            Err(_) => {
                warn!(account_id, "credential blob failed to decrypt");
                return Err(ParlanceError::CredentialsInvalid {
                    account_id: account_id.to_string(),
                });
            }
        };
        let session = String::from_utf8(plaintext).map_err(|_| {
            ParlanceError::Vault("decrypted credential is not valid UTF-8".to_string())
        })?;

        Ok(TransportAuth {
            account_id: account_id.to_string(),
            session: SecretString::from(session),
        })
    }

    /// Deactivate an account's credentials after the transport rejects
    /// them. Re-authentication stores a fresh blob.
    pub async fn invalidate(&self, account_id: &str) -> Result<bool, ParlanceError> {
        let changed = credentials::invalidate(&self.db, account_id).await?;
        if changed {
            info!(account_id, "credentials invalidated");
        }
        Ok(changed)
    }

    /// Re-wrap the master key under a new passphrase. Credential blobs are
    /// untouched.
    pub async fn change_passphrase(
        &self,
        new_passphrase: &SecretString,
        config: &VaultConfig,
    ) -> Result<(), ParlanceError> {
        let new_salt = kdf::generate_salt()?;
        let new_wrapping_key = kdf::derive_key(
            new_passphrase.expose_secret().as_bytes(),
            &new_salt,
            config.kdf_memory_cost,
            config.kdf_iterations,
            config.kdf_parallelism,
        )?;
        let (new_wrapped_key, new_nonce) = crypto::seal(&new_wrapping_key, &*self.master_key)?;

        let kdf_params = serde_json::json!({
            "memory_cost": config.kdf_memory_cost,
            "iterations": config.kdf_iterations,
            "parallelism": config.kdf_parallelism,
        });

        vault_meta::set(&self.db, META_WRAPPED_MASTER_KEY, &new_wrapped_key).await?;
        vault_meta::set(&self.db, META_MASTER_KEY_NONCE, &new_nonce).await?;
        vault_meta::set(&self.db, META_KDF_SALT, &new_salt).await?;
        vault_meta::set(&self.db, META_KDF_PARAMS, kdf_params.to_string().as_bytes()).await?;

        info!("vault passphrase changed");
        Ok(())
    }
}

async fn require_meta(db: &Database, key: &str) -> Result<Vec<u8>, ParlanceError> {
    vault_meta::get(db, key)
        .await?
        .ok_or_else(|| ParlanceError::Vault(format!("vault metadata missing: {key}")))
}

fn read_param(params: &serde_json::Value, name: &str) -> Result<u32, ParlanceError> {
    params[name]
        .as_u64()
        .map(|v| v as u32)
        .ok_or_else(|| ParlanceError::Vault(format!("missing {name} in KDF params")))
}
