// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web login sessions tied to transport authentication.
//!
//! A login starts as a temporary account plus a `pending` session. When the
//! transport confirms the identity, the account becomes permanent (or the
//! session is re-pointed at the existing permanent account), the transport
//! session blob is sealed into the vault, and the session turns
//! `authenticated` with a refresh token. A session never regresses to
//! `pending`.

use std::sync::Arc;

use chrono::{Duration, SecondsFormat, Utc};
use parlance_config::model::SessionConfig;
use parlance_core::ParlanceError;
use parlance_core::types::SessionStatus;
use parlance_storage::queries::{accounts, sessions};
use parlance_storage::{Database, SessionRow, now_string};
use parlance_vault::Vault;
use rand::RngCore;
use secrecy::SecretString;
use tracing::{info, warn};

/// Tokens handed to the web client.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub token: String,
    pub refresh_token: String,
}

pub struct SessionRegistry {
    db: Database,
    vault: Arc<Vault>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(db: Database, vault: Arc<Vault>, config: SessionConfig) -> Self {
        Self { db, vault, config }
    }

    /// Begin a login: a temporary account and a `pending` session.
    /// Returns the access token the client polls with.
    pub async fn start_login(&self) -> Result<String, ParlanceError> {
        let account_id = accounts::create_temporary(&self.db).await?;
        let token = generate_token();
        let expires_at = self.deadline(self.config.access_ttl_minutes);
        sessions::create(&self.db, &account_id, &token, &expires_at).await?;
        info!(account_id, "login started");
        Ok(token)
    }

    /// Complete the handshake for a pending session: record the confirmed
    /// identity, seal the transport session into the vault, and issue the
    /// refresh token.
    pub async fn complete_login(
        &self,
        token: &str,
        telegram_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        transport_session: SecretString,
    ) -> Result<SessionTokens, ParlanceError> {
        let session = self.require_live_session_by_token(token).await?;
        if session.status != SessionStatus::Pending {
            return Err(ParlanceError::InvalidStateTransition {
                from: session.status.to_string(),
                action: "complete_login".to_string(),
            });
        }

        // Re-login: the identity may already own a permanent account.
        let account_id = match accounts::get_by_telegram_id(&self.db, telegram_id).await? {
            Some(existing) if existing.id != session.account_id => {
                sessions::reassign_account(&self.db, &session.id, &existing.id).await?;
                // The placeholder account is no longer needed.
                accounts::delete(&self.db, &session.account_id).await?;
                existing.id
            }
            _ => {
                accounts::complete_handshake(
                    &self.db,
                    &session.account_id,
                    telegram_id,
                    username,
                    first_name,
                )
                .await?;
                session.account_id.clone()
            }
        };

        self.vault
            .store_credentials(&account_id, &transport_session)
            .await?;

        let refresh_token = generate_token();
        let expires_at = self.deadline(self.config.refresh_ttl_minutes);
        if !sessions::authenticate(&self.db, &session.id, &refresh_token, &expires_at).await? {
            return Err(ParlanceError::InvalidStateTransition {
                from: "pending".to_string(),
                action: "complete_login".to_string(),
            });
        }

        info!(account_id, session_id = %session.id, "login completed");
        Ok(SessionTokens {
            token: token.to_string(),
            refresh_token,
        })
    }

    /// Mark a pending login as failed (handshake error).
    pub async fn fail_login(&self, token: &str) -> Result<(), ParlanceError> {
        let session = self.require_session_by_token(token).await?;
        if !sessions::mark_error(&self.db, &session.id).await? {
            return Err(ParlanceError::InvalidStateTransition {
                from: session.status.to_string(),
                action: "fail_login".to_string(),
            });
        }
        warn!(session_id = %session.id, "login failed");
        Ok(())
    }

    /// Resolve a token to its session, lazily expiring it when the deadline
    /// has passed. Touches the idle clock on a live authenticated session.
    pub async fn resolve(&self, token: &str) -> Result<SessionRow, ParlanceError> {
        let session = self.require_live_session_by_token(token).await?;
        if session.status == SessionStatus::Authenticated {
            sessions::touch_activity(&self.db, &session.id).await?;
        }
        Ok(session)
    }

    /// Rotate both tokens using the refresh token. The old pair stops
    /// resolving immediately.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, ParlanceError> {
        let Some(session) = sessions::get_by_refresh_token(&self.db, refresh_token).await? else {
            return Err(ParlanceError::Validation("unknown refresh token".to_string()));
        };
        if session.expires_at <= now_string() {
            sessions::expire(&self.db, &session.id).await?;
            return Err(ParlanceError::Validation("session expired".to_string()));
        }

        let tokens = SessionTokens {
            token: generate_token(),
            refresh_token: generate_token(),
        };
        let expires_at = self.deadline(self.config.refresh_ttl_minutes);
        if !sessions::rotate(
            &self.db,
            &session.id,
            &tokens.token,
            &tokens.refresh_token,
            &expires_at,
        )
        .await?
        {
            return Err(ParlanceError::InvalidStateTransition {
                from: session.status.to_string(),
                action: "refresh".to_string(),
            });
        }
        Ok(tokens)
    }

    /// Expire a session on explicit logout.
    pub async fn logout(&self, token: &str) -> Result<(), ParlanceError> {
        let session = self.require_session_by_token(token).await?;
        if sessions::expire(&self.db, &session.id).await? {
            info!(session_id = %session.id, "logged out");
        }
        Ok(())
    }

    async fn require_session_by_token(&self, token: &str) -> Result<SessionRow, ParlanceError> {
        sessions::get_by_token(&self.db, token)
            .await?
            .ok_or_else(|| ParlanceError::Validation("unknown session token".to_string()))
    }

    /// Look up a session and lazily expire it when its deadline passed,
    /// whatever state it is in. An expired pending challenge must not be
    /// completable just because the sweeper has not run yet.
    async fn require_live_session_by_token(
        &self,
        token: &str,
    ) -> Result<SessionRow, ParlanceError> {
        let session = self.require_session_by_token(token).await?;
        if session.status != SessionStatus::Expired && session.expires_at <= now_string() {
            sessions::expire(&self.db, &session.id).await?;
            return Err(ParlanceError::Validation("session expired".to_string()));
        }
        Ok(session)
    }

    fn deadline(&self, minutes: i64) -> String {
        (Utc::now() + Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// 32 random bytes, hex-encoded. Collision probability is negligible and
/// the UNIQUE column turns one into a storage error rather than a breach.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_config::model::VaultConfig;
    use secrecy::ExposeSecret;
    use tempfile::tempdir;

    async fn setup_with(config: SessionConfig) -> (Database, SessionRegistry, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("sessions.db").to_str().unwrap())
            .await
            .unwrap();
        let vault = Arc::new(
            Vault::create(
                db.clone(),
                &SecretString::from("test".to_string()),
                &VaultConfig {
                    kdf_memory_cost: 32768,
                    kdf_iterations: 2,
                    kdf_parallelism: 1,
                },
            )
            .await
            .unwrap(),
        );
        let registry = SessionRegistry::new(db.clone(), vault, config);
        (db, registry, dir)
    }

    async fn setup() -> (Database, SessionRegistry, tempfile::TempDir) {
        setup_with(SessionConfig::default()).await
    }

    #[tokio::test]
    async fn full_login_flow() {
        let (db, registry, _dir) = setup().await;

        let token = registry.start_login().await.unwrap();
        let session = registry.resolve(&token).await.unwrap();
        assert_eq!(session.status, SessionStatus::Pending);

        let tokens = registry
            .complete_login(
                &token,
                555,
                Some("alice"),
                Some("Alice"),
                SecretString::from("transport-blob".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(tokens.token, token);

        let session = registry.resolve(&token).await.unwrap();
        assert_eq!(session.status, SessionStatus::Authenticated);

        let account = accounts::get(&db, &session.account_id).await.unwrap().unwrap();
        assert!(!account.is_temporary);
        assert_eq!(account.telegram_id, Some(555));

        // Second completion attempt is rejected.
        let err = registry
            .complete_login(&token, 555, None, None, SecretString::from("x".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ParlanceError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn relogin_reuses_permanent_account() {
        let (db, registry, _dir) = setup().await;

        let token = registry.start_login().await.unwrap();
        registry
            .complete_login(&token, 777, Some("bob"), None, SecretString::from("s1".to_string()))
            .await
            .unwrap();
        let first_account = registry.resolve(&token).await.unwrap().account_id;

        let token2 = registry.start_login().await.unwrap();
        let temp_account = registry.resolve(&token2).await.unwrap().account_id;
        assert_ne!(temp_account, first_account);

        registry
            .complete_login(&token2, 777, Some("bob"), None, SecretString::from("s2".to_string()))
            .await
            .unwrap();
        let session = registry.resolve(&token2).await.unwrap();
        assert_eq!(session.account_id, first_account);

        // The placeholder is gone.
        assert!(accounts::get(&db, &temp_account).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_rotates_and_invalidates_old_tokens() {
        let (_db, registry, _dir) = setup().await;

        let token = registry.start_login().await.unwrap();
        let tokens = registry
            .complete_login(&token, 1, None, None, SecretString::from("s".to_string()))
            .await
            .unwrap();

        let rotated = registry.refresh(&tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.token, tokens.token);
        assert_ne!(rotated.refresh_token, tokens.refresh_token);

        assert!(registry.resolve(&tokens.token).await.is_err());
        assert!(registry.refresh(&tokens.refresh_token).await.is_err());
        assert!(registry.resolve(&rotated.token).await.is_ok());
    }

    #[tokio::test]
    async fn failed_login_and_logout_are_dead_ends() {
        let (_db, registry, _dir) = setup().await;

        let token = registry.start_login().await.unwrap();
        registry.fail_login(&token).await.unwrap();
        let err = registry
            .complete_login(&token, 1, None, None, SecretString::from("s".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ParlanceError::InvalidStateTransition { .. }));

        let token = registry.start_login().await.unwrap();
        registry
            .complete_login(&token, 2, None, None, SecretString::from("s".to_string()))
            .await
            .unwrap();
        registry.logout(&token).await.unwrap();
        let session = registry.resolve(&token).await.unwrap();
        assert_eq!(session.status, SessionStatus::Expired);
    }

    #[tokio::test]
    async fn expired_pending_challenge_cannot_be_completed() {
        // The access TTL has already elapsed when the client comes back.
        let (db, registry, _dir) = setup_with(SessionConfig {
            access_ttl_minutes: -1,
            refresh_ttl_minutes: 10080,
            idle_days: 30,
        })
        .await;

        let token = registry.start_login().await.unwrap();
        let err = registry
            .complete_login(&token, 1, None, None, SecretString::from("s".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ParlanceError::Validation(_)));

        // The dead challenge was expired on the spot, not left for the
        // sweeper, and it no longer resolves.
        let session = sessions::get_by_token(&db, &token).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Expired);
        assert_eq!(
            registry.resolve(&token).await.unwrap().status,
            SessionStatus::Expired
        );
    }

    #[test]
    fn tokens_are_long_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn stored_credentials_match_transport_session() {
        let (db, registry, _dir) = setup().await;
        let token = registry.start_login().await.unwrap();
        registry
            .complete_login(&token, 9, None, None, SecretString::from("blob-9".to_string()))
            .await
            .unwrap();
        let account_id = registry.resolve(&token).await.unwrap().account_id;

        let vault = Arc::new(
            Vault::unlock(db, &SecretString::from("test".to_string()))
                .await
                .unwrap(),
        );
        let auth = vault.materialize(&account_id).await.unwrap();
        assert_eq!(auth.session.expose_secret(), "blob-9");
    }
}
