// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase acquisition via TTY prompt or `PARLANCE_VAULT_KEY`.

use parlance_core::ParlanceError;
use secrecy::SecretString;

/// The environment variable name for providing the vault passphrase.
///
/// The config loader ignores this variable; it never reaches the figment
/// merge despite the shared prefix.
pub const VAULT_KEY_ENV_VAR: &str = "PARLANCE_VAULT_KEY";

fn from_env() -> Option<SecretString> {
    match std::env::var(VAULT_KEY_ENV_VAR) {
        Ok(key) if !key.is_empty() => Some(SecretString::from(key)),
        _ => None,
    }
}

/// Get the vault passphrase from the environment or an interactive prompt.
///
/// Priority:
/// 1. `PARLANCE_VAULT_KEY` environment variable (headless/Docker/systemd)
/// 2. Interactive TTY prompt via `rpassword`
pub fn get_vault_passphrase() -> Result<SecretString, ParlanceError> {
    if let Some(key) = from_env() {
        return Ok(key);
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("Vault passphrase: ");
        let passphrase = rpassword::read_password()
            .map_err(|e| ParlanceError::Vault(format!("failed to read passphrase: {e}")))?;
        if passphrase.is_empty() {
            return Err(ParlanceError::Vault("empty passphrase not allowed".into()));
        }
        return Ok(SecretString::from(passphrase));
    }

    Err(ParlanceError::Vault(format!(
        "no passphrase provided; set {VAULT_KEY_ENV_VAR} or run interactively"
    )))
}

/// Get the vault passphrase with a confirmation prompt, for vault creation.
pub fn get_vault_passphrase_with_confirm() -> Result<SecretString, ParlanceError> {
    // Env var does not need confirmation.
    if let Some(key) = from_env() {
        return Ok(key);
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("New vault passphrase: ");
        let pass1 = rpassword::read_password()
            .map_err(|e| ParlanceError::Vault(format!("failed to read passphrase: {e}")))?;
        eprint!("Confirm vault passphrase: ");
        let pass2 = rpassword::read_password()
            .map_err(|e| ParlanceError::Vault(format!("failed to read passphrase: {e}")))?;

        if pass1 != pass2 {
            return Err(ParlanceError::Vault("passphrases do not match".into()));
        }
        if pass1.is_empty() {
            return Err(ParlanceError::Vault("empty passphrase not allowed".into()));
        }
        return Ok(SecretString::from(pass1));
    }

    Err(ParlanceError::Vault(format!(
        "no passphrase provided; set {VAULT_KEY_ENV_VAR} or run interactively"
    )))
}
