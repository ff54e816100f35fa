// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted credential blobs, one active row per account.
//!
//! The store never sees plaintext; sealing and opening happen in the vault
//! layer. `is_active = 0` marks credentials the transport has rejected.

use parlance_core::ParlanceError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::CredentialRow;

fn row_to_credential(row: &Row<'_>) -> Result<CredentialRow, rusqlite::Error> {
    Ok(CredentialRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        ciphertext: row.get(2)?,
        nonce: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Store (or replace) the sealed credential blob for an account. A replaced
/// blob is active again even if the previous one had been invalidated.
pub async fn upsert(
    db: &Database,
    account_id: &str,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<(), ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let account_id = account_id.to_string();
    let ciphertext = ciphertext.to_vec();
    let nonce = nonce.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO credentials (id, account_id, ciphertext, nonce, is_active)
                 VALUES (?1, ?2, ?3, ?4, 1)
                 ON CONFLICT(account_id) DO UPDATE SET
                     ciphertext = excluded.ciphertext,
                     nonce = excluded.nonce,
                     is_active = 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![id, account_id, ciphertext, nonce],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The active sealed blob for an account, if one exists.
pub async fn get_active(
    db: &Database,
    account_id: &str,
) -> Result<Option<CredentialRow>, ParlanceError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<CredentialRow>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, account_id, ciphertext, nonce, is_active, created_at, updated_at
                 FROM credentials WHERE account_id = ?1 AND is_active = 1",
                params![account_id],
                row_to_credential,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Deactivate an account's credentials after the transport rejects them.
pub async fn invalidate(db: &Database, account_id: &str) -> Result<bool, ParlanceError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "UPDATE credentials
                 SET is_active = 0,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE account_id = ?1 AND is_active = 1",
                params![account_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::accounts;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upsert_invalidate_reactivate() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("creds.db").to_str().unwrap())
            .await
            .unwrap();
        let account_id = accounts::create_temporary(&db).await.unwrap();

        upsert(&db, &account_id, b"sealed-v1", b"nonce-1").await.unwrap();
        let row = get_active(&db, &account_id).await.unwrap().unwrap();
        assert_eq!(row.ciphertext, b"sealed-v1");

        assert!(invalidate(&db, &account_id).await.unwrap());
        assert!(!invalidate(&db, &account_id).await.unwrap());
        assert!(get_active(&db, &account_id).await.unwrap().is_none());

        // A fresh blob reactivates the row.
        upsert(&db, &account_id, b"sealed-v2", b"nonce-2").await.unwrap();
        let row = get_active(&db, &account_id).await.unwrap().unwrap();
        assert_eq!(row.ciphertext, b"sealed-v2");
        assert_eq!(row.nonce, b"nonce-2");
    }
}
