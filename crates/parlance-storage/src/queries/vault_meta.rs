// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque key/value blobs for the vault (sealed master key, KDF salt).

use parlance_core::ParlanceError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

pub async fn get(db: &Database, key: &str) -> Result<Option<Vec<u8>>, ParlanceError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Vec<u8>>, rusqlite::Error> {
            conn.query_row(
                "SELECT value FROM vault_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set(db: &Database, key: &str, value: &[u8]) -> Result<(), ParlanceError> {
    let key = key.to_string();
    let value = value.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert only if absent. Returns true when this call created the row, so
/// two concurrent initializers agree on a single winner.
pub async fn set_if_absent(db: &Database, key: &str, value: &[u8]) -> Result<bool, ParlanceError> {
    let key = key.to_string();
    let value = value.to_vec();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let n = conn.execute(
                "INSERT INTO vault_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO NOTHING",
                params![key, value],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn set_get_and_first_writer_wins() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("meta.db").to_str().unwrap())
            .await
            .unwrap();

        assert!(get(&db, "master_key").await.unwrap().is_none());
        assert!(set_if_absent(&db, "master_key", b"sealed-1").await.unwrap());
        assert!(!set_if_absent(&db, "master_key", b"sealed-2").await.unwrap());
        assert_eq!(get(&db, "master_key").await.unwrap().unwrap(), b"sealed-1");

        set(&db, "kdf_salt", b"salt").await.unwrap();
        assert_eq!(get(&db, "kdf_salt").await.unwrap().unwrap(), b"salt");
    }
}
