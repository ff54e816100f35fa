// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account model and system prompt selection.

use parlance_core::ParlanceError;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::ModelPrefRow;

fn row_to_pref(row: &Row<'_>) -> Result<ModelPrefRow, rusqlite::Error> {
    Ok(ModelPrefRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        model_name: row.get(2)?,
        system_prompt: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Set (or replace) an account's model preference.
pub async fn set(
    db: &Database,
    account_id: &str,
    model_name: &str,
    system_prompt: Option<&str>,
) -> Result<(), ParlanceError> {
    let id = uuid::Uuid::new_v4().to_string();
    let account_id = account_id.to_string();
    let model_name = model_name.to_string();
    let system_prompt = system_prompt.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO model_prefs (id, account_id, model_name, system_prompt)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(account_id) DO UPDATE SET
                     model_name = excluded.model_name,
                     system_prompt = excluded.system_prompt,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![id, account_id, model_name, system_prompt],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, account_id: &str) -> Result<Option<ModelPrefRow>, ParlanceError> {
    let account_id = account_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ModelPrefRow>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, account_id, model_name, system_prompt, created_at, updated_at
                 FROM model_prefs WHERE account_id = ?1",
                params![account_id],
                row_to_pref,
            )
            .optional()
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
    async fn set_then_replace() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("prefs.db").to_str().unwrap())
            .await
            .unwrap();
        let account_id = accounts::create_temporary(&db).await.unwrap();

        assert!(get(&db, &account_id).await.unwrap().is_none());
        set(&db, &account_id, "claude-sonnet-4-20250514", None)
            .await
            .unwrap();
        set(&db, &account_id, "claude-haiku-3-5", Some("Be brief."))
            .await
            .unwrap();

        let pref = get(&db, &account_id).await.unwrap().unwrap();
        assert_eq!(pref.model_name, "claude-haiku-3-5");
        assert_eq!(pref.system_prompt.as_deref(), Some("Be brief."));
    }
}
