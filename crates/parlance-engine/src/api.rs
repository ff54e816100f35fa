// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The operator-facing surface: dialog selection, review actions, and
//! queue introspection, bundled behind one handle.

use parlance_core::ParlanceError;
use parlance_core::types::{TaskStatus, TaskType};
use parlance_storage::queries::{dialogs, model_prefs};
use parlance_storage::{Database, DialogRow, ModelPrefRow, ResponseRow, TaskRow};
use tracing::info;

use crate::lifecycle::ResponseLifecycle;
use crate::queue::TaskQueue;
use crate::task::TaskPayload;

pub struct EngineApi {
    db: Database,
    queue: TaskQueue,
    lifecycle: ResponseLifecycle,
}

impl EngineApi {
    pub fn new(db: Database, queue: TaskQueue, lifecycle: ResponseLifecycle) -> Self {
        Self {
            db,
            queue,
            lifecycle,
        }
    }

    /// Opt a dialog into processing and queue its first run immediately.
    pub async fn select_dialog(
        &self,
        account_id: &str,
        telegram_dialog_id: i64,
        title: &str,
    ) -> Result<DialogRow, ParlanceError> {
        let dialog = dialogs::upsert(&self.db, account_id, telegram_dialog_id, title).await?;
        self.queue
            .enqueue_unique(
                TaskType::Dialog,
                dialog.priority,
                &TaskPayload::ProcessDialog {
                    dialog_id: dialog.id.clone(),
                },
            )
            .await?;
        info!(dialog_id = %dialog.id, telegram_dialog_id, "dialog selected");
        Ok(dialog)
    }

    /// Opt a dialog out. Its cursor is kept for a later reselect.
    pub async fn deselect_dialog(&self, dialog_id: &str) -> Result<(), ParlanceError> {
        if !dialogs::deselect(&self.db, dialog_id).await? {
            return Err(ParlanceError::Validation(format!(
                "dialog not found or already deselected: {dialog_id}"
            )));
        }
        info!(dialog_id, "dialog deselected");
        Ok(())
    }

    pub async fn set_auto_send(&self, dialog_id: &str, enabled: bool) -> Result<(), ParlanceError> {
        if !dialogs::set_auto_send(&self.db, dialog_id, enabled).await? {
            return Err(ParlanceError::Validation(format!(
                "dialog not found: {dialog_id}"
            )));
        }
        Ok(())
    }

    pub async fn set_priority(&self, dialog_id: &str, priority: i64) -> Result<(), ParlanceError> {
        if !dialogs::set_priority(&self.db, dialog_id, priority).await? {
            return Err(ParlanceError::Validation(format!(
                "dialog not found: {dialog_id}"
            )));
        }
        Ok(())
    }

    pub async fn list_dialogs(&self, account_id: &str) -> Result<Vec<DialogRow>, ParlanceError> {
        dialogs::list_for_account(&self.db, account_id).await
    }

    /// Drafts awaiting review for one account.
    pub async fn pending_responses(
        &self,
        account_id: &str,
    ) -> Result<Vec<ResponseRow>, ParlanceError> {
        self.lifecycle.pending_for_account(account_id).await
    }

    /// Approve a draft (optionally edited); returns the delivery task id.
    pub async fn approve_response(
        &self,
        response_id: &str,
        edited_text: Option<&str>,
    ) -> Result<String, ParlanceError> {
        self.lifecycle.approve(response_id, edited_text).await
    }

    pub async fn reject_response(&self, response_id: &str) -> Result<(), ParlanceError> {
        self.lifecycle.reject(response_id).await
    }

    pub async fn get_response(
        &self,
        response_id: &str,
    ) -> Result<Option<ResponseRow>, ParlanceError> {
        self.lifecycle.get(response_id).await
    }

    /// Per-status task counts.
    pub async fn queue_depth(&self) -> Result<Vec<(TaskStatus, i64)>, ParlanceError> {
        self.queue.depth().await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRow>, ParlanceError> {
        self.queue.get(task_id).await
    }

    pub async fn cancel_task(&self, task_id: &str) -> Result<bool, ParlanceError> {
        self.queue.cancel(task_id).await
    }

    pub async fn set_model_pref(
        &self,
        account_id: &str,
        model_name: &str,
        system_prompt: Option<&str>,
    ) -> Result<(), ParlanceError> {
        model_prefs::set(&self.db, account_id, model_name, system_prompt).await
    }

    pub async fn get_model_pref(
        &self,
        account_id: &str,
    ) -> Result<Option<ModelPrefRow>, ParlanceError> {
        model_prefs::get(&self.db, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_config::model::EngineConfig;
    use parlance_storage::queries::accounts;
    use tempfile::tempdir;

    async fn setup() -> (Database, EngineApi, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("api.db").to_str().unwrap())
            .await
            .unwrap();
        let queue = TaskQueue::new(db.clone(), &EngineConfig::default());
        let lifecycle = ResponseLifecycle::new(db.clone(), queue.clone());
        let api = EngineApi::new(db.clone(), queue, lifecycle);
        let account_id = accounts::create_temporary(&db).await.unwrap();
        (db, api, account_id, dir)
    }

    #[tokio::test]
    async fn select_queues_immediate_processing() {
        let (_db, api, account_id, _dir) = setup().await;

        let dialog = api.select_dialog(&account_id, 7, "Alice").await.unwrap();
        let depth = api.queue_depth().await.unwrap();
        assert_eq!(depth, vec![(TaskStatus::Pending, 1)]);

        // Selecting again does not stack a second task.
        api.select_dialog(&account_id, 7, "Alice").await.unwrap();
        let depth = api.queue_depth().await.unwrap();
        assert_eq!(depth, vec![(TaskStatus::Pending, 1)]);

        api.deselect_dialog(&dialog.id).await.unwrap();
        let err = api.deselect_dialog(&dialog.id).await.unwrap_err();
        assert!(matches!(err, ParlanceError::Validation(_)));
    }

    #[tokio::test]
    async fn dialog_flags_validate_existence() {
        let (_db, api, account_id, _dir) = setup().await;
        let dialog = api.select_dialog(&account_id, 1, "t").await.unwrap();

        api.set_auto_send(&dialog.id, true).await.unwrap();
        api.set_priority(&dialog.id, 9).await.unwrap();
        let listed = api.list_dialogs(&account_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].auto_send_enabled);
        assert_eq!(listed[0].priority, 9);

        assert!(api.set_auto_send("missing", true).await.is_err());
        assert!(api.set_priority("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn model_pref_roundtrip() {
        let (_db, api, account_id, _dir) = setup().await;
        assert!(api.get_model_pref(&account_id).await.unwrap().is_none());
        api.set_model_pref(&account_id, "claude-haiku-3-5", Some("Terse."))
            .await
            .unwrap();
        let pref = api.get_model_pref(&account_id).await.unwrap().unwrap();
        assert_eq!(pref.model_name, "claude-haiku-3-5");
    }
}
