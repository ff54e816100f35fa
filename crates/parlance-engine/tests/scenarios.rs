// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end engine scenarios over a real SQLite store with mock
//! transport and generator.

use std::sync::Arc;

use parlance_config::model::{EngineConfig, VaultConfig};
use parlance_core::ParlanceError;
use parlance_core::types::{ResponseStatus, TaskStatus};
use parlance_engine::{
    DialogProcessor, EngineApi, ResponseLifecycle, ResponseSender, Scheduler, TaskQueue,
};
use parlance_storage::queries::{dialogs, responses, tasks};
use parlance_storage::Database;
use parlance_test_utils::mock_gateway::FailureMode;
use parlance_test_utils::{MockGateway, MockGenerator};
use parlance_vault::Vault;
use secrecy::SecretString;
use tempfile::tempdir;

struct Harness {
    db: Database,
    gateway: Arc<MockGateway>,
    generator: Arc<MockGenerator>,
    scheduler: Scheduler,
    api: EngineApi,
    account_id: String,
    _dir: tempfile::TempDir,
}

fn engine_config(max_attempts: u32) -> EngineConfig {
    EngineConfig {
        workers: 2,
        // Zero staleness window: every enabled dialog is due on each tick.
        tick_interval_secs: 0,
        lease_secs: 300,
        max_attempts,
        backoff_base_secs: 30,
        backoff_cap_secs: 3600,
        call_timeout_secs: 5,
        initial_fetch_limit: 20,
    }
}

async fn harness(max_attempts: u32) -> Harness {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("engine.db").to_str().unwrap())
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
    let account_id = parlance_storage::queries::accounts::create_temporary(&db)
        .await
        .unwrap();
    vault
        .store_credentials(&account_id, &SecretString::from("session".to_string()))
        .await
        .unwrap();

    let config = engine_config(max_attempts);
    let gateway = Arc::new(MockGateway::new());
    let generator = Arc::new(MockGenerator::new());
    let queue = TaskQueue::new(db.clone(), &config);
    let processor = Arc::new(DialogProcessor::new(
        db.clone(),
        vault.clone(),
        gateway.clone(),
        generator.clone(),
        queue.clone(),
        &config,
        "claude-sonnet-4-20250514".to_string(),
    ));
    let sender = Arc::new(ResponseSender::new(db.clone(), vault, gateway.clone()));
    let scheduler = Scheduler::new(
        db.clone(),
        queue.clone(),
        processor,
        sender,
        config,
    );
    let lifecycle = ResponseLifecycle::new(db.clone(), queue.clone());
    let api = EngineApi::new(db.clone(), queue, lifecycle);
    Harness {
        db,
        gateway,
        generator,
        scheduler,
        api,
        account_id,
        _dir: dir,
    }
}

/// Drain the queue one task at a time until it is empty.
async fn drain(h: &Harness) {
    while h.scheduler.step("test-worker").await.unwrap() {}
}

/// Force every pending task due immediately, bypassing backoff delays.
async fn fast_forward_backoff(h: &Harness) {
    h.db.connection()
        .call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE tasks SET scheduled_at = '2000-01-01T00:00:00.000Z'
                 WHERE status = 'pending'",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn message_to_approved_delivery() {
    let h = harness(3).await;
    let dialog = h.api.select_dialog(&h.account_id, 7, "Alice").await.unwrap();
    let msg_id = h.gateway.push_message(7, "alice", "dinner friday?").await;
    h.generator.push_draft("Friday works, 7pm?").await;

    drain(&h).await;

    let pending = h.api.pending_responses(&h.account_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].suggested_text, "Friday works, 7pm?");
    assert!(h.gateway.sent_messages().await.is_empty(), "nothing sent before approval");

    h.api
        .approve_response(&pending[0].id, Some("Friday works. 7pm at Nina's?"))
        .await
        .unwrap();
    drain(&h).await;

    // The human edit was delivered, not the raw draft.
    assert_eq!(
        h.gateway.sent_messages().await,
        vec![(7, "Friday works. 7pm at Nina's?".to_string())]
    );
    let response = h.api.get_response(&pending[0].id).await.unwrap().unwrap();
    assert_eq!(response.status, ResponseStatus::Sent);

    // Cursor covers both the incoming message and our reply.
    let dialog = dialogs::get(&h.db, &dialog.id).await.unwrap().unwrap();
    assert!(dialog.last_processed_message_id.unwrap() > msg_id);

    // Our own delivered reply does not trigger a new draft.
    h.scheduler.tick().await.unwrap();
    fast_forward_backoff(&h).await;
    drain(&h).await;
    assert!(h.api.pending_responses(&h.account_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn newer_message_supersedes_unreviewed_draft() {
    let h = harness(3).await;
    let dialog = h.api.select_dialog(&h.account_id, 7, "Alice").await.unwrap();
    h.gateway.push_message(7, "alice", "first question").await;
    h.generator.push_draft("answer to first").await;
    drain(&h).await;

    h.gateway.push_message(7, "alice", "wait, better question").await;
    h.generator.push_draft("answer to second").await;
    h.scheduler.tick().await.unwrap();
    fast_forward_backoff(&h).await;
    drain(&h).await;

    // Exactly one draft per dialog, reflecting the newest message.
    let pending = h.api.pending_responses(&h.account_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].suggested_text, "answer to second");
    assert_eq!(pending[0].dialog_id, dialog.id);
}

#[tokio::test]
async fn approval_race_sends_exactly_once() {
    let h = harness(3).await;
    h.api.select_dialog(&h.account_id, 7, "Alice").await.unwrap();
    h.gateway.push_message(7, "alice", "hi").await;
    h.generator.push_draft("hello!").await;
    drain(&h).await;

    let pending = h.api.pending_responses(&h.account_id).await.unwrap();
    let response_id = pending[0].id.clone();

    let first = h.api.approve_response(&response_id, None).await;
    let second = h.api.approve_response(&response_id, None).await;
    assert!(first.is_ok());
    assert!(matches!(
        second.unwrap_err(),
        ParlanceError::InvalidStateTransition { .. }
    ));

    // Rejection after approval is also refused.
    assert!(h.api.reject_response(&response_id).await.is_err());

    drain(&h).await;
    assert_eq!(h.gateway.sent_messages().await.len(), 1);
}

#[tokio::test]
async fn retry_ceiling_never_runs_a_fourth_attempt() {
    let h = harness(3).await;
    let dialog = h.api.select_dialog(&h.account_id, 7, "Alice").await.unwrap();
    h.gateway.push_message(7, "alice", "hello?").await;
    for _ in 0..3 {
        h.generator.push_transient_failure().await;
    }
    // A fourth attempt would consume this and draft successfully.
    h.generator.push_draft("should never appear").await;

    for _ in 0..3 {
        fast_forward_backoff(&h).await;
        drain(&h).await;
    }
    fast_forward_backoff(&h).await;
    drain(&h).await;

    assert_eq!(h.generator.calls().await.len(), 3, "exactly three attempts");

    // The task is terminally failed with the error recorded.
    let counts = tasks::counts_by_status(&h.db).await.unwrap();
    assert_eq!(counts, vec![(TaskStatus::Failed, 1)]);

    // No draft, and the cursor never moved: a later re-enqueue re-reads
    // the same message.
    assert!(
        responses::get_for_dialog(&h.db, &dialog.id)
            .await
            .unwrap()
            .is_none()
    );
    let dialog = dialogs::get(&h.db, &dialog.id).await.unwrap().unwrap();
    assert_eq!(dialog.last_processed_message_id, None);
}

#[tokio::test]
async fn rejection_frees_the_dialog_for_a_new_draft() {
    let h = harness(3).await;
    h.api.select_dialog(&h.account_id, 7, "Alice").await.unwrap();
    h.gateway.push_message(7, "alice", "hi").await;
    h.generator.push_draft("draft one").await;
    drain(&h).await;

    let pending = h.api.pending_responses(&h.account_id).await.unwrap();
    h.api.reject_response(&pending[0].id).await.unwrap();
    assert!(h.gateway.sent_messages().await.is_empty());

    // The next message produces a fresh draft in place of the rejected one.
    h.gateway.push_message(7, "alice", "still there?").await;
    h.generator.push_draft("draft two").await;
    h.scheduler.tick().await.unwrap();
    fast_forward_backoff(&h).await;
    drain(&h).await;

    let pending = h.api.pending_responses(&h.account_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].suggested_text, "draft two");
}

#[tokio::test]
async fn invalid_credentials_fail_fast_without_retry() {
    let h = harness(5).await;
    h.api.select_dialog(&h.account_id, 7, "Alice").await.unwrap();
    h.gateway.push_message(7, "alice", "hi").await;
    h.gateway.inject_failure(FailureMode::CredentialsInvalid).await;

    drain(&h).await;

    // One terminal task, no retries scheduled despite max_attempts = 5.
    let counts = tasks::counts_by_status(&h.db).await.unwrap();
    assert_eq!(counts, vec![(TaskStatus::Failed, 1)]);
}
