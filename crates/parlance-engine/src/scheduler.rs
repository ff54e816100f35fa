// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool and periodic tick.
//!
//! N workers poll the queue for leases and dispatch on the payload kind.
//! A separate ticker enqueues a processing task for every due dialog. All
//! loops stop on the shared [`CancellationToken`]; in-flight tasks finish
//! before a worker exits, so shutdown never abandons a lease mid-write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use parlance_config::model::EngineConfig;
use parlance_core::ParlanceError;
use parlance_core::types::TaskType;
use parlance_storage::queries::dialogs;
use parlance_storage::{Database, TaskRow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::processor::DialogProcessor;
use crate::queue::{FailOutcome, TaskQueue};
use crate::sender::ResponseSender;
use crate::task::TaskPayload;

/// How long an idle worker waits before polling the queue again.
const IDLE_POLL: Duration = Duration::from_millis(500);

pub struct Scheduler {
    db: Database,
    queue: TaskQueue,
    processor: Arc<DialogProcessor>,
    sender: Arc<ResponseSender>,
    config: EngineConfig,
}

impl Scheduler {
    pub fn new(
        db: Database,
        queue: TaskQueue,
        processor: Arc<DialogProcessor>,
        sender: Arc<ResponseSender>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            queue,
            processor,
            sender,
            config,
        }
    }

    /// Run the ticker and worker pool until the token is cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        let mut handles = Vec::new();

        let ticker = self.clone();
        let ticker_token = token.clone();
        handles.push(tokio::spawn(async move {
            ticker.tick_loop(ticker_token).await;
        }));

        for n in 0..self.config.workers {
            let worker = self.clone();
            let worker_token = token.clone();
            let worker_id = format!("worker-{n}");
            handles.push(tokio::spawn(async move {
                worker.worker_loop(&worker_id, worker_token).await;
            }));
        }

        info!(workers = self.config.workers, "engine running");
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "engine task panicked");
            }
        }
        info!("engine stopped");
    }

    async fn tick_loop(&self, token: CancellationToken) {
        let interval = Duration::from_secs(self.config.tick_interval_secs);
        loop {
            if let Err(e) = self.tick().await {
                warn!(error = %e, "tick failed; will retry next interval");
            }
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("ticker stopping");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Enqueue a processing task for every enabled dialog that has not been
    /// touched within one tick interval. Duplicate-suppressed, so a slow
    /// dialog accumulates one live task, not one per tick.
    pub async fn tick(&self) -> Result<usize, ParlanceError> {
        let stale_cutoff = (Utc::now()
            - chrono::Duration::seconds(self.config.tick_interval_secs as i64))
        .to_rfc3339_opts(SecondsFormat::Millis, true);
        let due = dialogs::due_for_processing(&self.db, &stale_cutoff).await?;

        let mut enqueued = 0;
        for dialog in &due {
            let payload = TaskPayload::ProcessDialog {
                dialog_id: dialog.id.clone(),
            };
            if self
                .queue
                .enqueue_unique(TaskType::Dialog, dialog.priority, &payload)
                .await?
                .is_some()
            {
                enqueued += 1;
            }
        }
        if enqueued > 0 {
            debug!(due = due.len(), enqueued, "tick enqueued dialog tasks");
        }
        Ok(enqueued)
    }

    async fn worker_loop(&self, worker_id: &str, token: CancellationToken) {
        debug!(worker_id, "worker started");
        loop {
            if token.is_cancelled() {
                debug!(worker_id, "worker stopping");
                return;
            }
            match self.step(worker_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                    }
                }
                Err(e) => {
                    // Lease/bookkeeping failures only; task errors are
                    // handled inside dispatch.
                    warn!(worker_id, error = %e, "worker step failed");
                    tokio::time::sleep(IDLE_POLL).await;
                }
            }
        }
    }

    /// Lease and run at most one task. Returns whether a task was found.
    pub async fn step(&self, worker_id: &str) -> Result<bool, ParlanceError> {
        let Some(task) = self.queue.lease(worker_id).await? else {
            return Ok(false);
        };
        self.dispatch(&task).await?;
        Ok(true)
    }

    async fn dispatch(&self, task: &TaskRow) -> Result<(), ParlanceError> {
        let payload = match TaskPayload::from_json(&task.payload) {
            Ok(p) => p,
            Err(e) => {
                // Unparseable payloads can never succeed.
                warn!(task_id = %task.id, payload = %task.payload, "malformed payload");
                self.queue.fail(task, &e).await?;
                return Ok(());
            }
        };

        let result = match &payload {
            TaskPayload::ProcessDialog { dialog_id } => {
                self.processor.process(dialog_id).await.map(|outcome| {
                    debug!(task_id = %task.id, dialog_id, ?outcome, "dialog processed");
                })
            }
            TaskPayload::SendResponse { response_id } => self.sender.send(response_id).await,
        };

        match result {
            Ok(()) => {
                self.queue.complete(&task.id).await?;
            }
            Err(e) => {
                let outcome = self.queue.fail(task, &e).await?;
                // A delivery task that went terminal takes its response
                // with it; the approved text will never be sent.
                if outcome == FailOutcome::Failed {
                    if let TaskPayload::SendResponse { response_id } = &payload {
                        self.sender.mark_failed(response_id, &e.to_string()).await?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_config::model::VaultConfig;
    use parlance_core::types::{ResponseStatus, TaskStatus};
    use parlance_storage::queries::{accounts, responses, tasks};
    use parlance_test_utils::mock_gateway::FailureMode;
    use parlance_test_utils::{MockGateway, MockGenerator};
    use parlance_vault::Vault;
    use secrecy::SecretString;
    use tempfile::tempdir;

    struct Fixture {
        db: Database,
        gateway: Arc<MockGateway>,
        generator: Arc<MockGenerator>,
        scheduler: Scheduler,
        queue: TaskQueue,
        account_id: String,
        _dir: tempfile::TempDir,
    }

    fn engine_config(max_attempts: u32) -> EngineConfig {
        EngineConfig {
            workers: 2,
            tick_interval_secs: 1800,
            lease_secs: 300,
            max_attempts,
            backoff_base_secs: 30,
            backoff_cap_secs: 3600,
            call_timeout_secs: 5,
            initial_fetch_limit: 20,
        }
    }

    async fn fixture(max_attempts: u32) -> Fixture {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("sched.db").to_str().unwrap())
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
        let account_id = accounts::create_temporary(&db).await.unwrap();
        vault
            .store_credentials(&account_id, &SecretString::from("s".to_string()))
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
        let scheduler = Scheduler::new(db.clone(), queue.clone(), processor, sender, config);
        Fixture {
            db,
            gateway,
            generator,
            scheduler,
            queue,
            account_id,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn tick_enqueues_due_dialogs_once() {
        let fx = fixture(3).await;
        dialogs::upsert(&fx.db, &fx.account_id, 1, "a").await.unwrap();
        dialogs::upsert(&fx.db, &fx.account_id, 2, "b").await.unwrap();
        let off = dialogs::upsert(&fx.db, &fx.account_id, 3, "off").await.unwrap();
        dialogs::deselect(&fx.db, &off.id).await.unwrap();

        assert_eq!(fx.scheduler.tick().await.unwrap(), 2);
        // A second tick adds nothing while the tasks are live.
        assert_eq!(fx.scheduler.tick().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn step_runs_a_dialog_task_end_to_end() {
        let fx = fixture(3).await;
        let dialog = dialogs::upsert(&fx.db, &fx.account_id, 7, "Alice").await.unwrap();
        fx.gateway.push_message(7, "alice", "hello").await;
        fx.generator.push_draft("hi there").await;
        fx.scheduler.tick().await.unwrap();

        assert!(fx.scheduler.step("w-0").await.unwrap());
        assert!(!fx.scheduler.step("w-0").await.unwrap(), "queue drained");

        let response = responses::get_for_dialog(&fx.db, &dialog.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, ResponseStatus::PendingApproval);
        assert_eq!(response.suggested_text, "hi there");
    }

    #[tokio::test]
    async fn terminal_send_failure_fails_the_response() {
        let fx = fixture(1).await;
        let dialog = dialogs::upsert(&fx.db, &fx.account_id, 7, "Alice").await.unwrap();
        responses::upsert_pending(&fx.db, &dialog.id, 1, "2026-01-01T00:00:00.000Z", "d", "m")
            .await
            .unwrap();
        let response = responses::get_for_dialog(&fx.db, &dialog.id).await.unwrap().unwrap();
        responses::approve(&fx.db, &response.id, None).await.unwrap();
        fx.queue
            .enqueue(
                TaskType::System,
                0,
                &TaskPayload::SendResponse {
                    response_id: response.id.clone(),
                },
            )
            .await
            .unwrap();

        // max_attempts = 1: the first transient failure is terminal.
        fx.gateway.inject_failure(FailureMode::Transient).await;
        assert!(fx.scheduler.step("w-0").await.unwrap());

        let response = responses::get(&fx.db, &response.id).await.unwrap().unwrap();
        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(fx.gateway.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_goes_terminal_without_retry() {
        let fx = fixture(3).await;
        let id = tasks::enqueue(
            &fx.db,
            parlance_core::types::TaskType::System,
            0,
            "{broken",
            "2000-01-01T00:00:00.000Z",
        )
        .await
        .unwrap();

        assert!(fx.scheduler.step("w-0").await.unwrap());
        let task = tasks::get(&fx.db, &id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.attempt_count, 1);
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let fx = fixture(3).await;
        let scheduler = Arc::new(fx.scheduler);
        let token = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("engine did not stop after cancel")
            .unwrap();
    }
}
