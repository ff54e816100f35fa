// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic housekeeping: expired sessions, abandoned login attempts,
//! terminal rows past retention, and approved responses whose delivery
//! task was lost.

use chrono::{Duration, SecondsFormat, Utc};
use parlance_config::model::{CleanupConfig, SessionConfig};
use parlance_core::ParlanceError;
use parlance_core::types::TaskType;
use parlance_storage::Database;
use parlance_storage::queries::{accounts, responses, sessions, tasks};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue::TaskQueue;
use crate::task::TaskPayload;

/// A response approved more recently than this may still have its delivery
/// enqueue in flight; the sweeper leaves it alone.
const SEND_REQUEUE_GRACE_SECS: i64 = 600;

/// Counts from one sweep, for the log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_expired: usize,
    pub sessions_pruned: usize,
    pub accounts_pruned: usize,
    pub tasks_pruned: usize,
    pub responses_pruned: usize,
    pub sends_requeued: usize,
}

pub struct CleanupSweeper {
    db: Database,
    queue: TaskQueue,
    cleanup: CleanupConfig,
    session: SessionConfig,
}

impl CleanupSweeper {
    pub fn new(
        db: Database,
        queue: TaskQueue,
        cleanup: CleanupConfig,
        session: SessionConfig,
    ) -> Self {
        Self {
            db,
            queue,
            cleanup,
            session,
        }
    }

    /// One full pass. Every step is idempotent, so overlapping sweeps from
    /// two processes are harmless.
    pub async fn sweep(&self) -> Result<SweepReport, ParlanceError> {
        let now = Utc::now();
        let fmt = |t: chrono::DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Millis, true);

        let idle_cutoff = fmt(now - Duration::days(self.session.idle_days));
        let account_cutoff = fmt(now - Duration::hours(self.cleanup.account_grace_hours));
        let retention_cutoff = fmt(now - Duration::days(self.cleanup.retention_days));
        let requeue_cutoff = fmt(now - Duration::seconds(SEND_REQUEUE_GRACE_SECS));

        let report = SweepReport {
            sessions_expired: sessions::expire_stale(&self.db, &fmt(now), &idle_cutoff).await?,
            sessions_pruned: sessions::prune_dead(&self.db, &retention_cutoff).await?,
            accounts_pruned: accounts::delete_stale_temporary(&self.db, &account_cutoff).await?,
            tasks_pruned: tasks::prune_terminal(&self.db, &retention_cutoff).await?,
            responses_pruned: responses::prune_terminal(&self.db, &retention_cutoff).await?,
            sends_requeued: self.requeue_stuck_sends(&requeue_cutoff).await?,
        };

        if report == SweepReport::default() {
            debug!("sweep found nothing to clean");
        } else {
            info!(
                sessions_expired = report.sessions_expired,
                sessions_pruned = report.sessions_pruned,
                accounts_pruned = report.accounts_pruned,
                tasks_pruned = report.tasks_pruned,
                responses_pruned = report.responses_pruned,
                sends_requeued = report.sends_requeued,
                "sweep complete"
            );
        }
        Ok(report)
    }

    /// An approved response with no live delivery task means the enqueue
    /// that follows approval was lost before it committed. Queue the
    /// delivery again; the sender is idempotent on an already-sent row.
    async fn requeue_stuck_sends(&self, cutoff: &str) -> Result<usize, ParlanceError> {
        let stuck = responses::list_approved_before(&self.db, cutoff).await?;
        let mut requeued = 0;
        for response in stuck {
            let payload = TaskPayload::SendResponse {
                response_id: response.id.clone(),
            };
            if self
                .queue
                .enqueue_unique(TaskType::System, 0, &payload)
                .await?
                .is_some()
            {
                warn!(
                    response_id = %response.id,
                    "approved response had no delivery task, re-queued"
                );
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    /// Sweep on an interval until cancelled.
    pub async fn run(&self, token: CancellationToken) {
        let interval = std::time::Duration::from_secs(self.cleanup.sweep_interval_secs);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("cleanup sweeper stopping");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
            if let Err(e) = self.sweep().await {
                tracing::warn!(error = %e, "sweep failed; will retry next interval");
            }
        }
    }
}
