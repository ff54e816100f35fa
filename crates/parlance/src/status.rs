// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parlance status` command implementation.
//!
//! Opens the record store and reports vault state and queue depth.
//! With `--json`, emits structured output for scripting.

use parlance_config::model::ParlanceConfig;
use parlance_core::ParlanceError;
use parlance_engine::{EngineApi, ResponseLifecycle, TaskQueue};
use parlance_storage::Database;
use parlance_vault::Vault;
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
struct StatusReport {
    database_path: String,
    vault_initialized: bool,
    tasks: Vec<TaskCount>,
}

#[derive(Debug, Serialize)]
struct TaskCount {
    status: String,
    count: i64,
}

pub async fn run_status(config: &ParlanceConfig, json: bool) -> Result<(), ParlanceError> {
    let db = Database::open(&config.storage.database_path).await?;
    let vault_initialized = Vault::exists(&db).await?;

    let queue = TaskQueue::new(db.clone(), &config.engine);
    let lifecycle = ResponseLifecycle::new(db.clone(), queue.clone());
    let api = EngineApi::new(db.clone(), queue, lifecycle);

    let tasks: Vec<TaskCount> = api
        .queue_depth()
        .await?
        .into_iter()
        .map(|(status, count)| TaskCount {
            status: status.to_string(),
            count,
        })
        .collect();

    let report = StatusReport {
        database_path: config.storage.database_path.clone(),
        vault_initialized,
        tasks,
    };

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| ParlanceError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        println!("database:  {}", report.database_path);
        println!(
            "vault:     {}",
            if report.vault_initialized {
                "initialized"
            } else {
                "not initialized"
            }
        );
        if report.tasks.is_empty() {
            println!("tasks:     none");
        } else {
            println!("tasks:");
            for task in &report.tasks {
                println!("  {:<12} {}", task.status, task.count);
            }
        }
    }

    db.close().await?;
    Ok(())
}
