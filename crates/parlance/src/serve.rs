// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parlance serve` command implementation.
//!
//! Wires the full engine: SQLite store, credential vault, Telegram bridge
//! gateway, Anthropic generator, task scheduler with its worker pool, and
//! the cleanup sweeper. Runs until SIGINT or SIGTERM.

use std::sync::Arc;

use parlance_anthropic::AnthropicGenerator;
use parlance_config::model::ParlanceConfig;
use parlance_core::ParlanceError;
use parlance_engine::{CleanupSweeper, DialogProcessor, ResponseSender, Scheduler, TaskQueue};
use parlance_storage::Database;
use parlance_telegram::TelegramGateway;
use parlance_vault::Vault;
use tracing::info;

use crate::shutdown;

pub async fn run_serve(config: ParlanceConfig) -> Result<(), ParlanceError> {
    info!(database = %config.storage.database_path, "starting parlance serve");

    let db = Database::open(&config.storage.database_path).await?;

    let passphrase = if Vault::exists(&db).await? {
        parlance_vault::get_vault_passphrase()?
    } else {
        info!("no vault found, initializing a new one");
        parlance_vault::get_vault_passphrase_with_confirm()?
    };
    let vault = Arc::new(Vault::open(db.clone(), &passphrase, &config.vault).await?);

    let gateway = Arc::new(TelegramGateway::new(&config.telegram)?);
    let generator = Arc::new(AnthropicGenerator::new(&config.anthropic)?);

    let queue = TaskQueue::new(db.clone(), &config.engine);
    let processor = Arc::new(DialogProcessor::new(
        db.clone(),
        vault.clone(),
        gateway.clone(),
        generator,
        queue.clone(),
        &config.engine,
        config.anthropic.default_model.clone(),
    ));
    let sender = Arc::new(ResponseSender::new(db.clone(), vault, gateway));
    let scheduler = Arc::new(Scheduler::new(
        db.clone(),
        queue.clone(),
        processor,
        sender,
        config.engine.clone(),
    ));
    let sweeper = CleanupSweeper::new(
        db.clone(),
        queue,
        config.cleanup.clone(),
        config.session.clone(),
    );

    let token = shutdown::install_signal_handler();
    tokio::join!(scheduler.run(token.clone()), sweeper.run(token));

    db.close().await?;
    info!("shutdown complete");
    Ok(())
}
