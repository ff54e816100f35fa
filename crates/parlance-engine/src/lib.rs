// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The background processing engine.
//!
//! A durable task queue drives the dialog pipeline: the [`Scheduler`]'s
//! ticker enqueues work for due dialogs, workers lease tasks and run the
//! [`DialogProcessor`], drafts wait for review in the response lifecycle,
//! and approved drafts are delivered by the [`ResponseSender`]. The
//! [`CleanupSweeper`] keeps the store bounded.

pub mod api;
pub mod cleanup;
pub mod lifecycle;
pub mod processor;
pub mod queue;
pub mod scheduler;
pub mod sender;
pub mod session;
pub mod task;

pub use api::EngineApi;
pub use cleanup::{CleanupSweeper, SweepReport};
pub use lifecycle::ResponseLifecycle;
pub use processor::{DialogProcessor, ProcessOutcome};
pub use queue::{FailOutcome, TaskQueue};
pub use scheduler::Scheduler;
pub use sender::ResponseSender;
pub use session::{SessionRegistry, SessionTokens};
pub use task::TaskPayload;
