// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock response generator with a FIFO script and failure injection.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parlance_core::{ChatMessage, Draft, ParlanceError, ResponseGenerator};

enum Scripted {
    Text(String),
    Transient,
    ContentPolicy,
}

/// A generator that pops drafts from a FIFO queue.
///
/// When the queue is empty a default "mock draft" is returned. Scripted
/// failures occupy queue slots, so ordering between failures and successes
/// is explicit.
pub struct MockGenerator {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<(usize, String)>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_drafts(drafts: Vec<&str>) -> Self {
        let generator = Self::new();
        let mut queue = VecDeque::new();
        for d in drafts {
            queue.push_back(Scripted::Text(d.to_string()));
        }
        *generator.script.try_lock().unwrap() = queue;
        generator
    }

    pub async fn push_draft(&self, text: &str) {
        self.script.lock().await.push_back(Scripted::Text(text.to_string()));
    }

    /// Queue a transient (retryable) failure.
    pub async fn push_transient_failure(&self) {
        self.script.lock().await.push_back(Scripted::Transient);
    }

    /// Queue a permanent content-policy refusal.
    pub async fn push_content_policy_failure(&self) {
        self.script.lock().await.push_back(Scripted::ContentPolicy);
    }

    /// `(context_len, model_name)` for every draft call made.
    pub async fn calls(&self) -> Vec<(usize, String)> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseGenerator for MockGenerator {
    async fn draft(
        &self,
        context: &[ChatMessage],
        model_name: &str,
        _system_prompt: &str,
    ) -> Result<Draft, ParlanceError> {
        self.calls
            .lock()
            .await
            .push((context.len(), model_name.to_string()));
        match self.script.lock().await.pop_front() {
            Some(Scripted::Text(text)) => Ok(Draft {
                text,
                model: model_name.to_string(),
            }),
            Some(Scripted::Transient) => {
                Err(ParlanceError::transient("injected generator failure"))
            }
            Some(Scripted::ContentPolicy) => {
                Err(ParlanceError::ContentPolicy("injected refusal".to_string()))
            }
            None => Ok(Draft {
                text: "mock draft".to_string(),
                model: model_name.to_string(),
            }),
        }
    }
}
