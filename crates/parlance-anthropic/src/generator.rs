// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ResponseGenerator`] implementation over the Messages API.

use async_trait::async_trait;
use parlance_config::model::AnthropicConfig;
use parlance_core::types::{ChatMessage, Draft};
use parlance_core::{ParlanceError, ResponseGenerator};
use tracing::debug;

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

pub struct AnthropicGenerator {
    client: AnthropicClient,
    max_tokens: u32,
}

impl AnthropicGenerator {
    pub fn new(config: &AnthropicConfig) -> Result<Self, ParlanceError> {
        Ok(Self {
            client: AnthropicClient::new(config)?,
            max_tokens: config.max_tokens,
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, url: String) -> Self {
        self.client = self.client.with_base_url(url);
        self
    }
}

/// Folds a conversation into the API's alternating user/assistant form.
///
/// Our own (outgoing) messages become `assistant` turns, everything else
/// `user`. Consecutive same-role messages are merged, and leading
/// assistant turns are dropped since the API requires the conversation to
/// open with a user turn.
fn to_api_messages(context: &[ChatMessage]) -> Vec<ApiMessage> {
    let mut messages: Vec<ApiMessage> = Vec::new();
    for msg in context {
        let role = if msg.outgoing { "assistant" } else { "user" };
        if messages.is_empty() && role == "assistant" {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push('\n');
                last.content.push_str(&msg.text);
            }
            _ => messages.push(ApiMessage {
                role: role.to_string(),
                content: msg.text.clone(),
            }),
        }
    }
    messages
}

#[async_trait]
impl ResponseGenerator for AnthropicGenerator {
    async fn draft(
        &self,
        context: &[ChatMessage],
        model_name: &str,
        system_prompt: &str,
    ) -> Result<Draft, ParlanceError> {
        let messages = to_api_messages(context);
        if messages.is_empty() {
            return Err(ParlanceError::Validation(
                "no incoming messages to draft a reply for".into(),
            ));
        }

        let request = MessageRequest {
            model: model_name.to_string(),
            messages,
            system: (!system_prompt.is_empty()).then(|| system_prompt.to_string()),
            max_tokens: self.max_tokens,
        };

        let response = self.client.complete_message(&request).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(ParlanceError::Internal(format!(
                "model returned an empty draft (stop_reason: {:?})",
                response.stop_reason
            )));
        }

        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "draft generated"
        );
        Ok(Draft {
            text,
            model: response.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn msg(id: i64, text: &str, outgoing: bool) -> ChatMessage {
        ChatMessage {
            id,
            sender_name: if outgoing { "me" } else { "Alice" }.into(),
            text: text.into(),
            timestamp: Utc::now(),
            outgoing,
        }
    }

    fn generator(base_url: &str) -> AnthropicGenerator {
        AnthropicGenerator::new(&AnthropicConfig {
            api_key: Some("test-api-key".into()),
            ..AnthropicConfig::default()
        })
        .unwrap()
        .with_base_url(base_url.to_string())
    }

    #[test]
    fn roles_map_and_consecutive_turns_merge() {
        let context = [
            msg(1, "own opener", true),
            msg(2, "hi", false),
            msg(3, "you there?", false),
            msg(4, "yes", true),
            msg(5, "great", false),
        ];
        let api = to_api_messages(&context);
        let roles: Vec<&str> = api.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        // Leading outgoing message is dropped; consecutive user turns merge.
        assert_eq!(api[0].content, "hi\nyou there?");
    }

    #[tokio::test]
    async fn drafts_with_model_and_system_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-haiku-3-5",
                "system": "Reply briefly.",
                "messages": [{"role": "user", "content": "hello"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "content": [{"type": "text", "text": "hey!"}],
                "model": "claude-haiku-3-5",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 8, "output_tokens": 2}
            })))
            .mount(&server)
            .await;

        let draft = generator(&server.uri())
            .draft(&[msg(1, "hello", false)], "claude-haiku-3-5", "Reply briefly.")
            .await
            .unwrap();
        assert_eq!(draft.text, "hey!");
        assert_eq!(draft.model, "claude-haiku-3-5");
    }

    #[tokio::test]
    async fn all_outgoing_context_is_rejected_locally() {
        let server = MockServer::start().await;
        // No mock mounted: the request must never reach the API.
        let err = generator(&server.uri())
            .draft(&[msg(1, "talking to myself", true)], "m", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ParlanceError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "content": [],
                "model": "m",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 1, "output_tokens": 0}
            })))
            .mount(&server)
            .await;

        let err = generator(&server.uri())
            .draft(&[msg(1, "hi", false)], "m", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ParlanceError::Internal(_)));
    }
}
