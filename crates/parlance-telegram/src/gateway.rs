// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway to the Telegram session bridge.
//!
//! The bridge holds the live MTProto connections; this client talks to its
//! REST surface with the per-account session credential as a bearer token.
//! Failures are classified for the task queue: connection errors, timeouts,
//! 429 and 5xx are transient; 401 and 403 mean the stored credential is
//! dead and a human must re-authenticate. The queue owns retry, so no
//! request is ever retried here.

use std::time::Duration;

use async_trait::async_trait;
use parlance_config::model::TelegramConfig;
use parlance_core::ParlanceError;
use parlance_core::types::{ChatMessage, TransportAuth};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::types::{BridgeErrorResponse, MessagesResponse, SendRequest, SendResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`parlance_core::MessagingGateway`] implementation over the bridge API.
#[derive(Debug, Clone)]
pub struct TelegramGateway {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramGateway {
    pub fn new(config: &TelegramConfig) -> Result<Self, ParlanceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ParlanceError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn bearer(auth: &TransportAuth) -> String {
        format!("Bearer {}", auth.session.expose_secret())
    }

    /// Maps a non-2xx bridge response to the engine's error taxonomy.
    async fn classify_failure(
        auth: &TransportAuth,
        response: reqwest::Response,
    ) -> ParlanceError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<BridgeErrorResponse>(&body) {
            Ok(err) => err.error,
            Err(_) => body,
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ParlanceError::CredentialsInvalid {
                    account_id: auth.account_id.clone(),
                }
            }
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                ParlanceError::Transient {
                    message: format!("bridge returned {status}: {detail}"),
                    source: None,
                }
            }
            _ => ParlanceError::Validation(format!("bridge rejected request ({status}): {detail}")),
        }
    }

    fn transport_error(e: reqwest::Error) -> ParlanceError {
        ParlanceError::Transient {
            message: format!("bridge request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

#[async_trait]
impl parlance_core::MessagingGateway for TelegramGateway {
    async fn list_new_messages(
        &self,
        auth: &TransportAuth,
        dialog_id: i64,
        since_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, ParlanceError> {
        let url = format!("{}/dialogs/{dialog_id}/messages", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .header("authorization", Self::bearer(auth))
            .query(&[("limit", limit.to_string())]);
        if let Some(since_id) = since_id {
            request = request.query(&[("since_id", since_id.to_string())]);
        }

        let response = request.send().await.map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify_failure(auth, response).await);
        }

        let body: MessagesResponse = response.json().await.map_err(Self::transport_error)?;
        let mut messages: Vec<ChatMessage> = body
            .messages
            .into_iter()
            .filter(|m| since_id.is_none_or(|cursor| m.id > cursor))
            .map(ChatMessage::from)
            .collect();
        // The bridge promises ascending ids, but the cursor logic depends
        // on it, so enforce the order here.
        messages.sort_by_key(|m| m.id);
        debug!(dialog_id, count = messages.len(), "fetched messages");
        Ok(messages)
    }

    async fn send_message(
        &self,
        auth: &TransportAuth,
        dialog_id: i64,
        text: &str,
    ) -> Result<i64, ParlanceError> {
        let url = format!("{}/dialogs/{dialog_id}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("authorization", Self::bearer(auth))
            .json(&SendRequest { text })
            .send()
            .await
            .map_err(Self::transport_error)?;
        if !response.status().is_success() {
            return Err(Self::classify_failure(auth, response).await);
        }

        let body: SendResponse = response.json().await.map_err(Self::transport_error)?;
        debug!(dialog_id, message_id = body.message_id, "message delivered");
        Ok(body.message_id)
    }

    async fn is_authorized(&self, auth: &TransportAuth) -> Result<bool, ParlanceError> {
        let url = format!("{}/session", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("authorization", Self::bearer(auth))
            .send()
            .await
            .map_err(Self::transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            _ => Err(Self::classify_failure(auth, response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::MessagingGateway;
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_auth() -> TransportAuth {
        TransportAuth {
            account_id: "acc-1".into(),
            session: SecretString::from("session-token".to_string()),
        }
    }

    fn test_gateway(base_url: &str) -> TelegramGateway {
        TelegramGateway::new(&TelegramConfig::default())
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    fn wire_message(id: i64, text: &str, outgoing: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "sender_name": "Alice",
            "text": text,
            "timestamp": "2026-03-01T12:00:00.000Z",
            "outgoing": outgoing,
        })
    }

    #[tokio::test]
    async fn lists_messages_with_cursor_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dialogs/7/messages"))
            .and(query_param("since_id", "100"))
            .and(query_param("limit", "20"))
            .and(header("authorization", "Bearer session-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                // Out of order on purpose.
                "messages": [wire_message(103, "b", false), wire_message(101, "a", false)],
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let messages = gateway
            .list_new_messages(&test_auth(), 7, Some(100), 20)
            .await
            .unwrap();
        assert_eq!(
            messages.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![101, 103]
        );
    }

    #[tokio::test]
    async fn filters_messages_at_or_below_the_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dialogs/7/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [wire_message(99, "old", false), wire_message(101, "new", false)],
            })))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let messages = gateway
            .list_new_messages(&test_auth(), 7, Some(100), 20)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 101);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_credentials_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"error": "session revoked"})),
            )
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let err = gateway
            .list_new_messages(&test_auth(), 7, None, 20)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParlanceError::CredentialsInvalid { account_id } if account_id == "acc-1"
        ));
        assert!(!gateway.is_authorized(&test_auth()).await.unwrap());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let err = gateway
            .send_message(&test_auth(), 7, "hi")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn bad_request_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "message too long"})),
            )
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let err = gateway
            .send_message(&test_auth(), 7, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ParlanceError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn send_returns_the_delivered_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dialogs/7/messages"))
            .and(header("authorization", "Bearer session-token"))
            .and(body_json(serde_json::json!({"text": "on my way"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message_id": 555})),
            )
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        let id = gateway
            .send_message(&test_auth(), 7, "on my way")
            .await
            .unwrap();
        assert_eq!(id, 555);
    }

    #[tokio::test]
    async fn live_session_reports_authorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"authorized": true})),
            )
            .mount(&server)
            .await;

        let gateway = test_gateway(&server.uri());
        assert!(gateway.is_authorized(&test_auth()).await.unwrap());
    }
}
