// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Handles request construction, authentication headers, and error
//! classification. The task queue owns retry scheduling, so this client
//! never retries: transient statuses (429, 5xx, 529) surface as
//! [`ParlanceError::Transient`] and permanent refusals (400) as
//! [`ParlanceError::ContentPolicy`].

use std::time::Duration;

use parlance_config::model::AnthropicConfig;
use parlance_core::ParlanceError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(config: &AnthropicConfig) -> Result<Self, ParlanceError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| ParlanceError::Config("anthropic.api_key is not set".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ParlanceError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&config.api_version).map_err(|e| {
                ParlanceError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ParlanceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends one completion request and returns the full response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ParlanceError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(|e| ParlanceError::Transient {
                message: format!("anthropic request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "completion response received");

        if status.is_success() {
            return response.json().await.map_err(|e| ParlanceError::Transient {
                message: format!("failed to read API response: {e}"),
                source: Some(Box::new(e)),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(err) => format!("{}: {}", err.error.type_, err.error.message),
            Err(_) => format!("{status}: {body}"),
        };
        Err(classify_status(status, detail))
    }
}

fn classify_status(status: StatusCode, detail: String) -> ParlanceError {
    match status.as_u16() {
        429 | 500..=599 => ParlanceError::Transient {
            message: format!("anthropic API error ({detail})"),
            source: None,
        },
        400 => ParlanceError::ContentPolicy(detail),
        _ => ParlanceError::Validation(format!("anthropic API error ({detail})")),
    }
}
