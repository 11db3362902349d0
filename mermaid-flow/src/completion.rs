#![doc = "Completion client for the CLI: implements the core `CompletionClient` trait against an OpenAI-compatible chat-completions endpoint."]
//
//! # Completion Integration (CLI <-> Core)
//!
//! [`OpenAiClient`] issues exactly one `POST {base}/chat/completions` per
//! [`DiagramRequest`], authenticated with a bearer key. The base URL comes
//! from the request and falls back to [`DEFAULT_BASE_URL`].
//!
//! - No retry and no timeout: a hung endpoint blocks the generation.
//! - Non-2xx replies become [`CompletionError::Endpoint`] with the body text.
//! - A reply without choices or content is `CompletionResult { content: None }`.

use async_trait::async_trait;
use mermaid_flow_core::contract::{CompletionClient, CompletionResult, DiagramRequest};
use mermaid_flow_core::error::CompletionError;
use serde::Deserialize;

/// Endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// `{base}/chat/completions`, tolerating a trailing slash on `base`.
pub fn completions_url(base: Option<&str>) -> String {
    let base = base.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
    format!("{base}/chat/completions")
}

/// First choice's message content, if any.
pub fn first_choice_content(body: &str) -> Result<Option<String>, CompletionError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Decode(e.to_string()))?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content))
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &DiagramRequest) -> Result<CompletionResult, CompletionError> {
        let url = completions_url(request.endpoint_base_url.as_deref());
        let body = request.to_body();
        tracing::info!(
            url = %url,
            model = %body.model,
            temperature = ?body.temperature,
            prompt_len = body.messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url = %url, "Completion request failed");
                CompletionError::Transport(e.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::error!(error = ?e, "Failed to read completion response body");
            CompletionError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, "Completion endpoint returned error");
            return Err(CompletionError::Endpoint {
                status: status.as_u16(),
                body: text,
            });
        }

        let content = first_choice_content(&text)?;
        tracing::info!(
            content_len = content.as_ref().map(String::len),
            "Received chat completion"
        );
        Ok(CompletionResult { content })
    }
}
