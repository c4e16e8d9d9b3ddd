//! Remote language-model client used for clause classification and document chat.
//!
//! Everything the model does is optional: when no provider is configured (or a call fails) the
//! analysis layer answers from deterministic local fallbacks. The Anthropic adapter issues plain
//! HTTP requests against the Messages API.

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Errors surfaced while talking to the remote model.
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// Provider was unreachable or rejected the endpoint.
    #[error("Model provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Model request failed: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// The call did not complete within the configured budget.
    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),
}

/// Speaker of a single chat message.
///
/// Deserialization is lenient: any speaker other than `user` (`system`, `bot`, ...) is read as the
/// assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The model.
    Assistant,
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        if label.trim().eq_ignore_ascii_case("user") {
            Ok(Self::User)
        } else {
            Ok(Self::Assistant)
        }
    }
}

/// One message of a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Speaker of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request payload passed to the model provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Optional system prompt framing the conversation.
    pub system: Option<String>,
    /// Ordered conversation, ending with the message to answer.
    pub messages: Vec<ChatMessage>,
    /// Token budget for the reply.
    pub max_tokens: u32,
}

/// Interface implemented by remote model providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce the model's text reply for the request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError>;
}

/// Build a model client based on configuration, or `None` when running offline.
pub fn get_llm_client(config: &Config) -> Option<Arc<dyn LanguageModel>> {
    match config.llm_provider {
        LlmProvider::None => None,
        LlmProvider::Anthropic => {
            let Some(api_key) = config.anthropic_api_key.clone() else {
                tracing::warn!("LLM_PROVIDER=anthropic but ANTHROPIC_API_KEY is unset; running offline");
                return None;
            };
            match AnthropicClient::new(
                config.anthropic_api_url.clone(),
                api_key,
                config.llm_model.clone(),
                Duration::from_secs(config.llm_timeout_secs),
            ) {
                Ok(client) => Some(Arc::new(client)),
                Err(error) => {
                    tracing::warn!(error = %error, "Failed to build model client; running offline");
                    None
                }
            }
        }
    }
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AnthropicClient {
    /// Construct a client for `base_url` using the given key, model, and request timeout.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LlmClientError> {
        let http = Client::builder()
            .user_agent("legallens/llm")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                LlmClientError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError> {
        let mut payload = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        if let Some(system) = request.system {
            payload["system"] = json!(system);
        }

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmClientError::Timeout(self.timeout)
                } else {
                    LlmClientError::ProviderUnavailable(format!(
                        "failed to reach {}: {error}",
                        self.base_url
                    ))
                }
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LlmClientError::ProviderUnavailable(format!(
                "endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: MessagesResponse = response.json().await.map_err(|error| {
            LlmClientError::InvalidResponse(format!("failed to decode messages response: {error}"))
        })?;

        let text: String = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(LlmClientError::InvalidResponse(
                "response contained no text blocks".into(),
            ));
        }

        Ok(text)
    }
}
