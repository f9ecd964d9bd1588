//! HTTP adapter for the text-synthesis port.
//!
//! Talks to any chat-completions-compatible endpoint (LiteLLM, OpenRouter,
//! a local gateway). The role's fixed system prompt goes in as the system
//! message; instructions and context form the user message. Stateless by
//! construction: nothing carries over between calls.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;
use crate::ports::synthesis::{SynthesisRequest, TextSynthesis};
use crate::prompts;

/// Configuration for [`HttpSynthesisClient`].
#[derive(Debug, Clone)]
pub struct SynthesisClientConfig {
    /// Base URL of the chat-completions API.
    pub api_base: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
    /// HTTP-level timeout; the workflow applies its own per-call timeout on
    /// top of this.
    pub http_timeout: Duration,
}

impl Default for SynthesisClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:4000".to_string(),
            api_key: None,
            model: "anthropic/claude-opus-4.5".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            http_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Chat-completions client implementing the text-synthesis port.
pub struct HttpSynthesisClient {
    config: SynthesisClientConfig,
    http_client: Client,
}

impl std::fmt::Debug for HttpSynthesisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSynthesisClient")
            .field("api_base", &self.config.api_base)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl HttpSynthesisClient {
    /// Creates a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::RequestFailed` if the HTTP client cannot be
    /// built.
    pub fn new(config: SynthesisClientConfig) -> Result<Self, SynthesisError> {
        let http_client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SynthesisError::RequestFailed(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `SYNTHESIS_API_BASE`: base URL for the API (required)
    /// - `SYNTHESIS_API_KEY`: bearer token (optional)
    /// - `SYNTHESIS_MODEL`: model id (default "anthropic/claude-opus-4.5")
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::MissingApiBase` if `SYNTHESIS_API_BASE` is
    /// not set.
    pub fn from_env() -> Result<Self, SynthesisError> {
        let api_base = env::var("SYNTHESIS_API_BASE").map_err(|_| SynthesisError::MissingApiBase)?;
        let api_key = env::var("SYNTHESIS_API_KEY").ok();
        let model = env::var("SYNTHESIS_MODEL")
            .unwrap_or_else(|_| SynthesisClientConfig::default().model);

        Self::new(SynthesisClientConfig {
            api_base,
            api_key,
            model,
            ..SynthesisClientConfig::default()
        })
    }

    /// Returns the configured model id.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn user_message(request: &SynthesisRequest) -> String {
        if request.context.is_empty() {
            request.instructions.clone()
        } else {
            format!("{}\n\n{}", request.instructions, request.context)
        }
    }
}

#[async_trait]
impl TextSynthesis for HttpSynthesisClient {
    async fn generate(&self, request: SynthesisRequest) -> Result<String, SynthesisError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let user = Self::user_message(&request);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts::system_prompt(request.role),
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut http_request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| SynthesisError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SynthesisError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::ParseError(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SynthesisError::EmptyCompletion {
                model: self.config.model.clone(),
            })?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::synthesis::Role;

    #[test]
    fn test_user_message_joins_instructions_and_context() {
        let request = SynthesisRequest::new(Role::Writer, "write it", "the notes");
        let message = HttpSynthesisClient::user_message(&request);
        assert!(message.starts_with("write it"));
        assert!(message.ends_with("the notes"));
    }

    #[test]
    fn test_user_message_without_context() {
        let request = SynthesisRequest::new(Role::Writer, "write it", "");
        assert_eq!(HttpSynthesisClient::user_message(&request), "write it");
    }

    #[test]
    fn test_from_env_requires_api_base() {
        // Isolated by key name; no other test touches this variable.
        std::env::remove_var("SYNTHESIS_API_BASE");
        assert!(matches!(
            HttpSynthesisClient::from_env(),
            Err(SynthesisError::MissingApiBase)
        ));
    }

    #[test]
    fn test_explicit_config() {
        let client = HttpSynthesisClient::new(SynthesisClientConfig {
            api_base: "http://gateway:4000".to_string(),
            model: "test-model".to_string(),
            ..SynthesisClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.model(), "test-model");
    }
}
