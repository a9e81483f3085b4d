//! OpenAI-compatible chat completions client
//!
//! Talks to any service exposing `POST {api_base}/chat/completions` with the
//! OpenAI request and response shapes.

use crate::llm::client::{CompletionRequest, LLMClient, LLMClientFactory, ResponseFormat};
use crate::types::{AppError, Result};
use crate::utils::toml_config::ProviderSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// OpenAI API structures
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatParam>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormatParam {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: match request.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(ResponseFormatParam {
                    kind: "json_object",
                }),
            },
        }
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Provider(format!("OpenAI request timed out: {}", e))
                } else {
                    AppError::Provider(format!("OpenAI API error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "OpenAI API returned {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Malformed OpenAI response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Provider("No response from OpenAI".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Builds [`OpenAIClient`]s from resolved provider settings.
pub struct OpenAIClientFactory {
    settings: ProviderSettings,
}

impl OpenAIClientFactory {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl LLMClientFactory for OpenAIClientFactory {
    fn create(&self, model: &str) -> Result<Arc<dyn LLMClient>> {
        let api_key = self.settings.api_key.clone().ok_or_else(|| {
            AppError::Configuration(format!(
                "OpenAI API key not found (set {})",
                self.settings.api_key_env
            ))
        })?;

        Ok(Arc::new(OpenAIClient::new(
            api_key,
            self.settings.api_base.clone(),
            model.to_string(),
            self.settings.timeout,
        )?))
    }
}
