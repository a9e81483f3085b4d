//! LLM client abstractions
//!
//! The adapters talk to inference services through [`LLMClient`], and obtain
//! clients from an [`LLMClientFactory`] so tests can substitute their own.

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Output format requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// The service must reply with a single valid JSON object
    JsonObject,
}

/// A single-turn completion request: one system and one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: None,
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Run a completion and return the model's text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Creates LLM clients for a given model.
pub trait LLMClientFactory: Send + Sync {
    /// Build a client for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::types::AppError::Configuration`] when the provider
    /// cannot be used, e.g. its API key is missing.
    fn create(&self, model: &str) -> Result<Arc<dyn LLMClient>>;
}
