//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for talking to inference
//! services. Adapters depend only on the [`LLMClient`] trait and receive
//! clients from an [`LLMClientFactory`].
//!
//! # Architecture
//!
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`LLMClientFactory`] - Factory trait for creating provider clients
//! - [`OpenAIClientFactory`] - Creates OpenAI-compatible clients from resolved settings
//!
//! # Example
//!
//! ```ignore
//! use operator::llm::{CompletionRequest, LLMClientFactory, OpenAIClientFactory};
//!
//! let factory = OpenAIClientFactory::new(config.provider_settings());
//! let client = factory.create("gpt-4o-mini")?;
//!
//! let reply = client.complete(&CompletionRequest::new("Be brief.", "What is 2+2?")).await?;
//! println!("{}", reply);
//! ```

/// Core LLM client trait and request types.
pub mod client;
/// OpenAI-compatible chat completions client.
pub mod openai;

pub use client::{CompletionRequest, LLMClient, LLMClientFactory, ResponseFormat};
pub use openai::{OpenAIClient, OpenAIClientFactory};
