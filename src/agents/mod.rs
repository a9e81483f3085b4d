//! Provider adapters and agent dispatch.
//!
//! An agent record is served by one of two adapters:
//!
//! - [`ConversationalAdapter`] - single-turn chat with a prompt built from the
//!   agent's type and capabilities
//! - [`ExtractionAdapter`] - structured JSON extraction from raw text or a
//!   fetched web page
//!
//! Both sit behind [`ProviderAdapter`], whose single [`ProviderAdapter::process`]
//! entry point bounds every call with the adapter's timeout. The
//! [`Dispatcher`] picks the variant from the agent type.

pub mod conversational;
pub mod dispatcher;
pub mod extraction;

pub use conversational::ConversationalAdapter;
pub use dispatcher::{adapter_kind, Dispatcher};
pub use extraction::{Extraction, ExtractionAdapter, InputMode};

use crate::types::{AppError, Result};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The closed set of adapter variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Conversational,
    Extraction,
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKind::Conversational => f.write_str("conversational"),
            AdapterKind::Extraction => f.write_str("extraction"),
        }
    }
}

/// What an adapter produced: free text or a structured extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProviderResult {
    Text(String),
    Structured(Extraction),
}

impl ProviderResult {
    /// The primary content, whichever variant this is.
    pub fn main_content(&self) -> &str {
        match self {
            ProviderResult::Text(text) => text,
            ProviderResult::Structured(extraction) => &extraction.main_content,
        }
    }

    /// JSON form stored as a task result and returned to callers.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ProviderResult::Text(text) => serde_json::Value::String(text.clone()),
            ProviderResult::Structured(extraction) => extraction.to_value(),
        }
    }
}

/// A provider adapter selected for one dispatch.
pub enum ProviderAdapter {
    Conversational(ConversationalAdapter),
    Extraction(ExtractionAdapter),
}

impl ProviderAdapter {
    pub fn kind(&self) -> AdapterKind {
        match self {
            ProviderAdapter::Conversational(_) => AdapterKind::Conversational,
            ProviderAdapter::Extraction(_) => AdapterKind::Extraction,
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            ProviderAdapter::Conversational(adapter) => adapter.timeout(),
            ProviderAdapter::Extraction(adapter) => adapter.timeout(),
        }
    }

    /// Run the adapter on `input`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Provider`] when the call exceeds the adapter's
    /// timeout, otherwise whatever the adapter itself fails with.
    pub async fn process(&self, input: &str) -> Result<ProviderResult> {
        let timeout = self.timeout();
        let call = async {
            match self {
                ProviderAdapter::Conversational(adapter) => {
                    adapter.process(input).await.map(ProviderResult::Text)
                }
                ProviderAdapter::Extraction(adapter) => {
                    adapter.process(input).await.map(ProviderResult::Structured)
                }
            }
        };

        tokio::time::timeout(timeout, call).await.map_err(|_| {
            AppError::Provider(format!(
                "{} adapter timed out after {}s",
                self.kind(),
                timeout.as_secs_f64()
            ))
        })?
    }
}
