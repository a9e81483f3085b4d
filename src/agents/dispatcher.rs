//! Agent dispatch: picks the provider adapter that serves an agent.

use super::{AdapterKind, ConversationalAdapter, ExtractionAdapter, InputMode, ProviderAdapter};
use crate::fetch::ContentFetcher;
use crate::llm::{LLMClientFactory, OpenAIClientFactory};
use crate::models::{Agent, AgentType};
use crate::types::Result;
use crate::utils::toml_config::ProviderSettings;
use std::sync::Arc;
use tracing::debug;

/// Adapter kind serving each agent type.
pub fn adapter_kind(agent_type: AgentType) -> AdapterKind {
    match agent_type {
        AgentType::Executor => AdapterKind::Extraction,
        AgentType::Assistant | AgentType::Researcher | AgentType::Planner => {
            AdapterKind::Conversational
        }
    }
}

/// Builds provider adapters for agents.
pub struct Dispatcher {
    settings: ProviderSettings,
    factory: Arc<dyn LLMClientFactory>,
    fetcher: ContentFetcher,
}

impl Dispatcher {
    /// Dispatcher backed by the OpenAI-compatible service in `settings`.
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let factory = Arc::new(OpenAIClientFactory::new(settings.clone()));
        Self::with_factory(settings, factory)
    }

    pub fn with_factory(
        settings: &ProviderSettings,
        factory: Arc<dyn LLMClientFactory>,
    ) -> Result<Self> {
        Ok(Self {
            settings: settings.clone(),
            factory,
            fetcher: ContentFetcher::new(settings.fetch_timeout)?,
        })
    }

    /// Select and build the adapter for `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::types::AppError::Configuration`] if the inference
    /// client cannot be built, e.g. the API key is missing.
    pub fn select(&self, agent: &Agent) -> Result<ProviderAdapter> {
        let kind = adapter_kind(agent.agent_type);
        debug!(agent_id = %agent.id, agent_type = %agent.agent_type, %kind, "Selecting adapter");

        match kind {
            AdapterKind::Conversational => {
                let llm = self.factory.create(&self.settings.chat_model)?;
                Ok(ProviderAdapter::Conversational(ConversationalAdapter::new(
                    agent,
                    llm,
                    self.settings.timeout,
                )))
            }
            AdapterKind::Extraction => {
                let preserve_html = agent
                    .config
                    .get("preserve_html")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let llm = self.factory.create(&self.settings.extraction_model)?;
                Ok(ProviderAdapter::Extraction(
                    ExtractionAdapter::new(llm, self.fetcher.clone(), self.settings.timeout)
                        .with_preserve_html(preserve_html),
                ))
            }
        }
    }

    /// Url-mode extraction adapter for batch extraction.
    pub fn extraction_adapter(&self, preserve_html: bool) -> Result<ExtractionAdapter> {
        let llm = self.factory.create(&self.settings.extraction_model)?;
        Ok(
            ExtractionAdapter::new(llm, self.fetcher.clone(), self.settings.timeout)
                .with_preserve_html(preserve_html)
                .with_mode(InputMode::Url),
        )
    }
}
