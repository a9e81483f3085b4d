//! # Operator - agent registry and task dispatch server
//!
//! Operator lets callers register typed agents, give them tasks, and have
//! each dispatch go either to an OpenAI-compatible inference service or to a
//! web extraction pipeline. Results come back in one normalized envelope.
//!
//! ## Overview
//!
//! Operator can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `operator-server` binary
//! 2. **As a library** - Build an [`AppState`] and drive the lifecycle directly
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use operator::{AppState, OperatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> operator::Result<()> {
//!     let config = OperatorConfig::load("operator.toml")?;
//!     let state = AppState::from_config(config).await?;
//!
//!     let outcome = state.lifecycle.execute(&agent_id, "Summarize this week's notes", None).await?;
//!     println!("{}", outcome.result.main_content());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Provider adapters and the dispatcher
//! - [`api`] - REST API handlers and routes
//! - [`db`] - Agent, task and conversation storage (libsql)
//! - [`fetch`] - Web page retrieval and text extraction
//! - [`lifecycle`] - Agent status machine around each dispatch
//! - [`llm`] - Inference service clients
//! - [`normalize`] - Result envelope construction
//! - [`pipeline`] - Batch extraction over URLs
//! - [`types`] - Request types and error handling
//!
//! ## Data flow
//!
//! ```text
//! caller -> TaskLifecycle -> Dispatcher -> ProviderAdapter (-> ContentFetcher)
//!        -> normalize -> caller
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Provider adapters and agent dispatch.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface definitions.
pub mod cli;
/// Relational storage (libsql).
pub mod db;
/// Web page fetching and text extraction.
pub mod fetch;
/// Task execution lifecycle.
pub mod lifecycle;
/// LLM provider clients and abstractions.
pub mod llm;
/// Persisted domain records.
pub mod models;
/// Result envelope construction.
pub mod normalize;
/// Batch URL extraction.
pub mod pipeline;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use agents::{AdapterKind, Dispatcher, ProviderAdapter, ProviderResult};
pub use db::{AgentStore, DatabaseProvider, TursoClient};
pub use lifecycle::{ConversationRecorder, DispatchHook, DispatchOutcome, TaskLifecycle};
pub use llm::{LLMClient, LLMClientFactory};
pub use normalize::ResultEnvelope;
pub use pipeline::ExtractionPipeline;
pub use types::{AppError, Result};
pub use utils::toml_config::{OperatorConfig, ProviderSettings};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Configuration loaded at startup
    pub config: Arc<OperatorConfig>,
    /// Agent, task and conversation storage
    pub db: Arc<dyn AgentStore>,
    /// Dispatch lifecycle for agent actions and task runs
    pub lifecycle: Arc<TaskLifecycle>,
    /// Batch extraction
    pub pipeline: Arc<ExtractionPipeline>,
}

impl AppState {
    /// Open storage and build the dispatcher from `config`, resolving
    /// provider secrets from the environment.
    pub async fn from_config(config: OperatorConfig) -> Result<Self> {
        let db = DatabaseProvider::from_config(&config.database)
            .create_client()
            .await?;
        let dispatcher = Arc::new(Dispatcher::new(&config.provider_settings())?);
        Ok(Self::with_parts(config, db, dispatcher))
    }

    /// Assemble state from already-built parts.
    pub fn with_parts(
        config: OperatorConfig,
        db: Arc<dyn AgentStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let lifecycle = TaskLifecycle::new(db.clone(), dispatcher.clone())
            .with_conversation_recording(config.dispatch.record_conversations);
        let pipeline = ExtractionPipeline::new(dispatcher, config.dispatch.extraction_concurrency);

        Self {
            config: Arc::new(config),
            db,
            lifecycle: Arc::new(lifecycle),
            pipeline: Arc::new(pipeline),
        }
    }
}
