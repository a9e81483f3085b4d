//! Storage abstraction traits
//!
//! This module provides the [`AgentStore`] trait that the task lifecycle and
//! the HTTP handlers are written against, and [`DatabaseProvider`] for picking
//! a backend from configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use operator::db::{AgentStore, DatabaseProvider};
//!
//! // In-memory database (tests, throwaway runs)
//! let db = DatabaseProvider::Memory.create_client().await?;
//!
//! // File-based database
//! let db = DatabaseProvider::SQLite { path: "data/operator.db".into() }.create_client().await?;
//! ```

use crate::models::{Agent, AgentStatus, Conversation, Task};
use crate::types::{AgentFilter, Result};
use crate::utils::toml_config::DatabaseConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Database provider configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DatabaseProvider {
    /// In-memory database (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based database
    SQLite {
        /// Path to the database file
        path: String,
    },
}

impl DatabaseProvider {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        match config.url.trim() {
            "" | ":memory:" => DatabaseProvider::Memory,
            path => DatabaseProvider::SQLite {
                path: path.to_string(),
            },
        }
    }

    /// Create a storage client from this provider configuration
    pub async fn create_client(&self) -> Result<Arc<dyn AgentStore>> {
        match self {
            DatabaseProvider::Memory => {
                let client = super::turso::TursoClient::new_memory().await?;
                Ok(Arc::new(client))
            }
            DatabaseProvider::SQLite { path } => {
                let client = super::turso::TursoClient::new_local(path).await?;
                Ok(Arc::new(client))
            }
        }
    }
}

/// Persistence for agents, tasks and conversations.
///
/// Every write is a single atomic statement unless noted otherwise.
#[async_trait]
pub trait AgentStore: Send + Sync {
    // ============== Agent Operations ==============

    async fn create_agent(&self, agent: &Agent) -> Result<()>;

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>>;

    /// Agents matching `filter`, oldest first
    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>>;

    /// Delete an agent with its tasks and conversations in one transaction.
    /// Returns `false` if the agent did not exist.
    async fn delete_agent(&self, id: &str) -> Result<bool>;

    /// Guarded `idle|error -> busy` transition. Returns `false` when the
    /// agent is missing or in any other state.
    async fn try_mark_busy(&self, id: &str) -> Result<bool>;

    /// Guarded `from -> to` transition. Returns `false` when the agent is
    /// missing or not in `from`.
    async fn transition_agent_status(
        &self,
        id: &str,
        from: AgentStatus,
        to: AgentStatus,
    ) -> Result<bool>;

    /// Unconditionally set the agent's status
    async fn set_agent_status(&self, id: &str, status: AgentStatus) -> Result<()>;

    // ============== Task Operations ==============

    async fn create_task(&self, task: &Task) -> Result<()>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// Tasks owned by an agent, highest priority first
    async fn list_agent_tasks(&self, agent_id: &str) -> Result<Vec<Task>>;

    /// Set a task's status, and its result when `result` is given
    async fn update_task(
        &self,
        id: &str,
        status: &str,
        result: Option<&serde_json::Value>,
    ) -> Result<()>;

    /// Delete a task and all of its subtasks. Returns `false` if the task
    /// did not exist.
    async fn delete_task(&self, id: &str) -> Result<bool>;

    // ============== Conversation Operations ==============

    async fn append_conversation(&self, conversation: &Conversation) -> Result<()>;

    async fn list_agent_conversations(&self, agent_id: &str) -> Result<Vec<Conversation>>;

    // ============== Health ==============

    /// Cheap round trip to the database
    async fn ping(&self) -> Result<()>;
}
