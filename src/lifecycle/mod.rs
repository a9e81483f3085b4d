//! Task Execution Lifecycle
//!
//! Wraps one adapter call with the agent status machine and the task
//! bookkeeping around it:
//!
//! ```text
//! idle | error --(dispatch start)--> busy --(success)--> idle
//!                                         \--(failure)--> error
//! ```
//!
//! The `busy` transition is a guarded storage update, so of two simultaneous
//! dispatches to one agent only one gets through.

use crate::agents::{AdapterKind, Dispatcher, ProviderAdapter, ProviderResult};
use crate::db::AgentStore;
use crate::models::{task_status, Agent, AgentStatus, Conversation, ConversationMessage};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Attempts made at writing the agent's final status.
const STATUS_WRITE_ATTEMPTS: usize = 2;

/// Output of a successful dispatch
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub agent_id: String,
    pub task_id: Option<String>,
    pub adapter: AdapterKind,
    pub result: ProviderResult,
    /// Wall time of the adapter call in milliseconds
    pub duration_ms: u64,
}

/// Result of a reset request
#[derive(Debug, Clone, Serialize)]
pub struct ResetOutcome {
    pub agent: Agent,
    /// False when the agent was not in `error` and was left untouched
    pub reset: bool,
}

/// What a [`DispatchHook`] sees after a successful dispatch.
pub struct DispatchContext<'a> {
    pub agent: &'a Agent,
    pub task_id: Option<&'a str>,
    pub input: &'a str,
    pub adapter: AdapterKind,
    pub result: &'a ProviderResult,
}

/// Runs after a dispatch succeeded and its task result was stored, before
/// the agent goes back to `idle`. Hook failures are logged and never fail
/// the dispatch.
#[async_trait]
pub trait DispatchHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after_dispatch(&self, context: &DispatchContext<'_>) -> Result<()>;
}

/// Appends a user/assistant exchange to the agent's conversations.
pub struct ConversationRecorder {
    store: Arc<dyn AgentStore>,
}

impl ConversationRecorder {
    pub fn new(store: Arc<dyn AgentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DispatchHook for ConversationRecorder {
    fn name(&self) -> &str {
        "conversation_recorder"
    }

    async fn after_dispatch(&self, context: &DispatchContext<'_>) -> Result<()> {
        let now = Utc::now();
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: context.agent.id.clone(),
            task_id: context.task_id.map(str::to_string),
            messages: vec![
                ConversationMessage::new("user", context.input),
                ConversationMessage::new("assistant", context.result.main_content()),
            ],
            meta_info: serde_json::json!({ "adapter": context.adapter }),
            summary: None,
            created_at: now,
            updated_at: now,
        };

        self.store.append_conversation(&conversation).await
    }
}

/// Drives dispatches through the agent status machine.
#[derive(Clone)]
pub struct TaskLifecycle {
    store: Arc<dyn AgentStore>,
    dispatcher: Arc<Dispatcher>,
    hooks: Vec<Arc<dyn DispatchHook>>,
}

impl TaskLifecycle {
    pub fn new(store: Arc<dyn AgentStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn DispatchHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Register a [`ConversationRecorder`] when `enabled`
    pub fn with_conversation_recording(self, enabled: bool) -> Self {
        if enabled {
            let recorder = Arc::new(ConversationRecorder::new(self.store.clone()));
            self.with_hook(recorder)
        } else {
            self
        }
    }

    /// Dispatch `input` to the agent, optionally recording into `task_id`.
    ///
    /// # Errors
    ///
    /// Before the agent is marked busy:
    /// - [`AppError::NotFound`] for a missing agent or task
    /// - [`AppError::AgentUnavailable`] if the agent is disabled or busy
    /// - [`AppError::InvalidInput`] if the task belongs to another agent
    /// - [`AppError::Configuration`] if no adapter can be built
    ///
    /// Once the agent is busy every failure comes back as
    /// [`AppError::TaskExecution`] and leaves the agent in `error`.
    ///
    /// Work after the `busy` transition runs on its own task, so dropping
    /// the returned future does not stop the agent and task from reaching
    /// their final status.
    pub async fn execute(
        &self,
        agent_id: &str,
        input: &str,
        task_id: Option<&str>,
    ) -> Result<DispatchOutcome> {
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", agent_id)))?;

        if agent.status == AgentStatus::Disabled {
            return Err(AppError::AgentUnavailable(format!(
                "Agent {} is disabled",
                agent.id
            )));
        }

        if let Some(task_id) = task_id {
            let task = self
                .store
                .get_task(task_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;
            if task.agent_id != agent.id {
                return Err(AppError::InvalidInput(format!(
                    "Task {} belongs to agent {}, not {}",
                    task.id, task.agent_id, agent.id
                )));
            }
        }

        let adapter = self.dispatcher.select(&agent)?;

        if !self.store.try_mark_busy(&agent.id).await? {
            return Err(AppError::AgentUnavailable(format!(
                "Agent {} is busy or disabled",
                agent.id
            )));
        }
        info!(
            agent_id = %agent.id,
            from = %agent.status,
            to = %AgentStatus::Busy,
            adapter = %adapter.kind(),
            task_id,
            "Agent dispatch started"
        );

        // The agent is busy from here on. The rest runs detached so a dropped
        // caller still leaves the agent and task in a terminal state.
        let agent_id = agent.id.clone();
        let lifecycle = self.clone();
        let input = input.to_string();
        let task_id = task_id.map(str::to_string);
        let handle =
            tokio::spawn(async move { lifecycle.finish(agent, adapter, input, task_id).await });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let cause = AppError::Internal(format!("Dispatch task aborted: {}", e));
                let persisted = self.write_final_status(&agent_id, AgentStatus::Error).await;
                Err(AppError::task_execution(&agent_id, cause, persisted))
            }
        }
    }

    async fn finish(
        &self,
        agent: Agent,
        adapter: ProviderAdapter,
        input: String,
        task_id: Option<String>,
    ) -> Result<DispatchOutcome> {
        let task_id = task_id.as_deref();
        let started = Instant::now();

        match self.dispatch(&adapter, &input, task_id).await {
            Ok(result) => {
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.run_hooks(&DispatchContext {
                    agent: &agent,
                    task_id,
                    input: &input,
                    adapter: adapter.kind(),
                    result: &result,
                })
                .await;

                if self.write_final_status(&agent.id, AgentStatus::Idle).await {
                    info!(agent_id = %agent.id, duration_ms, "Agent dispatch completed");
                }

                Ok(DispatchOutcome {
                    agent_id: agent.id,
                    task_id: task_id.map(str::to_string),
                    adapter: adapter.kind(),
                    result,
                    duration_ms,
                })
            }
            Err(cause) => Err(self.fail(&agent.id, task_id, cause).await),
        }
    }

    /// Run a stored task on its owning agent.
    pub async fn run_task(&self, task_id: &str) -> Result<DispatchOutcome> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;

        self.execute(&task.agent_id, &task.input(), Some(&task.id))
            .await
    }

    /// Move an agent from `error` back to `idle`. Agents in any other state
    /// are returned unchanged with `reset = false`.
    pub async fn reset_agent(&self, agent_id: &str) -> Result<ResetOutcome> {
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", agent_id)))?;

        if agent.status != AgentStatus::Error {
            info!(agent_id, status = %agent.status, "Agent not in error, reset skipped");
            return Ok(ResetOutcome {
                agent,
                reset: false,
            });
        }

        let reset = self
            .store
            .transition_agent_status(agent_id, AgentStatus::Error, AgentStatus::Idle)
            .await?;

        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", agent_id)))?;

        if reset {
            info!(agent_id, from = %AgentStatus::Error, to = %AgentStatus::Idle, "Agent reset");
        }
        Ok(ResetOutcome { agent, reset })
    }

    async fn dispatch(
        &self,
        adapter: &ProviderAdapter,
        input: &str,
        task_id: Option<&str>,
    ) -> Result<ProviderResult> {
        if let Some(task_id) = task_id {
            self.store
                .update_task(task_id, task_status::RUNNING, None)
                .await?;
        }

        let result = adapter.process(input).await?;

        if let Some(task_id) = task_id {
            self.store
                .update_task(task_id, task_status::COMPLETED, Some(&result.to_value()))
                .await?;
        }

        Ok(result)
    }

    async fn run_hooks(&self, context: &DispatchContext<'_>) {
        for hook in &self.hooks {
            if let Err(e) = hook.after_dispatch(context).await {
                warn!(hook = hook.name(), agent_id = %context.agent.id, error = %e, "Dispatch hook failed");
            }
        }
    }

    async fn fail(&self, agent_id: &str, task_id: Option<&str>, cause: AppError) -> AppError {
        warn!(agent_id, task_id, error = %cause, "Agent dispatch failed");

        if let Some(task_id) = task_id {
            let result = serde_json::json!({ "error": cause.to_string() });
            if let Err(e) = self
                .store
                .update_task(task_id, task_status::FAILED, Some(&result))
                .await
            {
                warn!(task_id, error = %e, "Failed to mark task as failed");
            }
        }

        let persisted = self.write_final_status(agent_id, AgentStatus::Error).await;
        AppError::task_execution(agent_id, cause, persisted)
    }

    /// Write the post-dispatch status, retrying once. Returns whether it
    /// reached storage.
    async fn write_final_status(&self, agent_id: &str, status: AgentStatus) -> bool {
        for attempt in 1..=STATUS_WRITE_ATTEMPTS {
            match self.store.set_agent_status(agent_id, status).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(agent_id, %status, attempt, error = %e, "Failed to write agent status")
                }
            }
        }

        error!(
            agent_id,
            %status,
            "Agent status could not be persisted; stored status is stale"
        );
        false
    }
}
