//! General-purpose conversational adapter.

use crate::llm::{CompletionRequest, LLMClient};
use crate::models::{Agent, AgentType};
use crate::types::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Sampling temperature for conversational requests.
pub const TEMPERATURE: f32 = 0.7;

/// Upper bound on generated tokens for conversational requests.
pub const MAX_TOKENS: u32 = 2000;

/// Role directive appended to the system prompt for each agent type.
///
/// Types without an entry get an empty directive.
pub fn role_directive(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Assistant => "Assist users with their queries and tasks.",
        AgentType::Researcher => "Research and analyze information from various sources.",
        AgentType::Planner => "Plan and break down complex tasks into manageable steps.",
        AgentType::Executor => "",
    }
}

/// Build the system prompt for `agent` from its type and enabled capabilities.
pub fn build_system_prompt(agent: &Agent) -> String {
    let capabilities = agent
        .enabled_capabilities()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a {} agent with the following capabilities:\n{}\n\nYour role: {}",
        agent.agent_type,
        capabilities,
        role_directive(agent.agent_type)
    )
}

/// Sends one system + user turn to the conversational model.
pub struct ConversationalAdapter {
    agent_type: AgentType,
    system_prompt: String,
    llm: Arc<dyn LLMClient>,
    timeout: Duration,
}

impl ConversationalAdapter {
    pub fn new(agent: &Agent, llm: Arc<dyn LLMClient>, timeout: Duration) -> Self {
        Self {
            agent_type: agent.agent_type,
            system_prompt: build_system_prompt(agent),
            llm,
            timeout,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `input` as the user message and return the model's reply.
    pub async fn process(&self, input: &str) -> Result<String> {
        info!(
            agent_type = %self.agent_type,
            model = self.llm.model_name(),
            input_chars = input.chars().count(),
            "Processing task with conversational adapter"
        );

        let request = CompletionRequest::new(self.system_prompt.clone(), input)
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        let reply = self.llm.complete(&request).await?;
        debug!(reply_chars = reply.chars().count(), "Conversational reply received");

        Ok(reply)
    }
}
