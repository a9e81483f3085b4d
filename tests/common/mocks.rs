//! Mock implementations for testing.
//!
//! This module provides mock LLM clients, factories and storage fixtures that
//! can be used across different test files without duplication.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use operator::llm::{CompletionRequest, LLMClient, LLMClientFactory};
use operator::models::{task_status, Agent, AgentStatus, AgentType, Task};
use operator::types::{AppError, Result};
use operator::{AgentStore, Dispatcher, OperatorConfig, ProviderSettings, TursoClient};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock LLM client for testing with configurable responses.
///
/// Every request it receives is recorded and can be inspected with
/// [`MockLLMClient::requests`]. Clones share the recorded requests.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    /// Create a mock client that waits before answering.
    pub fn slow(response: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(response)
        }
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(AppError::Provider("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Factory that hands out clones of one [`MockLLMClient`].
pub struct MockLLMFactory {
    client: MockLLMClient,
}

impl MockLLMFactory {
    pub fn new(client: MockLLMClient) -> Self {
        Self { client }
    }
}

impl LLMClientFactory for MockLLMFactory {
    fn create(&self, _model: &str) -> Result<Arc<dyn LLMClient>> {
        Ok(Arc::new(self.client.clone()))
    }
}

/// Provider settings with a fake API key and the given timeout.
pub fn test_settings(timeout: Duration) -> ProviderSettings {
    let mut config = OperatorConfig::default();
    config.dispatch.timeout_secs = timeout.as_secs().max(1);
    let mut settings = config.provider_settings_with(|_| Some("sk-test".to_string()));
    settings.timeout = timeout;
    settings
}

/// Dispatcher whose adapters all talk to `client`.
pub fn mock_dispatcher(client: MockLLMClient, timeout: Duration) -> Arc<Dispatcher> {
    Arc::new(
        Dispatcher::with_factory(&test_settings(timeout), Arc::new(MockLLMFactory::new(client)))
            .unwrap(),
    )
}

pub async fn memory_store() -> Arc<dyn AgentStore> {
    Arc::new(TursoClient::new_memory().await.unwrap())
}

/// Store a fresh agent and return it.
pub async fn register_agent(
    store: &Arc<dyn AgentStore>,
    agent_type: AgentType,
    status: AgentStatus,
) -> Agent {
    let now = Utc::now();
    let mut capabilities = BTreeMap::new();
    capabilities.insert("can_search".to_string(), true);
    capabilities.insert("can_write".to_string(), false);

    let agent = Agent {
        id: uuid::Uuid::new_v4().to_string(),
        name: format!("{}-agent", agent_type),
        description: None,
        agent_type,
        status,
        capabilities,
        config: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    };
    store.create_agent(&agent).await.unwrap();
    agent
}

/// Store a pending task for `agent_id` and return it.
pub async fn create_task(
    store: &Arc<dyn AgentStore>,
    agent_id: &str,
    title: &str,
    description: Option<&str>,
) -> Task {
    let now = Utc::now();
    let task = Task {
        id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: description.map(str::to_string),
        status: task_status::PENDING.to_string(),
        priority: 0,
        result: None,
        agent_id: agent_id.to_string(),
        parent_task_id: None,
        created_at: now,
        updated_at: now,
    };
    store.create_task(&task).await.unwrap();
    task
}

/// OpenAI chat completion body whose single choice carries `content`.
pub fn chat_completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4-1106-preview",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}
