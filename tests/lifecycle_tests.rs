//! Task execution lifecycle tests against an in-memory database and mock
//! inference clients.

mod common;

use async_trait::async_trait;
use common::mocks::{
    create_task, memory_store, mock_dispatcher, register_agent, MockLLMClient,
};
use operator::lifecycle::DispatchContext;
use operator::models::{task_status, Agent, AgentStatus, AgentType, Conversation, Task};
use operator::types::{AgentFilter, AppError, Result};
use operator::{
    AdapterKind, AgentStore, DispatchHook, Dispatcher, OperatorConfig, ProviderResult,
    TaskLifecycle,
};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn agent_status(store: &Arc<dyn AgentStore>, id: &str) -> AgentStatus {
    store.get_agent(id).await.unwrap().unwrap().status
}

#[tokio::test]
async fn test_successful_dispatch_returns_agent_to_idle() {
    let store = memory_store().await;
    let client = MockLLMClient::new("Here is your answer");
    let lifecycle = TaskLifecycle::new(store.clone(), mock_dispatcher(client.clone(), TIMEOUT));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;
    let task = create_task(&store, &agent.id, "Answer", None).await;

    let outcome = lifecycle
        .execute(&agent.id, "What is the answer?", Some(&task.id))
        .await
        .unwrap();

    assert_eq!(outcome.adapter, AdapterKind::Conversational);
    assert_eq!(outcome.result, ProviderResult::Text("Here is your answer".to_string()));
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, task_status::COMPLETED);
    assert_eq!(task.result, Some(serde_json::json!("Here is your answer")));

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "What is the answer?");
    assert!(requests[0].system.contains("- can_search"));
    assert!(!requests[0].system.contains("can_write"));
    assert_eq!(requests[0].temperature, 0.7);
    assert_eq!(requests[0].max_tokens, Some(2000));
}

#[tokio::test]
async fn test_failed_dispatch_marks_agent_error() {
    let store = memory_store().await;
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::failing(), TIMEOUT));

    let agent = register_agent(&store, AgentType::Researcher, AgentStatus::Idle).await;
    let task = create_task(&store, &agent.id, "Research", None).await;

    let err = lifecycle
        .execute(&agent.id, "Find sources", Some(&task.id))
        .await
        .unwrap_err();

    match &err {
        AppError::TaskExecution {
            agent_id,
            status_persisted,
            ..
        } => {
            assert_eq!(agent_id, &agent.id);
            assert!(status_persisted);
        }
        other => panic!("expected TaskExecution, got {:?}", other),
    }
    assert!(matches!(err.root_cause(), AppError::Provider(_)));
    assert!(err.is_upstream());
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Error);

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, task_status::FAILED);
    let message = task.result.unwrap()["error"].as_str().unwrap().to_string();
    assert!(message.contains("Mock LLM failure"));
}

#[tokio::test]
async fn test_agent_in_error_can_be_dispatched_again() {
    let store = memory_store().await;
    let agent = register_agent(&store, AgentType::Planner, AgentStatus::Idle).await;

    let failing =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::failing(), TIMEOUT));
    assert!(failing.execute(&agent.id, "Plan", None).await.is_err());
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Error);

    let working =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("Plan"), TIMEOUT));
    working.execute(&agent.id, "Plan", None).await.unwrap();
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);
}

#[tokio::test]
async fn test_disabled_agent_is_unavailable() {
    let store = memory_store().await;
    let client = MockLLMClient::new("unused");
    let lifecycle = TaskLifecycle::new(store.clone(), mock_dispatcher(client.clone(), TIMEOUT));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Disabled).await;

    let err = lifecycle.execute(&agent.id, "hi", None).await.unwrap_err();
    assert!(matches!(err, AppError::AgentUnavailable(_)));
    assert!(client.requests().is_empty());
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Disabled);
}

#[tokio::test]
async fn test_missing_agent_and_task() {
    let store = memory_store().await;
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("x"), TIMEOUT));

    let err = lifecycle.execute("missing", "hi", None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;
    let err = lifecycle
        .execute(&agent.id, "hi", Some("missing-task"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);

    let err = lifecycle.run_task("missing-task").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_task_of_another_agent_is_rejected() {
    let store = memory_store().await;
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("x"), TIMEOUT));

    let owner = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;
    let other = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;
    let task = create_task(&store, &owner.id, "Owned", None).await;

    let err = lifecycle
        .execute(&other.id, "hi", Some(&task.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, task_status::PENDING);
}

#[tokio::test]
async fn test_missing_api_key_leaves_agent_untouched() {
    let store = memory_store().await;
    let settings = OperatorConfig::default().provider_settings_with(|_| None);
    let lifecycle = TaskLifecycle::new(store.clone(), Arc::new(Dispatcher::new(&settings).unwrap()));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;

    let err = lifecycle.execute(&agent.id, "hi", None).await.unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)));
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);
}

#[tokio::test]
async fn test_simultaneous_dispatches_admit_exactly_one() {
    let store = memory_store().await;
    let client = MockLLMClient::slow("done", Duration::from_millis(200));
    let lifecycle = TaskLifecycle::new(store.clone(), mock_dispatcher(client, TIMEOUT));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;

    let (first, second) = tokio::join!(
        lifecycle.execute(&agent.id, "same input", None),
        lifecycle.execute(&agent.id, "same input", None)
    );

    let results = [first, second];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let unavailable = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::AgentUnavailable(_))))
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(unavailable, 1);
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);
}

#[tokio::test]
async fn test_sequential_dispatches_are_repeatable() {
    let store = memory_store().await;
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("same"), TIMEOUT));

    let agent = register_agent(&store, AgentType::Researcher, AgentStatus::Idle).await;

    let first = lifecycle.execute(&agent.id, "input", None).await.unwrap();
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);
    let second = lifecycle.execute(&agent.id, "input", None).await.unwrap();
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);

    assert_eq!(first.result, second.result);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let store = memory_store().await;
    let client = MockLLMClient::slow("late", Duration::from_secs(5));
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(client, Duration::from_millis(50)));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;

    let err = lifecycle.execute(&agent.id, "hi", None).await.unwrap_err();
    match err.root_cause() {
        AppError::Provider(message) => assert!(message.contains("timed out")),
        other => panic!("expected provider timeout, got {:?}", other),
    }
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Error);
}

/// Poll until the agent leaves `busy`, giving up after `limit`.
async fn wait_until_not_busy(store: &Arc<dyn AgentStore>, id: &str, limit: Duration) -> AgentStatus {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let status = agent_status(store, id).await;
        if status != AgentStatus::Busy || tokio::time::Instant::now() >= deadline {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_dropped_caller_still_finishes_dispatch() {
    let store = memory_store().await;
    let client = MockLLMClient::slow("eventually", Duration::from_millis(300));
    let lifecycle = TaskLifecycle::new(store.clone(), mock_dispatcher(client, TIMEOUT));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;
    let task = create_task(&store, &agent.id, "Slow", None).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        lifecycle.execute(&agent.id, "hi", Some(&task.id)),
    )
    .await;
    assert!(abandoned.is_err());

    let status = wait_until_not_busy(&store, &agent.id, Duration::from_secs(3)).await;
    assert_eq!(status, AgentStatus::Idle);

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, task_status::COMPLETED);
    assert_eq!(task.result, Some(serde_json::json!("eventually")));

    lifecycle.execute(&agent.id, "again", None).await.unwrap();
}

#[tokio::test]
async fn test_dropped_caller_still_records_failure() {
    let store = memory_store().await;
    let client = MockLLMClient::slow("late", Duration::from_secs(5));
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(client, Duration::from_millis(200)));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;
    let task = create_task(&store, &agent.id, "Too slow", None).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        lifecycle.execute(&agent.id, "hi", Some(&task.id)),
    )
    .await;
    assert!(abandoned.is_err());

    let status = wait_until_not_busy(&store, &agent.id, Duration::from_secs(3)).await;
    assert_eq!(status, AgentStatus::Error);

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, task_status::FAILED);
}

#[tokio::test]
async fn test_executor_dispatch_stores_structured_result() {
    let store = memory_store().await;
    let reply = r#"{"main_content": "Revenue grew", "structured_data": {"key_points": ["growth"]}}"#;
    let client = MockLLMClient::new(reply);
    let lifecycle = TaskLifecycle::new(store.clone(), mock_dispatcher(client.clone(), TIMEOUT));

    let agent = register_agent(&store, AgentType::Executor, AgentStatus::Idle).await;
    let task = create_task(&store, &agent.id, "Extract", None).await;

    let outcome = lifecycle
        .execute(&agent.id, "Revenue grew 4% this quarter.", Some(&task.id))
        .await
        .unwrap();
    assert_eq!(outcome.adapter, AdapterKind::Extraction);
    assert_eq!(outcome.result.main_content(), "Revenue grew");

    let stored = store.get_task(&task.id).await.unwrap().unwrap().result.unwrap();
    assert_eq!(stored["main_content"], "Revenue grew");
    assert_eq!(stored["structured_data"]["key_points"][0], "growth");

    let requests = client.requests();
    assert_eq!(requests[0].prompt, "Revenue grew 4% this quarter.");
    assert_eq!(requests[0].temperature, 0.3);
}

#[tokio::test]
async fn test_run_task_sends_title_and_description() {
    let store = memory_store().await;
    let client = MockLLMClient::new("ok");
    let lifecycle = TaskLifecycle::new(store.clone(), mock_dispatcher(client.clone(), TIMEOUT));

    let agent = register_agent(&store, AgentType::Planner, AgentStatus::Idle).await;
    let task = create_task(&store, &agent.id, "Plan launch", Some("Three phases")).await;

    let outcome = lifecycle.run_task(&task.id).await.unwrap();
    assert_eq!(outcome.task_id.as_deref(), Some(task.id.as_str()));
    assert_eq!(client.requests()[0].prompt, "Plan launch\n\nThree phases");

    let task = store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(task.status, task_status::COMPLETED);
}

#[tokio::test]
async fn test_reset_agent() {
    let store = memory_store().await;
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("x"), TIMEOUT));

    let broken = register_agent(&store, AgentType::Assistant, AgentStatus::Error).await;
    let outcome = lifecycle.reset_agent(&broken.id).await.unwrap();
    assert!(outcome.reset);
    assert_eq!(outcome.agent.status, AgentStatus::Idle);

    let disabled = register_agent(&store, AgentType::Assistant, AgentStatus::Disabled).await;
    let outcome = lifecycle.reset_agent(&disabled.id).await.unwrap();
    assert!(!outcome.reset);
    assert_eq!(outcome.agent.status, AgentStatus::Disabled);

    let err = lifecycle.reset_agent("missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_conversation_recording() {
    let store = memory_store().await;
    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;

    let silent =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("hi"), TIMEOUT));
    silent.execute(&agent.id, "hello", None).await.unwrap();
    assert!(store.list_agent_conversations(&agent.id).await.unwrap().is_empty());

    let recording =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("hi"), TIMEOUT))
            .with_conversation_recording(true);
    recording.execute(&agent.id, "hello", None).await.unwrap();

    let conversations = store.list_agent_conversations(&agent.id).await.unwrap();
    assert_eq!(conversations.len(), 1);
    let messages = &conversations[0].messages;
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].content, "hi");
    assert_eq!(conversations[0].meta_info["adapter"], "conversational");
}

struct BrokenHook;

#[async_trait]
impl DispatchHook for BrokenHook {
    fn name(&self) -> &str {
        "broken"
    }

    async fn after_dispatch(&self, _context: &DispatchContext<'_>) -> Result<()> {
        Err(AppError::Internal("hook exploded".to_string()))
    }
}

#[tokio::test]
async fn test_hook_failure_does_not_fail_dispatch() {
    let store = memory_store().await;
    let lifecycle =
        TaskLifecycle::new(store.clone(), mock_dispatcher(MockLLMClient::new("ok"), TIMEOUT))
            .with_hook(Arc::new(BrokenHook));

    let agent = register_agent(&store, AgentType::Assistant, AgentStatus::Idle).await;
    lifecycle.execute(&agent.id, "hi", None).await.unwrap();
    assert_eq!(agent_status(&store, &agent.id).await, AgentStatus::Idle);
}

// ============= Storage failure injection =============

/// Store whose agent status writes always fail.
struct StatusWriteFailingStore {
    inner: Arc<dyn AgentStore>,
}

#[async_trait]
impl AgentStore for StatusWriteFailingStore {
    async fn create_agent(&self, agent: &Agent) -> Result<()> {
        self.inner.create_agent(agent).await
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        self.inner.get_agent(id).await
    }

    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>> {
        self.inner.list_agents(filter).await
    }

    async fn delete_agent(&self, id: &str) -> Result<bool> {
        self.inner.delete_agent(id).await
    }

    async fn try_mark_busy(&self, id: &str) -> Result<bool> {
        self.inner.try_mark_busy(id).await
    }

    async fn transition_agent_status(
        &self,
        id: &str,
        from: AgentStatus,
        to: AgentStatus,
    ) -> Result<bool> {
        self.inner.transition_agent_status(id, from, to).await
    }

    async fn set_agent_status(&self, _id: &str, _status: AgentStatus) -> Result<()> {
        Err(AppError::Database("disk I/O error".to_string()))
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        self.inner.create_task(task).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.inner.get_task(id).await
    }

    async fn list_agent_tasks(&self, agent_id: &str) -> Result<Vec<Task>> {
        self.inner.list_agent_tasks(agent_id).await
    }

    async fn update_task(
        &self,
        id: &str,
        status: &str,
        result: Option<&serde_json::Value>,
    ) -> Result<()> {
        self.inner.update_task(id, status, result).await
    }

    async fn delete_task(&self, id: &str) -> Result<bool> {
        self.inner.delete_task(id).await
    }

    async fn append_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.inner.append_conversation(conversation).await
    }

    async fn list_agent_conversations(&self, agent_id: &str) -> Result<Vec<Conversation>> {
        self.inner.list_agent_conversations(agent_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn test_unpersisted_error_status_is_reported() {
    let inner = memory_store().await;
    let agent = register_agent(&inner, AgentType::Assistant, AgentStatus::Idle).await;

    let store: Arc<dyn AgentStore> = Arc::new(StatusWriteFailingStore {
        inner: inner.clone(),
    });
    let lifecycle = TaskLifecycle::new(store, mock_dispatcher(MockLLMClient::failing(), TIMEOUT));

    let err = lifecycle.execute(&agent.id, "hi", None).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::TaskExecution {
            status_persisted: false,
            ..
        }
    ));
    assert_eq!(agent_status(&inner, &agent.id).await, AgentStatus::Busy);
}
