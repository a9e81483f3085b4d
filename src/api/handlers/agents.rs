//! Agent registration, lookup and dispatch handlers.

use crate::lifecycle::ResetOutcome;
use crate::models::{Agent, AgentStatus, Task};
use crate::types::{ActionResponse, AgentAction, AgentCreate, AgentFilter, AppError, Result};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

/// The only action agents understand.
const PROCESS_ACTION: &str = "process";

/// Register a new agent
pub async fn create_agent(
    State(state): State<AppState>,
    Json(payload): Json<AgentCreate>,
) -> Result<(StatusCode, Json<Agent>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Agent name must not be empty".to_string()));
    }
    if !payload.config.is_object() {
        return Err(AppError::InvalidInput(
            "Agent config must be a JSON object".to_string(),
        ));
    }

    let status = payload.status.unwrap_or(AgentStatus::Idle);
    if status == AgentStatus::Busy {
        return Err(AppError::InvalidInput(
            "Agents cannot be registered as busy".to_string(),
        ));
    }

    let now = Utc::now();
    let agent = Agent {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        description: payload.description,
        agent_type: payload.agent_type,
        status,
        capabilities: payload.capabilities,
        config: payload.config,
        created_at: now,
        updated_at: now,
    };

    state.db.create_agent(&agent).await?;
    info!(agent_id = %agent.id, agent_type = %agent.agent_type, "Agent registered");

    Ok((StatusCode::CREATED, Json(agent)))
}

/// List agents, optionally filtered by `type` and `status`
pub async fn list_agents(
    State(state): State<AppState>,
    Query(filter): Query<AgentFilter>,
) -> Result<Json<Vec<Agent>>> {
    Ok(Json(state.db.list_agents(&filter).await?))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Agent>> {
    state
        .db
        .get_agent(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Agent {} not found", id)))
}

/// Delete an agent together with its tasks and conversations
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_agent(&id).await? {
        return Err(AppError::NotFound(format!("Agent {} not found", id)));
    }
    info!(agent_id = %id, "Agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_agent_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Task>>> {
    if state.db.get_agent(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Agent {} not found", id)));
    }
    Ok(Json(state.db.list_agent_tasks(&id).await?))
}

/// Execute an action on an agent
pub async fn execute_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(action): Json<AgentAction>,
) -> Result<Json<ActionResponse>> {
    if action.action != PROCESS_ACTION {
        return Err(AppError::InvalidInput(format!(
            "Unsupported action '{}'",
            action.action
        )));
    }
    if action.input().trim().is_empty() {
        return Err(AppError::InvalidInput(
            "parameters.input must not be empty".to_string(),
        ));
    }

    let outcome = state
        .lifecycle
        .execute(&id, action.input(), action.task_id())
        .await?;

    Ok(Json(ActionResponse {
        status: "success".to_string(),
        result: outcome.result.to_value(),
    }))
}

/// Recover an agent from the `error` state
pub async fn reset_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResetOutcome>> {
    Ok(Json(state.lifecycle.reset_agent(&id).await?))
}
