//! Task CRUD and execution handlers.

use crate::models::{task_status, Task};
use crate::types::{ActionResponse, AppError, Result, TaskCreate};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskCreate>,
) -> Result<(StatusCode, Json<Task>)> {
    if payload.title.trim().is_empty() {
        return Err(AppError::InvalidInput("Task title must not be empty".to_string()));
    }

    if state.db.get_agent(&payload.agent_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Agent {} not found",
            payload.agent_id
        )));
    }

    if let Some(parent_id) = &payload.parent_task_id {
        let parent = state
            .db
            .get_task(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Parent task {} not found", parent_id)))?;
        if parent.agent_id != payload.agent_id {
            return Err(AppError::InvalidInput(format!(
                "Parent task {} belongs to another agent",
                parent_id
            )));
        }
    }

    let now = Utc::now();
    let task = Task {
        id: uuid::Uuid::new_v4().to_string(),
        title: payload.title,
        description: payload.description,
        status: task_status::PENDING.to_string(),
        priority: payload.priority,
        result: None,
        agent_id: payload.agent_id,
        parent_task_id: payload.parent_task_id,
        created_at: now,
        updated_at: now,
    };

    state.db.create_task(&task).await?;
    info!(task_id = %task.id, agent_id = %task.agent_id, "Task created");

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    state
        .db
        .get_task(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))
}

/// Delete a task and its subtasks
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_task(&id).await? {
        return Err(AppError::NotFound(format!("Task {} not found", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Run a task on its owning agent
pub async fn run_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>> {
    let outcome = state.lifecycle.run_task(&id).await?;

    Ok(Json(ActionResponse {
        status: "success".to_string(),
        result: outcome.result.to_value(),
    }))
}
