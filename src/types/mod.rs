use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{AgentStatus, AgentType};

// ============= API Request/Response Types =============

/// Payload for registering a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

/// Query filters for agent listing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AgentFilter {
    #[serde(rename = "type")]
    pub agent_type: Option<AgentType>,
    pub status: Option<AgentStatus>,
}

/// Payload for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i64,
    pub agent_id: String,
    #[serde(default)]
    pub parent_task_id: Option<String>,
}

/// An action request against a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    pub action: String,
    #[serde(default = "empty_object")]
    pub parameters: serde_json::Value,
}

impl AgentAction {
    /// The task input (`parameters.input`), empty when absent.
    pub fn input(&self) -> &str {
        self.parameters
            .get("input")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    /// Optional task the action should write its result to.
    pub fn task_id(&self) -> Option<&str> {
        self.parameters.get("task_id").and_then(|v| v.as_str())
    }
}

/// Batch extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataExtractionRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub data_points: Option<Vec<String>>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub preserve_html: bool,
}

fn default_output_format() -> String {
    "json".to_string()
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Response for a successful agent action.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    pub result: serde_json::Value,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fetch error{}: {message}", http_status_suffix(.status))]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Task execution failed for agent {agent_id}: {source}")]
    TaskExecution {
        agent_id: String,
        #[source]
        source: Box<AppError>,
        /// Whether the agent's `error` status reached storage.
        status_persisted: bool,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap a dispatch failure for the given agent.
    pub fn task_execution(agent_id: &str, cause: AppError, status_persisted: bool) -> Self {
        AppError::TaskExecution {
            agent_id: agent_id.to_string(),
            source: Box::new(cause),
            status_persisted,
        }
    }

    /// The innermost error, looking through `TaskExecution` wrappers.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::TaskExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True when the failure originated in a remote service rather than in
    /// caller input or local configuration.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self.root_cause(),
            AppError::Fetch { .. } | AppError::Provider(_)
        )
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::NotFound(_) => "not_found",
            AppError::AgentUnavailable(_) => "agent_unavailable",
            AppError::Configuration(_) => "configuration",
            AppError::Fetch { .. } => "fetch",
            AppError::Provider(_) => "provider",
            AppError::TaskExecution { .. } => "task_execution",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AgentUnavailable(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Fetch { .. } | AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::TaskExecution { source, .. } => source.status_code(),
            AppError::Database(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        if let AppError::TaskExecution {
            status_persisted, ..
        } = &self
        {
            body["cause"] = serde_json::json!(self.root_cause().kind());
            body["upstream"] = serde_json::json!(self.is_upstream());
            body["status_persisted"] = serde_json::json!(status_persisted);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn http_status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AppError>;
