use crate::db::traits::AgentStore;
use crate::models::{Agent, AgentStatus, Conversation, ConversationMessage, Task};
use crate::types::{AgentFilter, AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Builder, Connection, Row, Value};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'idle',
    capabilities TEXT NOT NULL DEFAULT '{}',
    config TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0,
    result TEXT,
    agent_id TEXT NOT NULL,
    parent_task_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (agent_id) REFERENCES agents(id),
    FOREIGN KEY (parent_task_id) REFERENCES tasks(id)
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL,
    task_id TEXT,
    messages TEXT NOT NULL DEFAULT '[]',
    meta_info TEXT NOT NULL DEFAULT '{}',
    summary TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (agent_id) REFERENCES agents(id),
    FOREIGN KEY (task_id) REFERENCES tasks(id)
);

CREATE INDEX IF NOT EXISTS idx_tasks_agent ON tasks(agent_id);
CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_task_id);
CREATE INDEX IF NOT EXISTS idx_conversations_agent ON conversations(agent_id);
";

/// Ids of a task and all of its descendants.
const TASK_SUBTREE: &str = "
WITH RECURSIVE subtree(id) AS (
    SELECT id FROM tasks WHERE id = ?
    UNION ALL
    SELECT t.id FROM tasks t JOIN subtree s ON t.parent_task_id = s.id
)
SELECT id FROM subtree";

const AGENT_COLUMNS: &str =
    "id, name, description, type, status, capabilities, config, created_at, updated_at";

const TASK_COLUMNS: &str = "id, title, description, status, priority, result, agent_id, \
                            parent_task_id, created_at, updated_at";

const CONVERSATION_COLUMNS: &str =
    "id, agent_id, task_id, messages, meta_info, summary, created_at, updated_at";

/// libsql-backed [`AgentStore`].
///
/// Holds a single connection: every `connect()` on an in-memory database
/// opens a fresh, empty database. Access is serialized so transactions never
/// interleave with other statements.
pub struct TursoClient {
    conn: Mutex<Connection>,
}

impl TursoClient {
    /// Open an ephemeral in-memory database
    pub async fn new_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    /// Open (or create) a database file, creating parent directories as needed
    pub async fn new_local(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Self::open(path).await
    }

    async fn open(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let client = Self {
            conn: Mutex::new(conn),
        };
        client.initialize_schema().await?;

        info!(path, "Database ready");
        Ok(client)
    }

    async fn operation_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.operation_conn().await;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create schema: {}", e)))?;
        Ok(())
    }

    async fn query_agents(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Agent>> {
        let conn = self.operation_conn().await;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| AppError::Database(format!("Failed to query agents: {}", e)))?;

        let mut agents = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            agents.push(agent_from_row(&row)?);
        }
        Ok(agents)
    }

    async fn query_tasks(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Task>> {
        let conn = self.operation_conn().await;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| AppError::Database(format!("Failed to query tasks: {}", e)))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            tasks.push(task_from_row(&row)?);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl AgentStore for TursoClient {
    async fn create_agent(&self, agent: &Agent) -> Result<()> {
        let conn = self.operation_conn().await;

        conn.execute(
            &format!(
                "INSERT INTO agents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                AGENT_COLUMNS
            ),
            params![
                agent.id.as_str(),
                agent.name.as_str(),
                agent.description.clone(),
                agent.agent_type.as_str(),
                agent.status.as_str(),
                to_json(&agent.capabilities)?,
                to_json(&agent.config)?,
                agent.created_at.timestamp_millis(),
                agent.updated_at.timestamp_millis(),
            ],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create agent: {}", e)))?;

        debug!(agent_id = %agent.id, "Agent stored");
        Ok(())
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        let sql = format!("SELECT {} FROM agents WHERE id = ?", AGENT_COLUMNS);
        let mut agents = self.query_agents(&sql, vec![id.into()]).await?;
        Ok(agents.pop())
    }

    async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<Agent>> {
        let agent_type: Value = filter.agent_type.map(|t| t.as_str()).into();
        let status: Value = filter.status.map(|s| s.as_str()).into();

        let sql = format!(
            "SELECT {} FROM agents
             WHERE (? IS NULL OR type = ?) AND (? IS NULL OR status = ?)
             ORDER BY created_at, id",
            AGENT_COLUMNS
        );
        self.query_agents(&sql, vec![agent_type.clone(), agent_type, status.clone(), status])
            .await
    }

    async fn delete_agent(&self, id: &str) -> Result<bool> {
        let conn = self.operation_conn().await;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        tx.execute("DELETE FROM conversations WHERE agent_id = ?", [id])
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete conversations: {}", e)))?;
        let tasks = tx
            .execute("DELETE FROM tasks WHERE agent_id = ?", [id])
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete tasks: {}", e)))?;
        let deleted = tx
            .execute("DELETE FROM agents WHERE id = ?", [id])
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete agent: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit delete: {}", e)))?;

        debug!(agent_id = id, tasks, "Agent deleted");
        Ok(deleted > 0)
    }

    async fn try_mark_busy(&self, id: &str) -> Result<bool> {
        let conn = self.operation_conn().await;
        let changed = conn
            .execute(
                "UPDATE agents SET status = 'busy', updated_at = ?
                 WHERE id = ? AND status IN ('idle', 'error')",
                params![Utc::now().timestamp_millis(), id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to update agent status: {}", e)))?;
        Ok(changed == 1)
    }

    async fn transition_agent_status(
        &self,
        id: &str,
        from: AgentStatus,
        to: AgentStatus,
    ) -> Result<bool> {
        let conn = self.operation_conn().await;
        let changed = conn
            .execute(
                "UPDATE agents SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                params![
                    to.as_str(),
                    Utc::now().timestamp_millis(),
                    id,
                    from.as_str()
                ],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to update agent status: {}", e)))?;
        Ok(changed == 1)
    }

    async fn set_agent_status(&self, id: &str, status: AgentStatus) -> Result<()> {
        let conn = self.operation_conn().await;
        let changed = conn
            .execute(
                "UPDATE agents SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), Utc::now().timestamp_millis(), id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to update agent status: {}", e)))?;

        if changed == 0 {
            return Err(AppError::NotFound(format!("Agent {} not found", id)));
        }
        Ok(())
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        let result = task.result.as_ref().map(to_json).transpose()?;
        let conn = self.operation_conn().await;

        conn.execute(
            &format!(
                "INSERT INTO tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TASK_COLUMNS
            ),
            params![
                task.id.as_str(),
                task.title.as_str(),
                task.description.clone(),
                task.status.as_str(),
                task.priority,
                result,
                task.agent_id.as_str(),
                task.parent_task_id.clone(),
                task.created_at.timestamp_millis(),
                task.updated_at.timestamp_millis(),
            ],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create task: {}", e)))?;

        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let mut tasks = self.query_tasks(&sql, vec![id.into()]).await?;
        Ok(tasks.pop())
    }

    async fn list_agent_tasks(&self, agent_id: &str) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE agent_id = ? ORDER BY priority DESC, created_at, id",
            TASK_COLUMNS
        );
        self.query_tasks(&sql, vec![agent_id.into()]).await
    }

    async fn update_task(
        &self,
        id: &str,
        status: &str,
        result: Option<&serde_json::Value>,
    ) -> Result<()> {
        let result = result.map(to_json).transpose()?;
        let conn = self.operation_conn().await;

        let changed = conn
            .execute(
                "UPDATE tasks SET status = ?, result = COALESCE(?, result), updated_at = ?
                 WHERE id = ?",
                params![status, result, Utc::now().timestamp_millis(), id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to update task: {}", e)))?;

        if changed == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", id)));
        }
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<bool> {
        let conn = self.operation_conn().await;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            &format!(
                "UPDATE conversations SET task_id = NULL WHERE task_id IN ({})",
                TASK_SUBTREE
            ),
            [id],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to detach conversations: {}", e)))?;

        let deleted = tx
            .execute(
                &format!("DELETE FROM tasks WHERE id IN ({})", TASK_SUBTREE),
                [id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete tasks: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit delete: {}", e)))?;

        debug!(task_id = id, deleted, "Task subtree deleted");
        Ok(deleted > 0)
    }

    async fn append_conversation(&self, conversation: &Conversation) -> Result<()> {
        let messages = to_json(&conversation.messages)?;
        let meta_info = to_json(&conversation.meta_info)?;
        let conn = self.operation_conn().await;

        conn.execute(
            &format!(
                "INSERT INTO conversations ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                CONVERSATION_COLUMNS
            ),
            params![
                conversation.id.as_str(),
                conversation.agent_id.as_str(),
                conversation.task_id.clone(),
                messages,
                meta_info,
                conversation.summary.clone(),
                conversation.created_at.timestamp_millis(),
                conversation.updated_at.timestamp_millis(),
            ],
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to store conversation: {}", e)))?;

        Ok(())
    }

    async fn list_agent_conversations(&self, agent_id: &str) -> Result<Vec<Conversation>> {
        let conn = self.operation_conn().await;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM conversations WHERE agent_id = ? ORDER BY created_at, id",
                    CONVERSATION_COLUMNS
                ),
                [agent_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query conversations: {}", e)))?;

        let mut conversations = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let messages: Vec<ConversationMessage> = from_json(&text(&row, 3)?)?;
            conversations.push(Conversation {
                id: text(&row, 0)?,
                agent_id: text(&row, 1)?,
                task_id: optional_text(&row, 2)?,
                messages,
                meta_info: from_json(&text(&row, 4)?)?,
                summary: optional_text(&row, 5)?,
                created_at: timestamp(integer(&row, 6)?)?,
                updated_at: timestamp(integer(&row, 7)?)?,
            });
        }
        Ok(conversations)
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.operation_conn().await;
        let mut rows = conn
            .query("SELECT 1", ())
            .await
            .map_err(|e| AppError::Database(format!("Database ping failed: {}", e)))?;
        rows.next()
            .await
            .map_err(|e| AppError::Database(format!("Database ping failed: {}", e)))?;
        Ok(())
    }
}

// ============= Row mapping =============

fn column_value(row: &Row, idx: i32) -> Result<Value> {
    row.get_value(idx)
        .map_err(|e| AppError::Database(format!("Failed to read column {}: {}", idx, e)))
}

fn text(row: &Row, idx: i32) -> Result<String> {
    match column_value(row, idx)? {
        Value::Text(value) => Ok(value),
        other => Err(AppError::Database(format!(
            "Expected text in column {}, got {:?}",
            idx, other
        ))),
    }
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match column_value(row, idx)? {
        Value::Null => Ok(None),
        Value::Text(value) => Ok(Some(value)),
        other => Err(AppError::Database(format!(
            "Expected text in column {}, got {:?}",
            idx, other
        ))),
    }
}

fn integer(row: &Row, idx: i32) -> Result<i64> {
    match column_value(row, idx)? {
        Value::Integer(value) => Ok(value),
        other => Err(AppError::Database(format!(
            "Expected integer in column {}, got {:?}",
            idx, other
        ))),
    }
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Database(format!("Invalid timestamp {}", millis)))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize column: {}", e)))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Database(format!("Corrupt JSON column: {}", e)))
}

fn agent_from_row(row: &Row) -> Result<Agent> {
    let agent_type = text(row, 3)?;
    let status = text(row, 4)?;

    Ok(Agent {
        id: text(row, 0)?,
        name: text(row, 1)?,
        description: optional_text(row, 2)?,
        agent_type: agent_type
            .parse()
            .map_err(|e| AppError::Database(format!("Corrupt agent row: {}", e)))?,
        status: status
            .parse()
            .map_err(|e| AppError::Database(format!("Corrupt agent row: {}", e)))?,
        capabilities: from_json(&text(row, 5)?)?,
        config: from_json(&text(row, 6)?)?,
        created_at: timestamp(integer(row, 7)?)?,
        updated_at: timestamp(integer(row, 8)?)?,
    })
}

fn task_from_row(row: &Row) -> Result<Task> {
    let result = optional_text(row, 5)?;

    Ok(Task {
        id: text(row, 0)?,
        title: text(row, 1)?,
        description: optional_text(row, 2)?,
        status: text(row, 3)?,
        priority: integer(row, 4)?,
        result: result.as_deref().map(from_json).transpose()?,
        agent_id: text(row, 6)?,
        parent_task_id: optional_text(row, 7)?,
        created_at: timestamp(integer(row, 8)?)?,
        updated_at: timestamp(integer(row, 9)?)?,
    })
}
