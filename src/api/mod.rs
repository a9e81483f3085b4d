//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Operator, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Agents (`/api/v1/agents`)
//! - `POST /api/v1/agents` - Register an agent
//! - `GET /api/v1/agents?type=&status=` - List agents
//! - `GET /api/v1/agents/{id}` - Get an agent
//! - `DELETE /api/v1/agents/{id}` - Delete an agent with its tasks and conversations
//! - `GET /api/v1/agents/{id}/tasks` - List an agent's tasks
//! - `POST /api/v1/agents/{id}/action` - Dispatch input to the agent
//! - `POST /api/v1/agents/{id}/reset` - Move an agent from `error` back to `idle`
//!
//! ## Tasks (`/api/v1/tasks`)
//! - `POST /api/v1/tasks` - Create a task
//! - `GET /api/v1/tasks/{id}` - Get a task
//! - `DELETE /api/v1/tasks/{id}` - Delete a task and its subtasks
//! - `POST /api/v1/tasks/{id}/run` - Run a task on its owning agent
//!
//! ## Extraction
//! - `POST /api/v1/data-extraction/process` - Extract from a list of URLs
//!
//! ## Service
//! - `GET /` - Service banner
//! - `GET /health` - Database-backed health check
//!
//! Errors are returned as `{"error": ..., "kind": ...}` with the status code
//! chosen by [`AppError`](crate::types::AppError).

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

pub use routes::{build_app, create_router};
