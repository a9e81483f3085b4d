//! Relational storage for agents, tasks and conversations.
//!
//! The rest of the crate is written against [`AgentStore`]; [`TursoClient`]
//! implements it on libsql, either in memory or in a local file.

pub mod traits;
pub mod turso;

pub use traits::{AgentStore, DatabaseProvider};
pub use turso::TursoClient;
