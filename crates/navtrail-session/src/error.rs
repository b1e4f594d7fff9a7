//! Session error types

use navtrail_graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("No session is open for recording")]
    NoLatestSession,

    #[error("Another session is being created")]
    Busy,

    #[error("Session creation is cooling down, retry in {remaining_ms}ms")]
    Cooldown { remaining_ms: i64 },

    #[error("Unknown session mode: {0}")]
    InvalidMode(String),

    #[error("Graph error: {0}")]
    Graph(GraphError),

    #[error("Storage error: {0}")]
    Storage(#[from] navtrail_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<GraphError> for SessionError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NodeNotFound(id)
            | GraphError::EdgeNotFound(id)
            | GraphError::SessionNotFound(id) => SessionError::NotFound(id),
            other => SessionError::Graph(other),
        }
    }
}

impl SessionError {
    /// Creation was refused because another creation is running or just ran.
    pub fn is_throttled(&self) -> bool {
        matches!(self, SessionError::Busy | SessionError::Cooldown { .. })
    }
}
