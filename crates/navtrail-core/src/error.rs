//! Core error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use navtrail_activity::ActivityError;
use navtrail_graph::GraphError;
use navtrail_session::SessionError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] navtrail_storage::StorageError),

    #[error("Graph error: {0}")]
    Graph(#[from] navtrail_graph::GraphError),

    #[error("Session error: {0}")]
    Session(#[from] navtrail_session::SessionError),

    #[error("Activity error: {0}")]
    Activity(#[from] navtrail_activity::ActivityError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tracker not initialized")]
    NotInitialized,
}

/// Error kind reported to RPC clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    NotFound,
    Busy,
    Cooldown,
    Storage,
    InvalidRequest,
    Internal,
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Storage(_) | CoreError::Io(_) => ErrorCode::Storage,
            CoreError::Graph(e) => graph_code(e),
            CoreError::Session(e) => session_code(e),
            CoreError::Activity(ActivityError::Session(e)) => session_code(e),
            CoreError::Activity(ActivityError::Graph(e)) => graph_code(e),
            CoreError::Activity(ActivityError::Provider(_)) => ErrorCode::Internal,
            CoreError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            CoreError::Serialization(_) | CoreError::Config(_) | CoreError::NotInitialized => {
                ErrorCode::Internal
            }
        }
    }

    /// Milliseconds until session creation is allowed again.
    pub fn remaining_ms(&self) -> Option<i64> {
        match self {
            CoreError::Session(SessionError::Cooldown { remaining_ms })
            | CoreError::Activity(ActivityError::Session(SessionError::Cooldown { remaining_ms })) => {
                Some(*remaining_ms)
            }
            _ => None,
        }
    }
}

fn graph_code(err: &GraphError) -> ErrorCode {
    if err.is_not_found() {
        ErrorCode::NotFound
    } else {
        ErrorCode::Storage
    }
}

fn session_code(err: &SessionError) -> ErrorCode {
    match err {
        SessionError::NotFound(_) | SessionError::NoLatestSession => ErrorCode::NotFound,
        SessionError::Busy => ErrorCode::Busy,
        SessionError::Cooldown { .. } => ErrorCode::Cooldown,
        SessionError::InvalidMode(_) => ErrorCode::InvalidRequest,
        SessionError::Graph(e) => graph_code(e),
        SessionError::Storage(_) => ErrorCode::Storage,
        SessionError::Json(_) => ErrorCode::Internal,
    }
}
