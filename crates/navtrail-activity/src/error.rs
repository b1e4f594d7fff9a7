//! Activity error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Session error: {0}")]
    Session(#[from] navtrail_session::SessionError),

    #[error("Graph error: {0}")]
    Graph(#[from] navtrail_graph::GraphError),

    #[error("Tab provider failed: {0}")]
    Provider(String),
}
