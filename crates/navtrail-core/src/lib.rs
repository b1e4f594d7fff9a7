//! NavTrail Core
//!
//! Composition root for the tracker: configuration, logging setup, the
//! `Tracker` that owns every component, and RPC dispatch.

mod config;
mod error;
mod rpc;
mod tracker;

pub use config::{Config, DATA_DIR_ENV};
pub use error::{CoreError, ErrorCode};
pub use rpc::{dispatch, Action, RpcRequest, RpcResponse};
pub use tracker::Tracker;

// Re-export the component crates' public surface
pub use navtrail_activity::{
    ActivityError, ActivityMonitor, ActivitySignal, ConsistencyChecker, ConsistencyReport,
    IdleTimer, LiveTab, TabProvider,
};
pub use navtrail_graph::{
    Edge, EdgeFilter, GraphError, GraphStore, Node, NodeFilter, Session, SessionUpdate,
    TransitionType,
};
pub use navtrail_session::{
    CreateSessionOptions, SessionError, SessionManager, SessionMode, SettingsUpdate,
    TrackerSettings,
};
pub use navtrail_storage::StorageError;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
