//! NavTrail Navigation Graph
//!
//! Typed repository for the recorded browsing graph:
//! - Nodes: one per page view / navigation
//! - Edges: causal transitions between nodes
//! - Sessions: recording windows that own nodes and edges
//!
//! Built only on object store primitives. Writes are per record; there is no
//! transaction spanning several records.

mod error;
mod model;
mod query;
mod session;
mod store;

pub use error::GraphError;
pub use model::{Edge, Node, NodeUpdate, TransitionType};
pub use query::{EdgeFilter, NodeFilter};
pub use session::{Session, SessionUpdate};
pub use store::{
    graph_schema, ClearStats, GraphCounts, GraphStore, SessionDetails, SessionGraph, EDGES,
    NODES, SESSIONS, SETTINGS,
};

pub type Result<T> = std::result::Result<T, GraphError>;
