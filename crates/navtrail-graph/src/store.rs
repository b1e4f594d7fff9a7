//! Graph repository over the object store

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use navtrail_storage::{CollectionSchema, IndexSchema, ObjectStore, StoreSchema};

use crate::error::GraphError;
use crate::model::{Edge, Node, NodeUpdate};
use crate::query::{EdgeFilter, NodeFilter};
use crate::session::{Session, SessionUpdate};
use crate::Result;

pub const NODES: &str = "nodes";
pub const EDGES: &str = "edges";
pub const SESSIONS: &str = "sessions";
pub const SETTINGS: &str = "settings";

/// Collections and indices of the navigation graph database.
pub fn graph_schema(name: &str, version: u32) -> StoreSchema {
    StoreSchema::new(name, version)
        .collection(
            CollectionSchema::new(NODES, "id")
                .index(IndexSchema::new("url"))
                .index(IndexSchema::new("tabId"))
                .index(IndexSchema::new("timestamp"))
                .index(IndexSchema::new("sessionId"))
                .index(IndexSchema::new("type")),
        )
        .collection(
            CollectionSchema::new(EDGES, "id")
                .index(IndexSchema::new("source"))
                .index(IndexSchema::new("target"))
                .index(IndexSchema::new("timestamp"))
                .index(IndexSchema::new("sessionId"))
                .index(IndexSchema::new("type")),
        )
        .collection(
            CollectionSchema::new(SESSIONS, "id")
                .index(IndexSchema::new("startTime"))
                .index(IndexSchema::new("endTime"))
                .index(IndexSchema::new("isActive")),
        )
        .collection(CollectionSchema::new(SETTINGS, "key"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub session: Session,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Number of records removed by a retention operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearStats {
    pub nodes: usize,
    pub edges: usize,
    pub sessions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCounts {
    pub sessions: usize,
    pub nodes: usize,
    pub edges: usize,
}

pub struct GraphStore {
    store: ObjectStore,
}

impl GraphStore {
    pub fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    pub fn object_store(&self) -> &ObjectStore {
        &self.store
    }

    // === Nodes ===

    pub fn save_node(&self, node: &Node) -> Result<()> {
        self.store.put(NODES, node)?;
        Ok(())
    }

    /// Best-effort bulk save: stops at the first failure, keeping whatever was
    /// already written. Returns the number saved.
    pub fn save_nodes(&self, nodes: &[Node]) -> Result<usize> {
        for (saved, node) in nodes.iter().enumerate() {
            if let Err(e) = self.save_node(node) {
                tracing::warn!(saved, total = nodes.len(), error = %e, "Node batch interrupted");
                return Err(e);
            }
        }
        Ok(nodes.len())
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.store.get(NODES, id)?)
    }

    /// Read-modify-write. Not atomic against a concurrent writer of the same
    /// node: the later `put` wins.
    pub fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<Node> {
        let mut node = self
            .get_node(id)?
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        update.apply(&mut node);
        self.save_node(&node)?;
        Ok(node)
    }

    pub fn delete_node(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(NODES, id)?)
    }

    pub fn query_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let candidates: Vec<Node> = match filter.index_lookup() {
            Some((index, value)) => self.store.get_by_index(NODES, index, &value)?,
            None => self.store.get_all(NODES)?,
        };

        let mut nodes: Vec<Node> = candidates
            .into_iter()
            .filter(|n| filter.matches(n))
            .collect();
        nodes.sort_by_key(|n| n.timestamp);
        if let Some(limit) = filter.limit {
            nodes.truncate(limit);
        }
        Ok(nodes)
    }

    // === Edges ===

    /// Save an edge, giving its target a parent if it has none yet.
    pub fn save_edge(&self, edge: &Edge) -> Result<()> {
        self.store.put(EDGES, edge)?;

        if let Some(mut target) = self.get_node(&edge.target)? {
            if target.parent_id.is_none() {
                target.parent_id = Some(edge.source.clone());
                self.save_node(&target)?;
            }
        }
        Ok(())
    }

    pub fn save_edges(&self, edges: &[Edge]) -> Result<usize> {
        for (saved, edge) in edges.iter().enumerate() {
            if let Err(e) = self.save_edge(edge) {
                tracing::warn!(saved, total = edges.len(), error = %e, "Edge batch interrupted");
                return Err(e);
            }
        }
        Ok(edges.len())
    }

    pub fn get_edge(&self, id: &str) -> Result<Option<Edge>> {
        Ok(self.store.get(EDGES, id)?)
    }

    pub fn delete_edge(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(EDGES, id)?)
    }

    pub fn query_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        let candidates: Vec<Edge> = match filter.index_lookup() {
            Some((index, value)) => self.store.get_by_index(EDGES, index, &value)?,
            None => self.store.get_all(EDGES)?,
        };

        let mut edges: Vec<Edge> = candidates
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        edges.sort_by_key(|e| e.timestamp);
        if let Some(limit) = filter.limit {
            edges.truncate(limit);
        }
        Ok(edges)
    }

    // === Sessions ===

    pub fn save_session(&self, session: &Session) -> Result<()> {
        self.store.put(SESSIONS, session)?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.store.get(SESSIONS, id)?)
    }

    pub fn session_exists(&self, id: &str) -> Result<bool> {
        Ok(self.store.exists(SESSIONS, id)?)
    }

    /// All sessions, newest first.
    pub fn get_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.store.get_all(SESSIONS)?;
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    /// Sessions still open for recording.
    pub fn active_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.store.get_by_index(SESSIONS, "isActive", &true)?;
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    pub fn update_session(&self, id: &str, update: &SessionUpdate) -> Result<Session> {
        let mut session = self
            .get_session(id)?
            .ok_or_else(|| GraphError::SessionNotFound(id.to_string()))?;
        update.apply(&mut session);
        self.save_session(&session)?;
        Ok(session)
    }

    /// Remove the session record only; see `clear_session_data` for its graph.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(SESSIONS, id)?)
    }

    // === Graph views ===

    /// Nodes and edges of a session, with missing parents filled in from
    /// edges. The repair is applied to the returned copy only.
    pub fn get_session_graph(&self, session_id: &str) -> Result<SessionGraph> {
        let mut nodes = self.query_nodes(&NodeFilter::for_session(session_id))?;
        let edges = self.query_edges(&EdgeFilter::for_session(session_id))?;

        let positions: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let mut repaired = 0usize;
        for edge in &edges {
            if let Some(&i) = positions.get(&edge.target) {
                let target = &mut nodes[i];
                if target.parent_id.is_none() {
                    target.parent_id = Some(edge.source.clone());
                    repaired += 1;
                }
            }
        }

        if repaired > 0 {
            tracing::debug!(session_id = %session_id, repaired, "Backfilled node parents");
        }

        Ok(SessionGraph { nodes, edges })
    }

    pub fn get_session_details(&self, session_id: &str) -> Result<Option<SessionDetails>> {
        let Some(session) = self.get_session(session_id)? else {
            return Ok(None);
        };
        let SessionGraph { nodes, edges } = self.get_session_graph(session_id)?;
        Ok(Some(SessionDetails {
            session,
            nodes,
            edges,
        }))
    }

    pub fn counts(&self) -> Result<GraphCounts> {
        Ok(GraphCounts {
            sessions: self.store.count(SESSIONS)?,
            nodes: self.store.count(NODES)?,
            edges: self.store.count(EDGES)?,
        })
    }

    // === Retention ===

    pub fn clear_nodes_before_time(&self, before: i64) -> Result<usize> {
        let stale = self.query_nodes(&NodeFilter {
            end_time: Some(before.saturating_sub(1)),
            ..NodeFilter::default()
        })?;

        let mut removed = 0;
        for node in &stale {
            if self.delete_node(&node.id)? {
                removed += 1;
            }
        }

        tracing::info!(before, removed, "Cleared old nodes");
        Ok(removed)
    }

    pub fn clear_edges_before_time(&self, before: i64) -> Result<usize> {
        let stale = self.query_edges(&EdgeFilter {
            end_time: Some(before.saturating_sub(1)),
            ..EdgeFilter::default()
        })?;

        let mut removed = 0;
        for edge in &stale {
            if self.delete_edge(&edge.id)? {
                removed += 1;
            }
        }

        tracing::info!(before, removed, "Cleared old edges");
        Ok(removed)
    }

    /// Delete every node and edge of a session. The session record stays.
    pub fn clear_session_data(&self, session_id: &str) -> Result<ClearStats> {
        let mut stats = ClearStats::default();

        for node in self.query_nodes(&NodeFilter::for_session(session_id))? {
            if self.delete_node(&node.id)? {
                stats.nodes += 1;
            }
        }
        for edge in self.query_edges(&EdgeFilter::for_session(session_id))? {
            if self.delete_edge(&edge.id)? {
                stats.edges += 1;
            }
        }

        tracing::info!(
            session_id = %session_id,
            nodes = stats.nodes,
            edges = stats.edges,
            "Cleared session data"
        );
        Ok(stats)
    }

    /// Delete all nodes, edges and sessions. Settings are kept.
    pub fn clear_all_data(&self) -> Result<ClearStats> {
        let stats = ClearStats {
            nodes: self.store.clear(NODES)?,
            edges: self.store.clear(EDGES)?,
            sessions: self.store.clear(SESSIONS)?,
        };
        tracing::info!(?stats, "Cleared all graph data");
        Ok(stats)
    }
}

impl Clone for GraphStore {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
