//! Query filters
//!
//! A query is served by the single most selective index its filter allows,
//! falling back to a full scan. Every criterion, the time range and the limit
//! are then applied in memory.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{Edge, Node, TransitionType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeFilter {
    pub session_id: Option<String>,
    pub tab_id: Option<i64>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<TransitionType>,
    pub is_closed: Option<bool>,
    /// Inclusive lower bound, epoch milliseconds
    pub start_time: Option<i64>,
    /// Inclusive upper bound, epoch milliseconds
    pub end_time: Option<i64>,
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// Index name and lookup value, most selective first.
    pub(crate) fn index_lookup(&self) -> Option<(&'static str, Value)> {
        if let Some(session_id) = &self.session_id {
            return Some(("sessionId", json!(session_id)));
        }
        if let Some(tab_id) = self.tab_id {
            return Some(("tabId", json!(tab_id)));
        }
        if let Some(url) = &self.url {
            return Some(("url", json!(url)));
        }
        self.node_type.map(|t| ("type", json!(t)))
    }

    pub(crate) fn matches(&self, node: &Node) -> bool {
        self.session_id.as_ref().map_or(true, |s| &node.session_id == s)
            && self.tab_id.map_or(true, |t| node.tab_id == t)
            && self.url.as_ref().map_or(true, |u| &node.url == u)
            && self.node_type.map_or(true, |t| node.node_type == t)
            && self.is_closed.map_or(true, |c| node.is_closed == c)
            && in_range(node.timestamp, self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeFilter {
    pub session_id: Option<String>,
    pub source: Option<String>,
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub edge_type: Option<TransitionType>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: Option<usize>,
}

impl EdgeFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub(crate) fn index_lookup(&self) -> Option<(&'static str, Value)> {
        if let Some(session_id) = &self.session_id {
            return Some(("sessionId", json!(session_id)));
        }
        if let Some(source) = &self.source {
            return Some(("source", json!(source)));
        }
        if let Some(target) = &self.target {
            return Some(("target", json!(target)));
        }
        self.edge_type.map(|t| ("type", json!(t)))
    }

    pub(crate) fn matches(&self, edge: &Edge) -> bool {
        self.session_id.as_ref().map_or(true, |s| &edge.session_id == s)
            && self.source.as_ref().map_or(true, |s| &edge.source == s)
            && self.target.as_ref().map_or(true, |t| &edge.target == t)
            && self.edge_type.map_or(true, |t| edge.edge_type == t)
            && in_range(edge.timestamp, self.start_time, self.end_time)
    }
}

fn in_range(timestamp: i64, start: Option<i64>, end: Option<i64>) -> bool {
    start.map_or(true, |s| timestamp >= s) && end.map_or(true, |e| timestamp <= e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_index_priority() {
        let filter = NodeFilter {
            session_id: Some("s".into()),
            tab_id: Some(3),
            url: Some("https://a.test".into()),
            ..NodeFilter::default()
        };
        assert_eq!(filter.index_lookup().unwrap().0, "sessionId");

        let filter = NodeFilter {
            tab_id: Some(3),
            url: Some("https://a.test".into()),
            ..NodeFilter::default()
        };
        assert_eq!(filter.index_lookup().unwrap().0, "tabId");

        let filter = NodeFilter {
            node_type: Some(TransitionType::Reload),
            ..NodeFilter::default()
        };
        assert_eq!(filter.index_lookup(), Some(("type", json!("reload"))));

        assert!(NodeFilter::default().index_lookup().is_none());
    }

    #[test]
    fn test_edge_index_priority() {
        let filter = EdgeFilter {
            target: Some("n2".into()),
            edge_type: Some(TransitionType::Link),
            ..EdgeFilter::default()
        };
        assert_eq!(filter.index_lookup().unwrap().0, "target");
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let node = Node::new("https://a.test", 1, "s", 100);
        let filter = NodeFilter {
            start_time: Some(100),
            end_time: Some(100),
            ..NodeFilter::default()
        };
        assert!(filter.matches(&node));

        let filter = NodeFilter {
            start_time: Some(101),
            ..NodeFilter::default()
        };
        assert!(!filter.matches(&node));
    }
}
