//! Node and edge records

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How the browser arrived at a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionType {
    #[default]
    Link,
    Typed,
    AutoBookmark,
    Reload,
    FormSubmit,
    Redirect,
    Generated,
    Keyword,
    StartPage,
    HistoryBack,
    HistoryForward,
    /// Anything the browser reports that we do not model
    Other,
}

impl TransitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionType::Link => "link",
            TransitionType::Typed => "typed",
            TransitionType::AutoBookmark => "auto_bookmark",
            TransitionType::Reload => "reload",
            TransitionType::FormSubmit => "form_submit",
            TransitionType::Redirect => "redirect",
            TransitionType::Generated => "generated",
            TransitionType::Keyword => "keyword",
            TransitionType::StartPage => "start_page",
            TransitionType::HistoryBack => "history_back",
            TransitionType::HistoryForward => "history_forward",
            TransitionType::Other => "other",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "link" => TransitionType::Link,
            "typed" => TransitionType::Typed,
            "auto_bookmark" => TransitionType::AutoBookmark,
            "reload" => TransitionType::Reload,
            "form_submit" => TransitionType::FormSubmit,
            "redirect" => TransitionType::Redirect,
            "generated" => TransitionType::Generated,
            "keyword" | "keyword_generated" => TransitionType::Keyword,
            "start_page" => TransitionType::StartPage,
            "history_back" => TransitionType::HistoryBack,
            "history_forward" => TransitionType::HistoryForward,
            _ => TransitionType::Other,
        })
    }
}

impl Serialize for TransitionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransitionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Infallible: unknown strings become `Other`
        Ok(raw.parse().unwrap_or(TransitionType::Other))
    }
}

/// One recorded navigation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub tab_id: i64,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub session_id: String,
    #[serde(rename = "type", default)]
    pub node_type: TransitionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<i64>,
}

impl Node {
    pub fn new(
        url: impl Into<String>,
        tab_id: i64,
        session_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            title: String::new(),
            tab_id,
            timestamp,
            session_id: session_id.into(),
            node_type: TransitionType::Link,
            parent_id: None,
            favicon_url: None,
            is_closed: false,
            close_time: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_type(mut self, node_type: TransitionType) -> Self {
        self.node_type = node_type;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Mark the node's tab as gone. Keeps the first close time.
    pub fn close(&mut self, at: i64) {
        if !self.is_closed {
            self.is_closed = true;
            self.close_time = Some(at);
        }
    }
}

/// Partial update for a node; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeUpdate {
    pub url: Option<String>,
    pub title: Option<String>,
    pub favicon_url: Option<String>,
    pub parent_id: Option<String>,
    pub is_closed: Option<bool>,
    pub close_time: Option<i64>,
}

impl NodeUpdate {
    pub fn closed(at: i64) -> Self {
        Self {
            is_closed: Some(true),
            close_time: Some(at),
            ..Self::default()
        }
    }

    pub fn apply(&self, node: &mut Node) {
        if let Some(url) = &self.url {
            node.url = url.clone();
        }
        if let Some(title) = &self.title {
            node.title = title.clone();
        }
        if let Some(favicon_url) = &self.favicon_url {
            node.favicon_url = Some(favicon_url.clone());
        }
        if let Some(parent_id) = &self.parent_id {
            node.parent_id = Some(parent_id.clone());
        }
        if let Some(is_closed) = self.is_closed {
            node.is_closed = is_closed;
        }
        if let Some(close_time) = self.close_time {
            node.close_time = Some(close_time);
        }
    }
}

/// A recorded transition between two nodes. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub timestamp: i64,
    pub session_id: String,
    #[serde(rename = "type", default)]
    pub edge_type: TransitionType,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: i64,
        edge_type: TransitionType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            target: target.into(),
            timestamp,
            session_id: session_id.into(),
            edge_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_serializes_with_index_field_names() {
        let node = Node::new("https://example.com", 4, "s1", 1_000).with_type(TransitionType::Typed);
        let value = serde_json::to_value(&node).unwrap();

        assert_eq!(value["tabId"], json!(4));
        assert_eq!(value["sessionId"], json!("s1"));
        assert_eq!(value["type"], json!("typed"));
        assert!(value.get("parentId").is_none());
    }

    #[test]
    fn test_unknown_transition_maps_to_other() {
        let parsed: TransitionType = serde_json::from_value(json!("auto_subframe")).unwrap();
        assert_eq!(parsed, TransitionType::Other);
        let parsed: TransitionType = serde_json::from_value(json!("keyword_generated")).unwrap();
        assert_eq!(parsed, TransitionType::Keyword);
    }

    #[test]
    fn test_node_update_touches_only_given_fields() {
        let mut node = Node::new("https://a.test", 1, "s", 10).with_title("A");
        NodeUpdate {
            title: Some("B".into()),
            ..NodeUpdate::default()
        }
        .apply(&mut node);

        assert_eq!(node.title, "B");
        assert_eq!(node.url, "https://a.test");
        assert!(!node.is_closed);
    }

    #[test]
    fn test_close_keeps_first_time() {
        let mut node = Node::new("https://a.test", 1, "s", 10);
        node.close(20);
        node.close(30);
        assert!(node.is_closed);
        assert_eq!(node.close_time, Some(20));
    }
}
