//! Session record

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique identifier
    pub id: String,
    /// Human-readable title
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Epoch milliseconds
    pub start_time: i64,
    /// Set once, when the session ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    /// Open for recording; always false once `end_time` is set
    pub is_active: bool,
    pub last_activity: i64,
    #[serde(default)]
    pub node_count: u64,
    #[serde(default)]
    pub tab_count: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Session {
    pub fn new(title: impl Into<String>, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            start_time: now,
            end_time: None,
            is_active: true,
            last_activity: now,
            node_count: 0,
            tab_count: 0,
            metadata: Map::new(),
        }
    }

    /// End the session. Returns false when it had already ended.
    pub fn end(&mut self, now: i64) -> bool {
        if self.end_time.is_some() {
            self.is_active = false;
            return false;
        }
        self.end_time = Some(now);
        self.is_active = false;
        true
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Record activity; never moves `last_activity` backwards.
    pub fn touch(&mut self, now: i64) {
        self.last_activity = self.last_activity.max(now);
    }

    /// Most recent moment anything happened in this session.
    pub fn last_seen(&self) -> i64 {
        self.last_activity.max(self.start_time)
    }
}

/// Partial update for user-editable session fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Merged key by key into the existing metadata
    pub metadata: Option<Map<String, Value>>,
}

impl SessionUpdate {
    pub fn apply(&self, session: &mut Session) {
        if let Some(title) = &self.title {
            session.title = title.clone();
        }
        if let Some(description) = &self.description {
            session.description = description.clone();
        }
        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                session.metadata.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session() {
        let session = Session::new("Work", 1_000);
        assert_eq!(session.title, "Work");
        assert!(session.is_active);
        assert_eq!(session.last_activity, 1_000);
        assert!(!session.is_ended());
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut session = Session::new("Work", 1_000);
        assert!(session.end(2_000));
        assert!(!session.end(3_000));
        assert_eq!(session.end_time, Some(2_000));
        assert!(!session.is_active);
    }

    #[test]
    fn test_update_merges_metadata() {
        let mut session = Session::new("Work", 0);
        session.metadata.insert("mode".into(), json!("daily"));

        let mut metadata = Map::new();
        metadata.insert("pinned".into(), json!(true));
        SessionUpdate {
            title: Some("Research".into()),
            metadata: Some(metadata),
            ..SessionUpdate::default()
        }
        .apply(&mut session);

        assert_eq!(session.title, "Research");
        assert_eq!(session.metadata["mode"], json!("daily"));
        assert_eq!(session.metadata["pinned"], json!(true));
    }
}
