//! Browser activity signals

use navtrail_graph::TransitionType;
use serde::{Deserialize, Serialize};

/// One event from the browser's tab feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ActivitySignal {
    TabCreated {
        tab_id: i64,
        #[serde(default)]
        url: Option<String>,
    },
    TabActivated {
        tab_id: i64,
    },
    NavigationCompleted {
        tab_id: i64,
        url: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        transition: Option<TransitionType>,
    },
    TabUpdated {
        tab_id: i64,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        favicon_url: Option<String>,
    },
    TabRemoved {
        tab_id: i64,
    },
}

impl ActivitySignal {
    pub fn tab_id(&self) -> i64 {
        match self {
            ActivitySignal::TabCreated { tab_id, .. }
            | ActivitySignal::TabActivated { tab_id }
            | ActivitySignal::NavigationCompleted { tab_id, .. }
            | ActivitySignal::TabUpdated { tab_id, .. }
            | ActivitySignal::TabRemoved { tab_id } => *tab_id,
        }
    }

    /// Whether the signal shows the user doing something.
    pub fn is_user_activity(&self) -> bool {
        !matches!(self, ActivitySignal::TabRemoved { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivitySignal::TabCreated { .. } => "tabCreated",
            ActivitySignal::TabActivated { .. } => "tabActivated",
            ActivitySignal::NavigationCompleted { .. } => "navigationCompleted",
            ActivitySignal::TabUpdated { .. } => "tabUpdated",
            ActivitySignal::TabRemoved { .. } => "tabRemoved",
        }
    }
}
