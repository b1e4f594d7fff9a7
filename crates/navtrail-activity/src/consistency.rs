//! Tab consistency checker
//!
//! Closes nodes whose tab no longer exists, for closures the activity feed
//! missed (crash, lost event). It only ever marks nodes closed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

use navtrail_graph::{NodeFilter, NodeUpdate};
use navtrail_session::SessionManager;

use crate::Result;

const SYSTEM_SCHEMES: &[&str] = &[
    "about",
    "chrome",
    "chrome-extension",
    "chrome-search",
    "devtools",
    "edge",
    "moz-extension",
    "view-source",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTab {
    pub id: i64,
    pub url: String,
}

/// Source of the browser's currently open tabs.
#[async_trait]
pub trait TabProvider: Send + Sync {
    async fn live_tabs(&self) -> Result<Vec<LiveTab>>;
}

/// Browser-internal pages are not tracked.
pub fn is_system_page(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => SYSTEM_SCHEMES.contains(&parsed.scheme()),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub live_tabs: usize,
    /// Open nodes inspected in the latest session
    pub checked: usize,
    /// Ids of nodes marked closed this cycle
    pub orphaned: Vec<String>,
}

pub struct ConsistencyChecker {
    manager: SessionManager,
    provider: Arc<dyn TabProvider>,
    interval: Duration,
}

impl ConsistencyChecker {
    pub fn new(manager: SessionManager, provider: Arc<dyn TabProvider>, interval: Duration) -> Self {
        Self {
            manager,
            provider,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run_once(&self) -> Result<ConsistencyReport> {
        let tabs = self.provider.live_tabs().await?;
        let live: HashSet<i64> = tabs
            .iter()
            .filter(|tab| !is_system_page(&tab.url))
            .map(|tab| tab.id)
            .collect();

        let Some(session_id) = self.manager.latest_session_id() else {
            return Ok(ConsistencyReport {
                live_tabs: live.len(),
                ..ConsistencyReport::default()
            });
        };

        let graph = self.manager.graph();
        let open = graph.query_nodes(&NodeFilter {
            session_id: Some(session_id.clone()),
            is_closed: Some(false),
            ..NodeFilter::default()
        })?;

        let now = self.manager.now_ms();
        let mut orphaned = Vec::new();
        for node in open.iter().filter(|n| !live.contains(&n.tab_id)) {
            graph.update_node(&node.id, &NodeUpdate::closed(now))?;
            orphaned.push(node.id.clone());
        }

        if !orphaned.is_empty() {
            tracing::info!(
                session_id = %session_id,
                orphaned = orphaned.len(),
                "Closed nodes of vanished tabs"
            );
        }

        Ok(ConsistencyReport {
            live_tabs: live.len(),
            checked: open.len(),
            orphaned,
        })
    }

    /// Run `run_once` every interval until the handle is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    tracing::warn!(error = %e, "Consistency check skipped");
                }
            }
        })
    }
}
