//! Live tab tracking from the event feed
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use navtrail_core::{ActivityError, ActivitySignal, LiveTab, TabProvider};

#[derive(Debug, Default)]
struct TabState {
    tabs: HashMap<i64, String>,
    /// Set once the browser has sent a full snapshot
    synced: bool,
}

/// Open tabs as reported by the browser's events.
///
/// Events only describe changes, so the set is incomplete until the first
/// `tabsSnapshot` arrives. Until then `live_tabs` fails and the consistency
/// checker skips its cycle instead of closing tabs it has not heard of.
#[derive(Debug, Default)]
pub struct TrackedTabs {
    state: Mutex<TabState>,
}

impl TrackedTabs {
    /// Replace the whole set with the browser's own list.
    pub fn replace(&self, snapshot: Vec<LiveTab>) {
        let mut state = self.state.lock();
        state.tabs = snapshot.into_iter().map(|tab| (tab.id, tab.url)).collect();
        state.synced = true;
        tracing::debug!(open_tabs = state.tabs.len(), "Tab snapshot applied");
    }

    pub fn observe(&self, signal: &ActivitySignal) {
        let mut state = self.state.lock();
        let tabs = &mut state.tabs;
        match signal {
            ActivitySignal::TabCreated { tab_id, url } => {
                tabs.insert(*tab_id, url.clone().unwrap_or_default());
            }
            ActivitySignal::NavigationCompleted { tab_id, url, .. } => {
                tabs.insert(*tab_id, url.clone());
            }
            ActivitySignal::TabUpdated {
                tab_id,
                url: Some(url),
                ..
            } => {
                tabs.insert(*tab_id, url.clone());
            }
            ActivitySignal::TabUpdated { tab_id, .. } | ActivitySignal::TabActivated { tab_id } => {
                tabs.entry(*tab_id).or_default();
            }
            ActivitySignal::TabRemoved { tab_id } => {
                tabs.remove(tab_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().tabs.len()
    }
}

#[async_trait]
impl TabProvider for TrackedTabs {
    async fn live_tabs(&self) -> Result<Vec<LiveTab>, ActivityError> {
        let state = self.state.lock();
        if !state.synced {
            return Err(ActivityError::Provider(
                "waiting for the first tab snapshot".into(),
            ));
        }
        let mut tabs: Vec<LiveTab> = state
            .tabs
            .iter()
            .map(|(id, url)| LiveTab {
                id: *id,
                url: url.clone(),
            })
            .collect();
        tabs.sort_by_key(|tab| tab.id);
        Ok(tabs)
    }
}
