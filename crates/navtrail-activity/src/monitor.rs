//! Activity monitor
//!
//! Turns browser signals into session activity and navigation records:
//! - Activity marks closer than the debounce window are dropped
//! - Every accepted mark restarts the idle timer
//! - Completed navigations become nodes, linked to the tab's previous node
//! - Removed tabs close their nodes

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use navtrail_graph::{Edge, Node, NodeUpdate, TransitionType};
use navtrail_session::{ActivityOutcome, SessionError, SessionManager};

use crate::consistency::is_system_page;
use crate::idle::IdleTimer;
use crate::signal::ActivitySignal;
use crate::Result;

#[derive(Debug, Default)]
struct MonitorState {
    last_activity: Option<i64>,
    /// Last recorded node per tab, with the session it was recorded in
    tab_nodes: HashMap<i64, (String, String)>,
}

pub struct ActivityMonitor {
    manager: SessionManager,
    idle: IdleTimer,
    debounce: Duration,
    state: Mutex<MonitorState>,
}

impl ActivityMonitor {
    pub fn new(manager: SessionManager, idle: IdleTimer, debounce: Duration) -> Self {
        Self {
            manager,
            idle,
            debounce,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn idle_timer(&self) -> &IdleTimer {
        &self.idle
    }

    pub fn last_activity(&self) -> Option<i64> {
        self.state.lock().last_activity
    }

    /// Seed the last activity time from the latest session after a restart.
    pub fn restore_last_activity(&self) -> Option<i64> {
        let restored = self.manager.latest_session().map(|s| s.last_seen());
        if let Some(at) = restored {
            let mut state = self.state.lock();
            state.last_activity = Some(state.last_activity.map_or(at, |known| known.max(at)));
            tracing::debug!(last_activity = at, "Restored last activity");
        }
        restored
    }

    /// Feed one signal. Must be called from within a tokio runtime.
    pub fn handle(&self, signal: ActivitySignal) -> Result<()> {
        tracing::trace!(signal = signal.name(), tab_id = signal.tab_id(), "Activity signal");

        if signal.is_user_activity() {
            self.record_activity()?;
        }

        match signal {
            ActivitySignal::NavigationCompleted {
                tab_id,
                url,
                title,
                transition,
            } => {
                self.record_navigation(tab_id, url, title, transition)?;
            }
            ActivitySignal::TabUpdated {
                tab_id,
                title,
                favicon_url,
                ..
            } => {
                self.update_tab(tab_id, title, favicon_url)?;
            }
            ActivitySignal::TabRemoved { tab_id } => {
                self.state.lock().tab_nodes.remove(&tab_id);
                self.manager.handle_tab_closed(tab_id)?;
            }
            ActivitySignal::TabCreated { .. } | ActivitySignal::TabActivated { .. } => {}
        }

        Ok(())
    }

    /// Mark activity now. Returns `None` when the mark was debounced.
    pub fn record_activity(&self) -> Result<Option<ActivityOutcome>> {
        let now = self.manager.now_ms();
        let prev = {
            let mut state = self.state.lock();
            let prev = state.last_activity;
            if let Some(last) = prev {
                if now.saturating_sub(last) < self.debounce.as_millis() as i64 {
                    return Ok(None);
                }
            }
            state.last_activity = Some(now);
            prev
        };

        self.idle.reset();
        let outcome = self.manager.mark_session_activity(now, prev)?;
        if let ActivityOutcome::Rotated { ended, created } = &outcome {
            tracing::info!(ended = ?ended, created = %created.id, "Activity opened a new session");
        }
        Ok(Some(outcome))
    }

    fn record_navigation(
        &self,
        tab_id: i64,
        url: String,
        title: Option<String>,
        transition: Option<TransitionType>,
    ) -> Result<()> {
        if is_system_page(&url) {
            return Ok(());
        }
        let Some(session_id) = self.manager.latest_session_id() else {
            tracing::warn!(tab_id, "Navigation dropped: no session is recording");
            return Ok(());
        };

        let now = self.manager.now_ms();
        let parent = self
            .state
            .lock()
            .tab_nodes
            .get(&tab_id)
            .filter(|(session, _)| *session == session_id)
            .map(|(_, node)| node.clone());

        let mut node = Node::new(url, tab_id, session_id.as_str(), now)
            .with_type(transition.unwrap_or_default());
        if let Some(title) = title {
            node = node.with_title(title);
        }
        if let Some(parent) = &parent {
            node = node.with_parent(parent.as_str());
        }

        let node = match self.manager.record_node(node) {
            Ok(node) => node,
            Err(SessionError::NoLatestSession) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = parent {
            self.manager.record_edge(Edge::new(
                parent,
                node.id.as_str(),
                node.session_id.as_str(),
                now,
                node.node_type,
            ))?;
        }

        self.state
            .lock()
            .tab_nodes
            .insert(tab_id, (node.session_id.clone(), node.id.clone()));
        Ok(())
    }

    fn update_tab(
        &self,
        tab_id: i64,
        title: Option<String>,
        favicon_url: Option<String>,
    ) -> Result<()> {
        if title.is_none() && favicon_url.is_none() {
            return Ok(());
        }
        let Some((_, node_id)) = self.state.lock().tab_nodes.get(&tab_id).cloned() else {
            return Ok(());
        };

        let update = NodeUpdate {
            title,
            favicon_url,
            ..NodeUpdate::default()
        };
        self.manager.graph().update_node(&node_id, &update)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtrail_graph::{graph_schema, EdgeFilter, GraphStore, NodeFilter};
    use navtrail_session::{
        ActivityStrategy, CreateSessionOptions, DayZone, ManagerConfig, ManualClock,
        ManualStrategy, SessionStrategy,
    };
    use navtrail_storage::ObjectStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const DEBOUNCE: Duration = Duration::from_secs(2);

    fn monitor_with(clock: &ManualClock, strategy: Arc<dyn SessionStrategy>) -> ActivityMonitor {
        let graph = GraphStore::new(
            ObjectStore::open_in_memory(graph_schema("navtrail-test", 1)).unwrap(),
        );
        let manager = SessionManager::new(
            graph,
            Arc::new(clock.clone()),
            strategy,
            ManagerConfig::default(),
        );
        let idle = IdleTimer::new(manager.clone(), Duration::from_secs(600));
        ActivityMonitor::new(manager, idle, DEBOUNCE)
    }

    fn monitor(clock: &ManualClock) -> ActivityMonitor {
        monitor_with(clock, Arc::new(ManualStrategy::new()))
    }

    fn navigate(tab_id: i64, url: &str) -> ActivitySignal {
        ActivitySignal::NavigationCompleted {
            tab_id,
            url: url.into(),
            title: None,
            transition: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_activity_opens_session() {
        let clock = ManualClock::new(10_000);
        let monitor = monitor(&clock);

        let outcome = monitor.record_activity().unwrap();
        assert!(matches!(outcome, Some(ActivityOutcome::Rotated { ended: None, .. })));
        assert!(monitor.manager.latest_session_id().is_some());
        assert!(monitor.idle_timer().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeats_inside_debounce_window_are_dropped() {
        let clock = ManualClock::new(10_000);
        let monitor = monitor(&clock);
        monitor.record_activity().unwrap();

        clock.advance(1_999);
        assert_eq!(monitor.record_activity().unwrap(), None);
        assert_eq!(monitor.last_activity(), Some(10_000));

        clock.advance(1);
        assert!(matches!(
            monitor.record_activity().unwrap(),
            Some(ActivityOutcome::Continued { .. })
        ));
        assert_eq!(monitor.last_activity(), Some(12_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_uses_previous_activity() {
        let clock = ManualClock::new(0);
        let strategy = Arc::new(
            ActivityStrategy::new(Duration::from_secs(60)).with_zone(DayZone::utc()),
        );
        let monitor = monitor_with(&clock, strategy);
        monitor.record_activity().unwrap();
        let first = monitor.manager.latest_session_id();

        clock.advance(30_000);
        monitor.record_activity().unwrap();
        assert_eq!(monitor.manager.latest_session_id(), first);

        clock.advance(61_000);
        let outcome = monitor.record_activity().unwrap();
        assert!(matches!(outcome, Some(ActivityOutcome::Rotated { .. })));
        assert_ne!(monitor.manager.latest_session_id(), first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigations_build_tab_chain() {
        let clock = ManualClock::new(0);
        let monitor = monitor(&clock);

        monitor.handle(navigate(1, "https://a.test/")).unwrap();
        clock.advance(5_000);
        monitor.handle(navigate(1, "https://b.test/")).unwrap();
        clock.advance(5_000);
        monitor.handle(navigate(2, "https://c.test/")).unwrap();
        monitor.handle(navigate(2, "chrome://newtab/")).unwrap();

        let session_id = monitor.manager.latest_session_id().unwrap();
        let graph = monitor.manager.graph();
        let nodes = graph.query_nodes(&NodeFilter::for_session(&session_id)).unwrap();
        let urls: Vec<&str> = nodes.iter().map(|n| n.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/", "https://b.test/", "https://c.test/"]);

        assert_eq!(nodes[1].parent_id.as_deref(), Some(nodes[0].id.as_str()));
        assert_eq!(nodes[2].parent_id, None);

        let edges = graph.query_edges(&EdgeFilter::for_session(&session_id)).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, nodes[0].id);
        assert_eq!(edges[0].target, nodes[1].id);

        let session = monitor.manager.latest_session().unwrap();
        assert_eq!(session.node_count, 3);
        assert_eq!(session.tab_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tab_update_and_removal() {
        let clock = ManualClock::new(0);
        let monitor = monitor(&clock);
        monitor.handle(navigate(5, "https://a.test/")).unwrap();

        monitor
            .handle(ActivitySignal::TabUpdated {
                tab_id: 5,
                url: None,
                title: Some("Page A".into()),
                favicon_url: None,
            })
            .unwrap();

        clock.advance(9_000);
        monitor.handle(ActivitySignal::TabRemoved { tab_id: 5 }).unwrap();

        let session_id = monitor.manager.latest_session_id().unwrap();
        let nodes = monitor
            .manager
            .graph()
            .query_nodes(&NodeFilter::for_session(&session_id))
            .unwrap();
        assert_eq!(nodes[0].title, "Page A");
        assert!(nodes[0].is_closed);
        assert_eq!(nodes[0].close_time, Some(9_000));
        // Removal is not user activity
        assert_eq!(monitor.last_activity(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_last_activity_from_latest_session() {
        let clock = ManualClock::new(50_000);
        let monitor = monitor(&clock);
        assert_eq!(monitor.restore_last_activity(), None);

        monitor
            .manager
            .create_session(CreateSessionOptions::default())
            .unwrap();
        assert_eq!(monitor.restore_last_activity(), Some(50_000));
        assert_eq!(monitor.last_activity(), Some(50_000));

        clock.advance(1_000);
        assert_eq!(monitor.record_activity().unwrap(), None);
    }
}
