//! Session Manager
//!
//! Owns the latest/current session pointers and every session state change:
//! `Created -> Active(latest) -> [Viewed(current)] -> Ended -> [Deleted]`.
//!
//! Mutations on unknown ids fail with `NotFound`. Read paths polled by the UI
//! (`current_session`, `latest_session`, `session_stats`) degrade to empty
//! values instead of failing.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use navtrail_graph::{
    ClearStats, Edge, GraphStore, Node, NodeFilter, NodeUpdate, Session, SessionDetails,
    SessionGraph, SessionUpdate,
};

use crate::clock::Clock;
use crate::error::SessionError;
use crate::settings::{read_setting, write_setting, TrackerSettings};
use crate::strategy::{strategy_for, DayZone, SessionStrategy};
use crate::Result;

const CURRENT_SESSION_KEY: &str = "currentSessionId";
const LATEST_SESSION_KEY: &str = "latestSessionId";

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Minimum spacing between two session creations
    pub cooldown: Duration,
    /// Timezone used by day-based strategies
    pub day_zone: DayZone,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            day_zone: DayZone::Local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    /// Make the new session the latest (recording) session
    pub make_active: bool,
    /// Also point the UI at the new session
    pub update_current: bool,
    pub skip_cooldown: bool,
}

impl Default for CreateSessionOptions {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            metadata: None,
            make_active: true,
            update_current: true,
            skip_cooldown: false,
        }
    }
}

/// What an activity mark did to the session pointers.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityOutcome {
    /// Activity recorded on the existing latest session
    Continued { session_id: String },
    /// A boundary was crossed: `ended` closed and `created` opened
    Rotated {
        ended: Option<String>,
        created: Session,
    },
    /// A new session was due but creation is locked or cooling down
    Deferred,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub current_session_id: Option<String>,
    pub latest_session_id: Option<String>,
}

#[derive(Debug, Default)]
struct Pointers {
    current: Option<String>,
    latest: Option<String>,
    initialized: bool,
}

/// Releases the creation lock when dropped, including on early return.
struct CreationGuard<'a>(&'a AtomicBool);

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionManager {
    graph: GraphStore,
    clock: Arc<dyn Clock>,
    config: ManagerConfig,
    strategy: Arc<RwLock<Arc<dyn SessionStrategy>>>,
    pointers: Arc<RwLock<Pointers>>,
    creating: Arc<AtomicBool>,
    last_created_at: Arc<Mutex<Option<i64>>>,
}

impl SessionManager {
    pub fn new(
        graph: GraphStore,
        clock: Arc<dyn Clock>,
        strategy: Arc<dyn SessionStrategy>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            graph,
            clock,
            config,
            strategy: Arc::new(RwLock::new(strategy)),
            pointers: Arc::new(RwLock::new(Pointers::default())),
            creating: Arc::new(AtomicBool::new(false)),
            last_created_at: Arc::new(Mutex::new(None)),
        }
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn is_initialized(&self) -> bool {
        self.pointers.read().initialized
    }

    // === Strategy ===

    pub fn strategy(&self) -> Arc<dyn SessionStrategy> {
        Arc::clone(&self.strategy.read())
    }

    pub fn set_strategy(&self, strategy: Arc<dyn SessionStrategy>) {
        tracing::info!(mode = %strategy.mode(), "Session strategy selected");
        *self.strategy.write() = strategy;
    }

    /// Re-select the strategy after a settings change.
    pub fn apply_settings(&self, settings: &TrackerSettings) {
        self.set_strategy(strategy_for(
            settings.session_mode,
            settings.idle_timeout_duration(),
            self.config.day_zone,
        ));
    }

    // === Startup ===

    /// Restore pointers from storage and repair them against stored sessions.
    pub fn initialize(&self) -> Result<()> {
        let store = self.graph.object_store();
        let mut current: Option<String> = read_setting(store, CURRENT_SESSION_KEY)?;
        let mut latest: Option<String> = read_setting(store, LATEST_SESSION_KEY)?;

        if let Some(id) = current.clone() {
            if !self.graph.session_exists(&id)? {
                tracing::warn!(session_id = %id, "Dropping pointer to missing current session");
                current = None;
            }
        }

        if let Some(id) = latest.clone() {
            match self.graph.get_session(&id)? {
                Some(session) if session.is_active && !session.is_ended() => {}
                _ => {
                    tracing::warn!(session_id = %id, "Dropping pointer to closed latest session");
                    latest = None;
                }
            }
        }

        let active = self.graph.active_sessions()?;

        // Adopt the newest open session when the pointer was lost
        if latest.is_none() {
            latest = active.iter().find(|s| !s.is_ended()).map(|s| s.id.clone());
        }

        // Only one session may stay open for recording
        let now = self.now_ms();
        for mut extra in active
            .into_iter()
            .filter(|s| Some(&s.id) != latest.as_ref())
        {
            extra.end(now);
            self.graph.save_session(&extra)?;
            tracing::warn!(session_id = %extra.id, "Ended stray active session");
        }

        if current.is_none() {
            current = latest.clone();
        }

        {
            let mut pointers = self.pointers.write();
            pointers.current = current;
            pointers.latest = latest;
            pointers.initialized = true;
        }
        self.persist_pointers()?;

        let (current, latest) = self.pointer_ids();
        tracing::info!(
            current = ?current,
            latest = ?latest,
            mode = %self.strategy().mode(),
            "Session manager initialized"
        );

        if latest.is_some() {
            self.check_day_transition()?;
        }

        Ok(())
    }

    // === Pointers ===

    pub fn current_session_id(&self) -> Option<String> {
        self.pointers.read().current.clone()
    }

    pub fn latest_session_id(&self) -> Option<String> {
        self.pointers.read().latest.clone()
    }

    fn pointer_ids(&self) -> (Option<String>, Option<String>) {
        let pointers = self.pointers.read();
        (pointers.current.clone(), pointers.latest.clone())
    }

    fn persist_pointers(&self) -> Result<()> {
        let (current, latest) = self.pointer_ids();
        let store = self.graph.object_store();
        write_setting(store, CURRENT_SESSION_KEY, &current)?;
        write_setting(store, LATEST_SESSION_KEY, &latest)?;
        Ok(())
    }

    pub fn set_current_session(&self, session_id: Option<&str>) -> Result<Option<Session>> {
        let session = match session_id {
            Some(id) => Some(self.require_session(id)?),
            None => None,
        };

        self.pointers.write().current = session.as_ref().map(|s| s.id.clone());
        self.persist_pointers()?;

        tracing::info!(session_id = ?session_id, "Current session changed");
        Ok(session)
    }

    /// Point recording at `session_id`, deactivating the previous latest.
    /// An ended session is reopened.
    pub fn set_latest_session(&self, session_id: Option<&str>) -> Result<Option<Session>> {
        let target = match session_id {
            Some(id) => Some(self.require_session(id)?),
            None => None,
        };

        let previous = self.latest_session_id();
        if let Some(prev_id) = previous.as_deref() {
            if Some(prev_id) != session_id {
                self.deactivate(prev_id)?;
            }
        }

        let target = match target {
            Some(mut session) => {
                if !session.is_active || session.is_ended() {
                    tracing::info!(session_id = %session.id, "Reopening session for recording");
                    session.is_active = true;
                    session.end_time = None;
                    session.touch(self.now_ms());
                    self.graph.save_session(&session)?;
                }
                Some(session)
            }
            None => None,
        };

        self.pointers.write().latest = target.as_ref().map(|s| s.id.clone());
        self.persist_pointers()?;

        tracing::info!(previous = ?previous, latest = ?session_id, "Latest session changed");
        Ok(target)
    }

    pub fn sync_current_to_latest(&self) -> Result<Option<Session>> {
        let latest = self.latest_session_id();
        self.set_current_session(latest.as_deref())
    }

    pub fn sync_latest_to_current(&self) -> Result<Option<Session>> {
        let current = self.current_session_id();
        self.set_latest_session(current.as_deref())
    }

    // === Reads ===

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.graph.get_session(session_id)?)
    }

    pub fn sessions(&self) -> Result<Vec<Session>> {
        Ok(self.graph.get_sessions()?)
    }

    pub fn current_session(&self) -> Option<Session> {
        let id = self.current_session_id()?;
        self.load_degraded(&id)
    }

    pub fn latest_session(&self) -> Option<Session> {
        let id = self.latest_session_id()?;
        self.load_degraded(&id)
    }

    fn load_degraded(&self, id: &str) -> Option<Session> {
        match self.graph.get_session(id) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Session lookup failed");
                None
            }
        }
    }

    fn load_latest(&self) -> Result<Option<Session>> {
        match self.latest_session_id() {
            Some(id) => Ok(self.graph.get_session(&id)?),
            None => Ok(None),
        }
    }

    fn require_session(&self, session_id: &str) -> Result<Session> {
        self.graph
            .get_session(session_id)?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn session_details(&self, session_id: &str) -> Result<Option<SessionDetails>> {
        Ok(self.graph.get_session_details(session_id)?)
    }

    pub fn session_graph(&self, session_id: &str) -> Result<SessionGraph> {
        Ok(self.graph.get_session_graph(session_id)?)
    }

    pub fn session_stats(&self) -> SessionStats {
        let (current, latest) = self.pointer_ids();
        let mut stats = SessionStats {
            current_session_id: current,
            latest_session_id: latest,
            ..SessionStats::default()
        };

        match self.graph.counts() {
            Ok(counts) => {
                stats.total_sessions = counts.sessions;
                stats.total_nodes = counts.nodes;
                stats.total_edges = counts.edges;
            }
            Err(e) => tracing::warn!(error = %e, "Could not count graph records"),
        }
        match self.graph.active_sessions() {
            Ok(active) => stats.active_sessions = active.len(),
            Err(e) => tracing::warn!(error = %e, "Could not list active sessions"),
        }

        stats
    }

    // === Lifecycle ===

    fn try_lock_creation(&self) -> Result<CreationGuard<'_>> {
        self.creating
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| SessionError::Busy)?;
        Ok(CreationGuard(&self.creating))
    }

    pub fn create_session(&self, options: CreateSessionOptions) -> Result<Session> {
        let _guard = self.try_lock_creation()?;
        let now = self.now_ms();

        if !options.skip_cooldown {
            if let Some(last) = *self.last_created_at.lock() {
                let cooldown = i64::try_from(self.config.cooldown.as_millis()).unwrap_or(i64::MAX);
                let elapsed = now.saturating_sub(last).max(0);
                if elapsed < cooldown {
                    let remaining_ms = cooldown - elapsed;
                    tracing::debug!(remaining_ms, "Session creation refused during cooldown");
                    return Err(SessionError::Cooldown { remaining_ms });
                }
            }
        }

        let template = self.strategy().create_session(now);
        let mut session = Session::new(options.title.unwrap_or(template.title), now);
        session.description = options.description.unwrap_or(template.description);
        session.metadata = template.metadata;
        if let Some(metadata) = options.metadata {
            session.metadata.extend(metadata);
        }
        session.is_active = options.make_active;

        self.graph.save_session(&session)?;
        *self.last_created_at.lock() = Some(now);

        if options.make_active {
            if let Some(previous) = self.latest_session_id() {
                self.deactivate(&previous)?;
            }
            self.pointers.write().latest = Some(session.id.clone());
        }
        if options.update_current {
            self.pointers.write().current = Some(session.id.clone());
        }
        if options.make_active || options.update_current {
            self.persist_pointers()?;
        }

        tracing::info!(
            session_id = %session.id,
            title = %session.title,
            latest = options.make_active,
            current = options.update_current,
            "Created session"
        );

        Ok(session)
    }

    /// Clear `is_active` without ending the session.
    fn deactivate(&self, session_id: &str) -> Result<()> {
        if let Some(mut session) = self.graph.get_session(session_id)? {
            if session.is_active {
                session.is_active = false;
                self.graph.save_session(&session)?;
                tracing::debug!(session_id = %session_id, "Deactivated session");
            }
        }
        Ok(())
    }

    /// End a session. Ending an already-ended session changes nothing.
    pub fn end_session(&self, session_id: &str) -> Result<Session> {
        let mut session = self.require_session(session_id)?;

        if session.end(self.now_ms()) {
            self.graph.save_session(&session)?;
            tracing::info!(session_id = %session_id, "Ended session");
        }

        let was_latest = {
            let mut pointers = self.pointers.write();
            if pointers.latest.as_deref() == Some(session_id) {
                pointers.latest = None;
                true
            } else {
                false
            }
        };
        if was_latest {
            self.persist_pointers()?;
        }

        Ok(session)
    }

    pub fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Result<Session> {
        let session = self.graph.update_session(session_id, update)?;
        tracing::debug!(session_id = %session_id, "Updated session");
        Ok(session)
    }

    /// Delete a session with all its nodes and edges.
    pub fn delete_session(&self, session_id: &str) -> Result<ClearStats> {
        self.require_session(session_id)?;

        let mut stats = self.graph.clear_session_data(session_id)?;
        if self.graph.delete_session(session_id)? {
            stats.sessions = 1;
        }

        let touched = {
            let mut pointers = self.pointers.write();
            let mut touched = false;
            if pointers.current.as_deref() == Some(session_id) {
                pointers.current = None;
                touched = true;
            }
            if pointers.latest.as_deref() == Some(session_id) {
                pointers.latest = None;
                touched = true;
            }
            touched
        };
        if touched {
            self.persist_pointers()?;
        }

        tracing::info!(
            session_id = %session_id,
            nodes = stats.nodes,
            edges = stats.edges,
            "Deleted session"
        );
        Ok(stats)
    }

    // === Boundaries ===

    /// Feed activity at `now`. `prev_activity` is the previous activity time
    /// known to the caller, if any.
    pub fn mark_session_activity(
        &self,
        now: i64,
        prev_activity: Option<i64>,
    ) -> Result<ActivityOutcome> {
        let latest = self.load_latest()?;
        let strategy = self.strategy();

        if strategy.should_create_new_session(prev_activity, now, latest.as_ref()) {
            return self.rotate(latest);
        }

        match latest {
            Some(mut session) => {
                session.touch(now);
                self.graph.save_session(&session)?;
                Ok(ActivityOutcome::Continued {
                    session_id: session.id,
                })
            }
            // The strategy declined, but nothing is open to record into
            None => self.rotate(None),
        }
    }

    /// Rotate the latest session if the strategy says its time is up.
    pub fn check_day_transition(&self) -> Result<bool> {
        let Some(latest) = self.load_latest()? else {
            return Ok(false);
        };

        let now = self.now_ms();
        if !self
            .strategy()
            .should_create_new_session(Some(latest.last_seen()), now, Some(&latest))
        {
            return Ok(false);
        }

        tracing::info!(session_id = %latest.id, "Session boundary crossed");
        Ok(matches!(
            self.rotate(Some(latest))?,
            ActivityOutcome::Rotated { .. }
        ))
    }

    /// Replace the latest session with a fresh one. The current pointer
    /// follows only if it was on the latest session.
    fn rotate(&self, latest: Option<Session>) -> Result<ActivityOutcome> {
        let (current, latest_id) = self.pointer_ids();
        let follow = current == latest_id;

        let created = match self.create_session(CreateSessionOptions {
            update_current: follow,
            ..CreateSessionOptions::default()
        }) {
            Ok(session) => session,
            Err(e) if e.is_throttled() => {
                tracing::debug!(error = %e, "Session rotation deferred");
                return Ok(ActivityOutcome::Deferred);
            }
            Err(e) => return Err(e),
        };

        let ended = match latest {
            Some(old) => {
                self.end_session(&old.id)?;
                Some(old.id)
            }
            None => None,
        };

        tracing::info!(
            ended = ?ended,
            created = %created.id,
            current_followed = follow,
            "Rotated session"
        );
        Ok(ActivityOutcome::Rotated { ended, created })
    }

    /// Idle timeout fired. Ends the latest session when the strategy wants it.
    pub fn handle_user_idle(&self) -> Result<Option<String>> {
        if !self.strategy().ends_on_idle() {
            return Ok(None);
        }
        let Some(latest) = self.latest_session_id() else {
            return Ok(None);
        };

        self.end_session(&latest)?;
        tracing::info!(session_id = %latest, "Ended session after idle timeout");
        Ok(Some(latest))
    }

    /// Mark the latest session's nodes on `tab_id` as closed.
    pub fn handle_tab_closed(&self, tab_id: i64) -> Result<usize> {
        let Some(latest) = self.latest_session_id() else {
            return Ok(0);
        };
        let now = self.now_ms();

        let open = self.graph.query_nodes(&NodeFilter {
            session_id: Some(latest.clone()),
            tab_id: Some(tab_id),
            is_closed: Some(false),
            ..NodeFilter::default()
        })?;

        for node in &open {
            self.graph.update_node(&node.id, &NodeUpdate::closed(now))?;
        }

        tracing::debug!(tab_id, session_id = %latest, closed = open.len(), "Tab closed");
        Ok(open.len())
    }

    // === Recording ===

    /// Store a navigation in the latest session and update its counters.
    pub fn record_node(&self, mut node: Node) -> Result<Node> {
        let mut session = self.load_latest()?.ok_or(SessionError::NoLatestSession)?;
        node.session_id = session.id.clone();

        let known_tab = !self
            .graph
            .query_nodes(&NodeFilter {
                session_id: Some(session.id.clone()),
                tab_id: Some(node.tab_id),
                limit: Some(1),
                ..NodeFilter::default()
            })?
            .is_empty();

        self.graph.save_node(&node)?;

        session.node_count += 1;
        if !known_tab {
            session.tab_count += 1;
        }
        session.touch(node.timestamp);
        self.graph.save_session(&session)?;

        Ok(node)
    }

    pub fn record_edge(&self, mut edge: Edge) -> Result<Edge> {
        let session_id = self.latest_session_id().ok_or(SessionError::NoLatestSession)?;
        edge.session_id = session_id;
        self.graph.save_edge(&edge)?;
        Ok(edge)
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            strategy: Arc::clone(&self.strategy),
            pointers: Arc::clone(&self.pointers),
            creating: Arc::clone(&self.creating),
            last_created_at: Arc::clone(&self.last_created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::strategy::{ActivityStrategy, DailyStrategy, ManualStrategy};
    use chrono::{TimeZone, Utc};
    use navtrail_graph::{graph_schema, TransitionType};
    use navtrail_storage::ObjectStore;
    use pretty_assertions::assert_eq;

    const MINUTE: i64 = 60_000;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    fn graph() -> GraphStore {
        GraphStore::new(ObjectStore::open_in_memory(graph_schema("navtrail-test", 1)).unwrap())
    }

    fn manager_with(
        graph: GraphStore,
        clock: &ManualClock,
        strategy: Arc<dyn SessionStrategy>,
    ) -> SessionManager {
        let config = ManagerConfig {
            day_zone: DayZone::utc(),
            ..ManagerConfig::default()
        };
        SessionManager::new(graph, Arc::new(clock.clone()), strategy, config)
    }

    fn manager(clock: &ManualClock) -> SessionManager {
        manager_with(graph(), clock, Arc::new(ManualStrategy::new()))
    }

    fn skip() -> CreateSessionOptions {
        CreateSessionOptions {
            skip_cooldown: true,
            ..CreateSessionOptions::default()
        }
    }

    #[test]
    fn test_create_session_moves_both_pointers() {
        let clock = ManualClock::new(1_000);
        let manager = manager(&clock);
        manager.initialize().unwrap();

        let session = manager.create_session(CreateSessionOptions::default()).unwrap();
        assert!(session.is_active);
        assert_eq!(manager.latest_session_id(), Some(session.id.clone()));
        assert_eq!(manager.current_session_id(), Some(session.id.clone()));
        assert_eq!(manager.current_session().unwrap().id, session.id);
    }

    #[test]
    fn test_only_one_latest_session() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);

        let mut ids = Vec::new();
        for _ in 0..4 {
            clock.advance(20_000);
            ids.push(manager.create_session(CreateSessionOptions::default()).unwrap().id);

            let active: Vec<String> = manager
                .graph()
                .active_sessions()
                .unwrap()
                .into_iter()
                .map(|s| s.id)
                .collect();
            assert_eq!(active, vec![ids.last().unwrap().clone()]);
        }
    }

    #[test]
    fn test_create_without_activation_keeps_pointers() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);
        let first = manager.create_session(skip()).unwrap();

        let side = manager
            .create_session(CreateSessionOptions {
                make_active: false,
                update_current: false,
                skip_cooldown: true,
                ..CreateSessionOptions::default()
            })
            .unwrap();

        assert_ne!(side.id, first.id);
        assert!(!side.is_active);
        assert_eq!(manager.latest_session_id(), Some(first.id.clone()));
        assert_eq!(manager.current_session_id(), Some(first.id));
    }

    #[test]
    fn test_cooldown_reports_remaining_time() {
        let clock = ManualClock::new(50_000);
        let manager = manager(&clock);
        manager.create_session(CreateSessionOptions::default()).unwrap();

        clock.advance(3_500);
        let err = manager
            .create_session(CreateSessionOptions::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::Cooldown { remaining_ms: 6_500 }));

        // Cooldown refusal must release the lock
        assert!(manager.create_session(skip()).is_ok());

        clock.advance(10_000);
        assert!(manager.create_session(CreateSessionOptions::default()).is_ok());
    }

    #[test]
    fn test_concurrent_creation_is_rejected() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);

        let guard = manager.try_lock_creation().unwrap();
        assert!(matches!(
            manager.create_session(skip()),
            Err(SessionError::Busy)
        ));
        drop(guard);
        assert!(manager.create_session(skip()).is_ok());
    }

    #[test]
    fn test_end_session_is_idempotent() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);
        let session = manager.create_session(skip()).unwrap();

        clock.set(5_000);
        let first = manager.end_session(&session.id).unwrap();
        clock.set(9_000);
        let second = manager.end_session(&session.id).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.end_time, Some(5_000));
        assert!(!second.is_active);
        assert_eq!(manager.latest_session_id(), None);
        // The UI keeps looking at it
        assert_eq!(manager.current_session_id(), Some(session.id));
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);

        assert!(matches!(manager.end_session("nope"), Err(SessionError::NotFound(_))));
        assert!(matches!(
            manager.set_current_session(Some("nope")),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            manager.update_session("nope", &SessionUpdate::default()),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(manager.delete_session("nope"), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_set_latest_deactivates_previous_and_reopens_target() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);
        let old = manager.create_session(skip()).unwrap();
        manager.end_session(&old.id).unwrap();
        let new = manager.create_session(skip()).unwrap();

        let reopened = manager.set_latest_session(Some(&old.id)).unwrap().unwrap();
        assert!(reopened.is_active);
        assert!(reopened.end_time.is_none());

        let new = manager.get_session(&new.id).unwrap().unwrap();
        assert!(!new.is_active);
        assert_eq!(manager.latest_session_id(), Some(old.id.clone()));

        manager.sync_current_to_latest().unwrap();
        assert_eq!(manager.current_session_id(), Some(old.id));

        manager.set_latest_session(None).unwrap();
        assert!(manager.latest_session().is_none());
    }

    #[test]
    fn test_sync_latest_to_current() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);
        let a = manager.create_session(skip()).unwrap();
        let b = manager.create_session(skip()).unwrap();
        manager.set_current_session(Some(&a.id)).unwrap();

        manager.sync_latest_to_current().unwrap();
        assert_eq!(manager.latest_session_id(), Some(a.id));
        assert!(!manager.get_session(&b.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_pointers_survive_restart() {
        let clock = ManualClock::new(0);
        let graph = graph();
        let manager = manager_with(graph.clone(), &clock, Arc::new(ManualStrategy::new()));
        manager.initialize().unwrap();
        let a = manager.create_session(skip()).unwrap();
        let b = manager.create_session(skip()).unwrap();
        manager.set_current_session(Some(&a.id)).unwrap();

        let restarted = manager_with(graph, &clock, Arc::new(ManualStrategy::new()));
        restarted.initialize().unwrap();
        assert!(restarted.is_initialized());
        assert_eq!(restarted.current_session_id(), Some(a.id));
        assert_eq!(restarted.latest_session_id(), Some(b.id));
    }

    #[test]
    fn test_initialize_adopts_open_session_and_drops_stale_pointers() {
        let clock = ManualClock::new(500);
        let graph = graph();
        let stray = Session::new("stray", 0);
        let open = Session::new("open", 100);
        graph.save_session(&stray).unwrap();
        graph.save_session(&open).unwrap();
        write_setting(graph.object_store(), CURRENT_SESSION_KEY, &Some("deleted")).unwrap();

        let manager = manager_with(graph.clone(), &clock, Arc::new(ManualStrategy::new()));
        manager.initialize().unwrap();
        assert_eq!(manager.latest_session_id(), Some(open.id.clone()));
        assert_eq!(manager.current_session_id(), Some(open.id.clone()));

        let stray = graph.get_session(&stray.id).unwrap().unwrap();
        assert_eq!(stray.end_time, Some(500));
        let active: Vec<String> = graph
            .active_sessions()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, vec![open.id]);
    }

    #[test]
    fn test_daily_no_new_session_across_midnight_without_idle_gap() {
        let clock = ManualClock::new(at(2026, 3, 9, 23, 58));
        let strategy = Arc::new(
            DailyStrategy::new(Duration::from_secs(30 * 60)).with_zone(DayZone::utc()),
        );
        let manager = manager_with(graph(), &clock, strategy);
        let session = manager.create_session(CreateSessionOptions::default()).unwrap();

        let now = at(2026, 3, 10, 0, 5);
        clock.set(now);
        let outcome = manager
            .mark_session_activity(now, Some(at(2026, 3, 9, 23, 58)))
            .unwrap();

        assert_eq!(
            outcome,
            ActivityOutcome::Continued {
                session_id: session.id.clone()
            }
        );
        assert_eq!(manager.latest_session().unwrap().last_activity, now);
    }

    #[test]
    fn test_daily_new_session_after_idle_gap_on_new_day() {
        let clock = ManualClock::new(at(2026, 3, 9, 23, 58));
        let strategy = Arc::new(
            DailyStrategy::new(Duration::from_secs(5 * 60)).with_zone(DayZone::utc()),
        );
        let manager = manager_with(graph(), &clock, strategy);
        let old = manager.create_session(CreateSessionOptions::default()).unwrap();

        let now = at(2026, 3, 10, 0, 5);
        clock.set(now);
        let outcome = manager
            .mark_session_activity(now, Some(at(2026, 3, 9, 23, 58)))
            .unwrap();

        let ActivityOutcome::Rotated { ended, created } = outcome else {
            panic!("expected rotation, got {outcome:?}");
        };
        assert_eq!(ended, Some(old.id.clone()));
        assert_eq!(manager.latest_session_id(), Some(created.id.clone()));
        // Current followed because it was on the ended session
        assert_eq!(manager.current_session_id(), Some(created.id));

        let old = manager.get_session(&old.id).unwrap().unwrap();
        assert_eq!(old.end_time, Some(now));
        assert!(!old.is_active);
    }

    #[test]
    fn test_rotation_leaves_current_when_viewing_another_session() {
        let clock = ManualClock::new(0);
        let strategy = Arc::new(
            ActivityStrategy::new(Duration::from_secs(10 * 60)).with_zone(DayZone::utc()),
        );
        let manager = manager_with(graph(), &clock, strategy);
        let archived = manager.create_session(skip()).unwrap();
        manager.end_session(&archived.id).unwrap();
        let live = manager.create_session(skip()).unwrap();
        manager.set_current_session(Some(&archived.id)).unwrap();

        clock.set(60 * MINUTE);
        let outcome = manager.mark_session_activity(60 * MINUTE, None).unwrap();
        let ActivityOutcome::Rotated { ended, created } = outcome else {
            panic!("expected rotation, got {outcome:?}");
        };
        assert_eq!(ended, Some(live.id));
        assert_eq!(manager.latest_session_id(), Some(created.id));
        assert_eq!(manager.current_session_id(), Some(archived.id));
    }

    #[test]
    fn test_rotation_is_deferred_during_cooldown() {
        let clock = ManualClock::new(0);
        let strategy = Arc::new(
            ActivityStrategy::new(Duration::from_secs(60)).with_zone(DayZone::utc()),
        );
        let manager = manager_with(graph(), &clock, strategy);
        let session = manager.create_session(CreateSessionOptions::default()).unwrap();
        manager.end_session(&session.id).unwrap();

        clock.set(2_000);
        let outcome = manager.mark_session_activity(2_000, Some(0)).unwrap();
        assert_eq!(outcome, ActivityOutcome::Deferred);
        assert!(manager.latest_session_id().is_none());

        clock.set(12_000);
        let outcome = manager.mark_session_activity(12_000, Some(2_000)).unwrap();
        assert!(matches!(outcome, ActivityOutcome::Rotated { ended: None, .. }));
    }

    #[test]
    fn test_check_day_transition_rotates_stale_session() {
        let clock = ManualClock::new(at(2026, 3, 9, 20, 0));
        let strategy = Arc::new(
            DailyStrategy::new(Duration::from_secs(30 * 60)).with_zone(DayZone::utc()),
        );
        let manager = manager_with(graph(), &clock, strategy);
        let yesterday = manager.create_session(CreateSessionOptions::default()).unwrap();

        clock.set(at(2026, 3, 9, 22, 0));
        assert!(!manager.check_day_transition().unwrap());

        clock.set(at(2026, 3, 10, 8, 0));
        assert!(manager.check_day_transition().unwrap());
        assert_ne!(manager.latest_session_id(), Some(yesterday.id));
    }

    #[test]
    fn test_idle_ends_latest_only_for_activity_mode() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);
        let session = manager.create_session(skip()).unwrap();
        assert_eq!(manager.handle_user_idle().unwrap(), None);

        manager.apply_settings(&TrackerSettings {
            session_mode: crate::strategy::SessionMode::Activity,
            idle_timeout: 0.5,
        });
        assert_eq!(manager.handle_user_idle().unwrap(), Some(session.id.clone()));
        assert!(manager.get_session(&session.id).unwrap().unwrap().is_ended());
        assert_eq!(manager.handle_user_idle().unwrap(), None);
    }

    #[test]
    fn test_record_and_close_tab() {
        let clock = ManualClock::new(100);
        let manager = manager(&clock);
        assert!(matches!(
            manager.record_node(Node::new("https://a.test", 1, "", 100)),
            Err(SessionError::NoLatestSession)
        ));

        let session = manager.create_session(skip()).unwrap();
        let a = manager
            .record_node(Node::new("https://a.test", 1, "", 110))
            .unwrap();
        let b = manager
            .record_node(Node::new("https://b.test", 1, "", 120))
            .unwrap();
        let c = manager
            .record_node(Node::new("https://c.test", 2, "", 130))
            .unwrap();
        manager
            .record_edge(Edge::new(&a.id, &b.id, "", 120, TransitionType::Link))
            .unwrap();

        let stored = manager.get_session(&session.id).unwrap().unwrap();
        assert_eq!(stored.node_count, 3);
        assert_eq!(stored.tab_count, 2);
        assert_eq!(stored.last_activity, 130);

        clock.set(500);
        assert_eq!(manager.handle_tab_closed(1).unwrap(), 2);
        assert_eq!(manager.handle_tab_closed(1).unwrap(), 0);

        let graph = manager.session_graph(&session.id).unwrap();
        let closed: Vec<&str> = graph
            .nodes
            .iter()
            .filter(|n| n.is_closed)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(closed.len(), 2);
        assert!(!closed.contains(&c.id.as_str()));
        assert!(graph.nodes.iter().all(|n| !n.is_closed || n.close_time == Some(500)));
    }

    #[test]
    fn test_delete_session_cascades_and_clears_pointers() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);
        let session = manager.create_session(skip()).unwrap();
        manager
            .record_node(Node::new("https://a.test", 1, "", 10))
            .unwrap();

        let stats = manager.delete_session(&session.id).unwrap();
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.sessions, 1);
        assert!(manager.session_details(&session.id).unwrap().is_none());
        assert!(manager
            .graph()
            .query_nodes(&NodeFilter::for_session(&session.id))
            .unwrap()
            .is_empty());
        assert_eq!(manager.current_session_id(), None);
        assert_eq!(manager.latest_session_id(), None);
    }

    #[test]
    fn test_session_stats() {
        let clock = ManualClock::new(0);
        let manager = manager(&clock);
        assert_eq!(manager.session_stats(), SessionStats::default());

        let session = manager.create_session(skip()).unwrap();
        manager
            .record_node(Node::new("https://a.test", 1, "", 10))
            .unwrap();

        let stats = manager.session_stats();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.total_nodes, 1);
        assert_eq!(stats.latest_session_id, Some(session.id));
    }
}
