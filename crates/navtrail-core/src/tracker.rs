//! Tracker composition root
//!
//! Builds every component once, wires them together and owns the background
//! tasks. Nothing in the crates below holds global state.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

use navtrail_activity::{ActivityMonitor, ActivitySignal, ConsistencyChecker, IdleTimer, TabProvider};
use navtrail_graph::{graph_schema, GraphStore};
use navtrail_session::{
    strategy_for, Clock, DayZone, ManagerConfig, SessionManager, SettingsService, SystemClock,
};
use navtrail_storage::{ObjectStore, StoreRegistry};

use crate::config::Config;
use crate::Result;

pub struct Tracker {
    config: Config,
    registry: StoreRegistry,
    graph: GraphStore,
    settings: Arc<SettingsService>,
    manager: SessionManager,
    monitor: Arc<ActivityMonitor>,
    checker: Arc<ConsistencyChecker>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Tracker {
    /// Open the tracker on the configured database file.
    pub fn new(config: Config, provider: Arc<dyn TabProvider>) -> Result<Self> {
        config.validate()?;
        let registry = StoreRegistry::new();
        let store = registry.open(
            &config.database_path,
            graph_schema(&config.store_name, config.store_version),
        )?;
        tracing::info!(path = %config.database_path.display(), "Opened tracker database");
        Self::assemble(config, registry, store, Arc::new(SystemClock), provider)
    }

    /// In-memory tracker with an injected clock.
    pub fn open_in_memory(
        config: Config,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn TabProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = StoreRegistry::new();
        let store =
            registry.open_in_memory(graph_schema(&config.store_name, config.store_version))?;
        Self::assemble(config, registry, store, clock, provider)
    }

    fn assemble(
        config: Config,
        registry: StoreRegistry,
        store: ObjectStore,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn TabProvider>,
    ) -> Result<Self> {
        let graph = GraphStore::new(store.clone());
        let settings = Arc::new(SettingsService::load(store, config.default_settings)?);
        let current = settings.get();

        let day_zone = DayZone::Local;
        let manager = SessionManager::new(
            graph.clone(),
            clock,
            strategy_for(current.session_mode, current.idle_timeout_duration(), day_zone),
            ManagerConfig {
                cooldown: config.cooldown(),
                day_zone,
            },
        );

        let idle = IdleTimer::new(manager.clone(), current.idle_timeout_duration());
        let monitor = Arc::new(ActivityMonitor::new(manager.clone(), idle, config.debounce()));
        let checker = Arc::new(ConsistencyChecker::new(
            manager.clone(),
            provider,
            config.consistency_interval(),
        ));

        Ok(Self {
            config,
            registry,
            graph,
            settings,
            manager,
            monitor,
            checker,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Restore session pointers and the last activity time.
    pub fn initialize(&self) -> Result<()> {
        self.manager.initialize()?;
        self.monitor.restore_last_activity();
        tracing::info!(stores = self.registry.len(), "Tracker initialized");
        Ok(())
    }

    /// Spawn the consistency loop and the settings listener.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        tasks.push(Arc::clone(&self.checker).spawn());

        let mut changes = self.settings.subscribe();
        let manager = self.manager.clone();
        let monitor = Arc::clone(&self.monitor);
        tasks.push(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let settings = *changes.borrow_and_update();
                manager.apply_settings(&settings);
                monitor
                    .idle_timer()
                    .set_timeout(settings.idle_timeout_duration());
            }
        }));

        tracing::info!(
            consistency_interval_secs = self.config.consistency_interval_secs,
            "Tracker started"
        );
    }

    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.monitor.idle_timer().cancel();
        tracing::info!("Tracker stopped");
    }

    /// Feed one browser signal; failures are logged, not returned.
    pub fn handle_signal(&self, signal: ActivitySignal) {
        let name = signal.name();
        if let Err(e) = self.monitor.handle(signal) {
            tracing::warn!(signal = name, error = %e, "Activity signal failed");
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn activity_monitor(&self) -> &ActivityMonitor {
        &self.monitor
    }

    pub fn consistency_checker(&self) -> &ConsistencyChecker {
        &self.checker
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        self.monitor.idle_timer().cancel();
    }
}
