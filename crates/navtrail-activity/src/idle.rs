//! Idle timer
//!
//! One pending tokio task at a time. Every reset bumps a generation counter
//! and aborts the previous task, so a stale task that already woke up sees
//! the new generation and does nothing.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use navtrail_session::SessionManager;

struct IdleState {
    timeout: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct IdleTimer {
    manager: SessionManager,
    state: Arc<Mutex<IdleState>>,
}

impl IdleTimer {
    pub fn new(manager: SessionManager, timeout: Duration) -> Self {
        Self {
            manager,
            state: Arc::new(Mutex::new(IdleState {
                timeout,
                generation: 0,
                handle: None,
            })),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    /// Restart the countdown. Must be called from within a tokio runtime.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }

        let generation = state.generation;
        let timeout = state.timeout;
        let timer = self.clone();
        state.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timer.fire(generation);
        }));
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
    }

    /// Change the timeout; a running countdown restarts with the new value.
    pub fn set_timeout(&self, timeout: Duration) {
        let armed = {
            let mut state = self.state.lock();
            state.timeout = timeout;
            state.handle.is_some()
        };
        tracing::debug!(timeout_secs = timeout.as_secs(), "Idle timeout changed");
        if armed {
            self.reset();
        }
    }

    fn fire(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.handle = None;
        }

        match self.manager.handle_user_idle() {
            Ok(Some(session_id)) => {
                tracing::info!(session_id = %session_id, "User went idle")
            }
            Ok(None) => tracing::debug!("User went idle"),
            Err(e) => tracing::error!(error = %e, "Idle handling failed"),
        }
    }
}
