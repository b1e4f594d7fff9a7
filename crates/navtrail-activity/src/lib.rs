//! NavTrail Activity
//!
//! Background feeds into the session manager: browser activity signals, the
//! idle timer, and the periodic tab consistency check.

mod consistency;
mod error;
mod idle;
mod monitor;
mod signal;

pub use consistency::{is_system_page, ConsistencyChecker, ConsistencyReport, LiveTab, TabProvider};
pub use error::ActivityError;
pub use idle::IdleTimer;
pub use monitor::ActivityMonitor;
pub use signal::ActivitySignal;

pub type Result<T> = std::result::Result<T, ActivityError>;
