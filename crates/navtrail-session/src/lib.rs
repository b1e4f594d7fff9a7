//! NavTrail Session Lifecycle
//!
//! Decides when browsing sessions start and end:
//! - The latest session receives new navigation records
//! - The current session is what the UI shows; it may differ from latest
//! - A pluggable strategy (daily, activity, manual) decides boundaries
//! - Creation is serialized by a non-queuing lock plus a cooldown

mod clock;
mod error;
mod manager;
mod settings;
mod strategy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use manager::{
    ActivityOutcome, CreateSessionOptions, ManagerConfig, SessionManager, SessionStats,
};
pub use settings::{SettingsService, SettingsUpdate, TrackerSettings};
pub use strategy::{
    strategy_for, ActivityStrategy, DailyStrategy, DayZone, ManualStrategy, SessionMode,
    SessionStrategy, SessionTemplate,
};

pub use navtrail_graph::Session;

pub type Result<T> = std::result::Result<T, SessionError>;
