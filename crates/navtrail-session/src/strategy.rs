//! Session boundary strategies
//!
//! One implementation per `SessionMode`, picked by `strategy_for`.

use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use navtrail_graph::Session;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// One session per calendar day, split after an idle gap across midnight
    #[default]
    Daily,
    /// Sessions only start when the user asks (or none is open)
    Manual,
    /// A new session after every idle gap
    Activity,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Daily => "daily",
            SessionMode::Manual => "manual",
            SessionMode::Activity => "activity",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(SessionMode::Daily),
            "manual" => Ok(SessionMode::Manual),
            "activity" => Ok(SessionMode::Activity),
            other => Err(SessionError::InvalidMode(other.to_string())),
        }
    }
}

/// Timezone used to decide calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DayZone {
    pub fn utc() -> Self {
        DayZone::Fixed(Utc.fix())
    }

    fn local_time(&self, ms: i64) -> Option<NaiveDateTime> {
        match self {
            DayZone::Local => Local
                .timestamp_millis_opt(ms)
                .single()
                .map(|t| t.naive_local()),
            DayZone::Fixed(offset) => offset
                .timestamp_millis_opt(ms)
                .single()
                .map(|t| t.naive_local()),
        }
    }

    pub fn date_of(&self, ms: i64) -> Option<NaiveDate> {
        self.local_time(ms).map(|t| t.date())
    }

    fn stamp(&self, ms: i64, format: &str) -> String {
        self.local_time(ms)
            .map(|t| t.format(format).to_string())
            .unwrap_or_else(|| ms.to_string())
    }
}

/// What a strategy wants a freshly created session to look like.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTemplate {
    pub title: String,
    pub description: String,
    pub metadata: Map<String, Value>,
}

pub trait SessionStrategy: Send + Sync + fmt::Debug {
    fn mode(&self) -> SessionMode;

    /// Whether activity at `now` belongs in a new session.
    ///
    /// `prev_activity` is the previous activity time if the caller knows it;
    /// otherwise the session's own timestamps are used. `session` is the
    /// latest session, `None` when nothing is open.
    fn should_create_new_session(
        &self,
        prev_activity: Option<i64>,
        now: i64,
        session: Option<&Session>,
    ) -> bool;

    fn create_session(&self, now: i64) -> SessionTemplate;

    /// Whether the idle timer ends the latest session.
    fn ends_on_idle(&self) -> bool {
        false
    }
}

/// Open session (if any) and the last time it saw activity.
fn open_session(prev_activity: Option<i64>, session: Option<&Session>) -> Option<(&Session, i64)> {
    let session = session.filter(|s| s.is_active && !s.is_ended())?;
    Some((session, prev_activity.unwrap_or_else(|| session.last_seen())))
}

/// Timeout in epoch-millisecond units, saturating at `i64::MAX`.
fn timeout_millis(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX)
}

fn mode_metadata(mode: SessionMode) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("mode".to_string(), json!(mode.as_str()));
    metadata
}

#[derive(Debug, Clone)]
pub struct DailyStrategy {
    idle_timeout: Duration,
    zone: DayZone,
}

impl DailyStrategy {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            zone: DayZone::Local,
        }
    }

    pub fn with_zone(mut self, zone: DayZone) -> Self {
        self.zone = zone;
        self
    }
}

impl SessionStrategy for DailyStrategy {
    fn mode(&self) -> SessionMode {
        SessionMode::Daily
    }

    fn should_create_new_session(
        &self,
        prev_activity: Option<i64>,
        now: i64,
        session: Option<&Session>,
    ) -> bool {
        let Some((session, prev)) = open_session(prev_activity, session) else {
            return true;
        };

        // Keep browsing past midnight in the same session; only a real break
        // after the day changed starts a new one.
        let day_changed = self.zone.date_of(session.start_time) != self.zone.date_of(now);
        let idle_gap = now.saturating_sub(prev) > timeout_millis(self.idle_timeout);
        day_changed && idle_gap
    }

    fn create_session(&self, now: i64) -> SessionTemplate {
        let day = self.zone.stamp(now, "%Y-%m-%d");
        let mut metadata = mode_metadata(self.mode());
        metadata.insert("day".to_string(), json!(day));

        SessionTemplate {
            title: format!("Browsing {}", self.zone.stamp(now, "%A, %B %-d")),
            description: format!("Daily session for {day}"),
            metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivityStrategy {
    idle_timeout: Duration,
    zone: DayZone,
}

impl ActivityStrategy {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            zone: DayZone::Local,
        }
    }

    pub fn with_zone(mut self, zone: DayZone) -> Self {
        self.zone = zone;
        self
    }
}

impl SessionStrategy for ActivityStrategy {
    fn mode(&self) -> SessionMode {
        SessionMode::Activity
    }

    fn should_create_new_session(
        &self,
        prev_activity: Option<i64>,
        now: i64,
        session: Option<&Session>,
    ) -> bool {
        match open_session(prev_activity, session) {
            None => true,
            Some((_, prev)) => now.saturating_sub(prev) > timeout_millis(self.idle_timeout),
        }
    }

    fn create_session(&self, now: i64) -> SessionTemplate {
        SessionTemplate {
            title: format!("Session {}", self.zone.stamp(now, "%Y-%m-%d %H:%M")),
            description: String::new(),
            metadata: mode_metadata(self.mode()),
        }
    }

    fn ends_on_idle(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualStrategy {
    zone: DayZone,
}

impl ManualStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStrategy for ManualStrategy {
    fn mode(&self) -> SessionMode {
        SessionMode::Manual
    }

    fn should_create_new_session(
        &self,
        prev_activity: Option<i64>,
        _now: i64,
        session: Option<&Session>,
    ) -> bool {
        open_session(prev_activity, session).is_none()
    }

    fn create_session(&self, now: i64) -> SessionTemplate {
        SessionTemplate {
            title: format!("Session {}", self.zone.stamp(now, "%Y-%m-%d %H:%M")),
            description: String::new(),
            metadata: mode_metadata(self.mode()),
        }
    }
}

pub fn strategy_for(
    mode: SessionMode,
    idle_timeout: Duration,
    zone: DayZone,
) -> Arc<dyn SessionStrategy> {
    match mode {
        SessionMode::Daily => Arc::new(DailyStrategy::new(idle_timeout).with_zone(zone)),
        SessionMode::Activity => Arc::new(ActivityStrategy::new(idle_timeout).with_zone(zone)),
        SessionMode::Manual => Arc::new(ManualStrategy { zone }),
    }
}
