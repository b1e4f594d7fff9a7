//! User settings
//!
//! Stored as `{key, value}` records in the `settings` collection. Changes are
//! broadcast on a watch channel so the strategy and idle timer can follow.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;

use navtrail_graph::SETTINGS;
use navtrail_storage::ObjectStore;

use crate::strategy::SessionMode;
use crate::Result;

const SESSION_MODE_KEY: &str = "sessionMode";
const IDLE_TIMEOUT_KEY: &str = "idleTimeout";

/// Shortest idle timeout accepted
const MIN_IDLE_TIMEOUT_SECS: f64 = 60.0;
/// Longest idle timeout accepted (30 days)
const MAX_IDLE_TIMEOUT_SECS: f64 = 30.0 * 24.0 * 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSettings {
    pub session_mode: SessionMode,
    /// Hours without activity before the user counts as idle
    pub idle_timeout: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::Daily,
            idle_timeout: 0.5,
        }
    }
}

impl TrackerSettings {
    pub fn idle_timeout_duration(&self) -> Duration {
        let hours = if self.idle_timeout.is_finite() {
            self.idle_timeout
        } else {
            TrackerSettings::default().idle_timeout
        };
        let secs = (hours * 3600.0)
            .round()
            .clamp(MIN_IDLE_TIMEOUT_SECS, MAX_IDLE_TIMEOUT_SECS);
        Duration::from_secs(secs as u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub session_mode: Option<SessionMode>,
    pub idle_timeout: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingRecord {
    key: String,
    value: Value,
}

/// Read one value from the settings collection.
pub(crate) fn read_setting<T: DeserializeOwned>(store: &ObjectStore, key: &str) -> Result<Option<T>> {
    let record: Option<SettingRecord> = store.get(SETTINGS, key)?;
    match record {
        Some(SettingRecord { value, .. }) if !value.is_null() => {
            Ok(Some(serde_json::from_value(value)?))
        }
        _ => Ok(None),
    }
}

pub(crate) fn write_setting<T: Serialize>(store: &ObjectStore, key: &str, value: &T) -> Result<()> {
    let record = SettingRecord {
        key: key.to_string(),
        value: serde_json::to_value(value)?,
    };
    store.put(SETTINGS, &record)?;
    Ok(())
}

pub struct SettingsService {
    store: ObjectStore,
    tx: watch::Sender<TrackerSettings>,
}

impl SettingsService {
    /// Load persisted settings, falling back to `defaults` per field.
    pub fn load(store: ObjectStore, defaults: TrackerSettings) -> Result<Self> {
        let session_mode = match read_setting::<String>(&store, SESSION_MODE_KEY)? {
            Some(raw) => raw.parse::<SessionMode>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring stored session mode");
                defaults.session_mode
            }),
            None => defaults.session_mode,
        };
        let idle_timeout =
            read_setting::<f64>(&store, IDLE_TIMEOUT_KEY)?.unwrap_or(defaults.idle_timeout);

        let settings = TrackerSettings {
            session_mode,
            idle_timeout,
        };
        tracing::info!(
            mode = %settings.session_mode,
            idle_timeout_hours = settings.idle_timeout,
            "Loaded settings"
        );

        let (tx, _rx) = watch::channel(settings);
        Ok(Self { store, tx })
    }

    pub fn get(&self) -> TrackerSettings {
        *self.tx.borrow()
    }

    /// Persist the given fields and notify subscribers.
    pub fn update(&self, update: &SettingsUpdate) -> Result<TrackerSettings> {
        let mut settings = self.get();

        if let Some(mode) = update.session_mode {
            write_setting(&self.store, SESSION_MODE_KEY, &mode.as_str())?;
            settings.session_mode = mode;
        }
        if let Some(hours) = update.idle_timeout {
            write_setting(&self.store, IDLE_TIMEOUT_KEY, &hours)?;
            settings.idle_timeout = hours;
        }

        self.tx.send_replace(settings);
        tracing::info!(
            mode = %settings.session_mode,
            idle_timeout_hours = settings.idle_timeout,
            "Settings updated"
        );
        Ok(settings)
    }

    /// Change listener: resolves whenever settings are updated.
    pub fn subscribe(&self) -> watch::Receiver<TrackerSettings> {
        self.tx.subscribe()
    }
}
