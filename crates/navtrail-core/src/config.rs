//! Tracker configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use navtrail_session::TrackerSettings;

use crate::error::CoreError;
use crate::Result;

/// Overrides the platform data directory
pub const DATA_DIR_ENV: &str = "NAVTRAIL_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Object store name and schema version
    pub store_name: String,
    pub store_version: u32,
    /// Minimum spacing between session creations
    pub cooldown_ms: u64,
    /// Activity signals closer than this are dropped
    pub debounce_ms: u64,
    pub consistency_interval_secs: u64,
    /// Used until the user changes a setting
    pub default_settings: TrackerSettings,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("navtrail.db"),
            store_name: "navtrail".to_string(),
            store_version: 1,
            cooldown_ms: 10_000,
            debounce_ms: 2_000,
            consistency_interval_secs: 5 * 60,
            default_settings: TrackerSettings::default(),
        }
    }

    /// `NAVTRAIL_DATA_DIR`, else the platform data directory.
    pub fn data_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::data_local_dir()
            .map(|d| d.join("NavTrail"))
            .unwrap_or_else(|| PathBuf::from(".navtrail"))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn consistency_interval(&self) -> Duration {
        Duration::from_secs(self.consistency_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_name.trim().is_empty() {
            return Err(CoreError::Config("store name is empty".into()));
        }
        if self.store_version == 0 {
            return Err(CoreError::Config("store version must be at least 1".into()));
        }
        if self.consistency_interval_secs == 0 {
            return Err(CoreError::Config("consistency interval must be positive".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/tmp/nt"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/nt/navtrail.db"));
        assert_eq!(config.cooldown(), Duration::from_secs(10));
        assert_eq!(config.debounce(), Duration::from_secs(2));
        assert_eq!(config.consistency_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"storeName": "alt", "debounceMs": 500}"#).unwrap();
        assert_eq!(config.store_name, "alt");
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.cooldown_ms, 10_000);
    }

    #[test]
    fn test_validate_rejects_zero_version() {
        let config = Config {
            store_version: 0,
            ..Config::new(PathBuf::from("/tmp/nt"))
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }
}
