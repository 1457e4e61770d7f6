//! Application configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::use_cases::eviction::EvictionConfig;

/// Application configuration loaded from environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite file holding persisted world records
    pub database_path: PathBuf,
    /// Root directory of the world storage engine
    pub worlds_dir: PathBuf,
    /// Role definitions file
    pub roles_path: PathBuf,
    /// Principal -> capability grants file
    pub grants_path: PathBuf,

    /// Idle world eviction timing
    pub eviction: EvictionConfig,

    /// Upper bound on each blocking call made during startup reconciliation
    pub startup_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path_or = |key: &str, default: &str| {
            PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()))
        };
        let secs_or = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| {
                        format!("{} must be a whole number of seconds, got {:?}", key, raw)
                    }),
                None => Ok(Duration::from_secs(default)),
            }
        };

        Ok(Self {
            database_path: path_or("BUILDSYS_DATABASE_PATH", "./data/buildsys.db"),
            worlds_dir: path_or("BUILDSYS_WORLDS_DIR", "./worlds"),
            roles_path: path_or("BUILDSYS_ROLES_PATH", "./roles.json"),
            grants_path: path_or("BUILDSYS_GRANTS_PATH", "./grants.json"),

            eviction: EvictionConfig {
                sweep_interval: secs_or("BUILDSYS_SWEEP_INTERVAL_SECS", 60)?,
                idle_threshold: secs_or("BUILDSYS_IDLE_THRESHOLD_SECS", 300)?,
                unload_timeout: secs_or("BUILDSYS_UNLOAD_TIMEOUT_SECS", 10)?,
            },

            startup_timeout: secs_or("BUILDSYS_STARTUP_TIMEOUT_SECS", 30)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.database_path, PathBuf::from("./data/buildsys.db"));
        assert_eq!(config.worlds_dir, PathBuf::from("./worlds"));
        assert_eq!(config.eviction, EvictionConfig::default());
        assert_eq!(config.startup_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("BUILDSYS_WORLDS_DIR", "/srv/worlds"),
            ("BUILDSYS_IDLE_THRESHOLD_SECS", " 120 "),
        ])
        .unwrap();

        assert_eq!(config.worlds_dir, PathBuf::from("/srv/worlds"));
        assert_eq!(config.eviction.idle_threshold, Duration::from_secs(120));
    }

    #[test]
    fn unparseable_number_is_an_error() {
        let err = config_from(&[("BUILDSYS_SWEEP_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("BUILDSYS_SWEEP_INTERVAL_SECS"));
    }
}
