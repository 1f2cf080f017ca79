//! Database configuration for the persistence layer.
//!
//! # Responsibility
//! - Describe where the engine stores data and how it is tuned.
//! - Resolve overrides from the process environment.
//!
//! # Invariants
//! - `DbConfig::default()` is always usable (in-memory engine).
//! - Malformed environment values never fail startup; defaults apply.

use log::warn;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming a database file. Empty means in-memory.
pub const DB_PATH_ENV: &str = "PATREG_DB_PATH";
/// Environment variable overriding the busy timeout in milliseconds.
pub const BUSY_TIMEOUT_ENV: &str = "PATREG_BUSY_TIMEOUT_MS";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Storage target for the embedded engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// Private in-memory database, lost when the engine stops.
    Memory,
    /// Database file on disk, created when missing.
    File(PathBuf),
}

impl DbLocation {
    /// Short label used in log events.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File(_) => "file",
        }
    }
}

/// Engine configuration consumed by `ConnectionManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub location: DbLocation,
    /// How long the engine waits on a locked database file.
    pub busy_timeout: Duration,
    /// Number of requests that may wait in the worker queue.
    pub queue_capacity: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            location: DbLocation::Memory,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl DbConfig {
    /// In-memory configuration with default tuning.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed configuration with default tuning.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DbLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Builds a configuration from `PATREG_DB_PATH` and `PATREG_BUSY_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(DB_PATH_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                config.location = DbLocation::File(PathBuf::from(trimmed));
            }
        }

        if let Some(raw) = lookup(BUSY_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.busy_timeout = Duration::from_millis(ms),
                Err(err) => warn!(
                    "event=config_load module=config status=error key={} error={}",
                    BUSY_TIMEOUT_ENV, err
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::{DbConfig, DbLocation, BUSY_TIMEOUT_ENV, DB_PATH_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_memory_without_overrides() {
        let config = DbConfig::from_lookup(lookup(&[]));
        assert_eq!(config, DbConfig::default());
        assert_eq!(config.location.mode(), "memory");
    }

    #[test]
    fn path_override_selects_file_location() {
        let config = DbConfig::from_lookup(lookup(&[(DB_PATH_ENV, " /tmp/patients.db ")]));
        assert_eq!(
            config.location,
            DbLocation::File(PathBuf::from("/tmp/patients.db"))
        );
    }

    #[test]
    fn blank_path_keeps_memory_location() {
        let config = DbConfig::from_lookup(lookup(&[(DB_PATH_ENV, "   ")]));
        assert_eq!(config.location, DbLocation::Memory);
    }

    #[test]
    fn malformed_timeout_falls_back_to_default() {
        let config = DbConfig::from_lookup(lookup(&[(BUSY_TIMEOUT_ENV, "soon")]));
        assert_eq!(config.busy_timeout, DbConfig::default().busy_timeout);

        let config = DbConfig::from_lookup(lookup(&[(BUSY_TIMEOUT_ENV, "250")]));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }
}
