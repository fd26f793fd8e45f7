//! Configuration module for checkhtml.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::probe::DEFAULT_PROBE_TIMEOUT;
use crate::scheduler::{DEFAULT_CHECK_INTERVAL, DEFAULT_MIN_RECHECK_INTERVAL};

/// How probe results are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Every result is appended to the history table
    History,
    /// Only the latest result is kept, on the target row
    Latest,
}

impl FromStr for Persistence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "history" => Ok(Self::History),
            "latest" => Ok(Self::Latest),
            other => Err(format!("unknown persistence mode: {}", other)),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the API (default: 3000)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "checkhtml.db")
    pub db_path: String,
    /// Time between the starts of two check cycles
    pub check_interval: Duration,
    /// Minimum time between two probes of one target
    pub min_recheck_interval: Duration,
    pub probe_timeout: Duration,
    pub max_concurrent_probes: usize,
    pub persistence: Persistence,
    /// Skip targets checked within `min_recheck_interval`
    pub dedup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            db_path: "checkhtml.db".to_string(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            min_recheck_interval: DEFAULT_MIN_RECHECK_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_concurrent_probes: 5,
            persistence: Persistence::History,
            dedup: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHECKHTML_HTTP_PORT`: HTTP port (default: 3000)
    /// - `CHECKHTML_DB_PATH`: Database file path (default: "checkhtml.db")
    /// - `CHECKHTML_CHECK_INTERVAL_MS`: cycle period (default: 60000)
    /// - `CHECKHTML_MIN_RECHECK_MS`: minimum re-check interval (default: 60000)
    /// - `CHECKHTML_PROBE_TIMEOUT_MS`: per-probe timeout (default: 10000)
    /// - `CHECKHTML_MAX_CONCURRENT_PROBES`: probes in flight per cycle (default: 5)
    /// - `CHECKHTML_PERSISTENCE`: `history` or `latest` (default: history)
    /// - `CHECKHTML_DEDUP`: `true` or `false` (default: true)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "CHECKHTML_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("CHECKHTML_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "CHECKHTML_CHECK_INTERVAL_MS") {
            cfg.check_interval = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "CHECKHTML_MIN_RECHECK_MS") {
            cfg.min_recheck_interval = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "CHECKHTML_PROBE_TIMEOUT_MS") {
            cfg.probe_timeout = Duration::from_millis(ms);
        }

        if let Some(n) = parse_var::<usize>(&lookup, "CHECKHTML_MAX_CONCURRENT_PROBES") {
            cfg.max_concurrent_probes = n.max(1);
        }

        if let Some(mode) = parse_var(&lookup, "CHECKHTML_PERSISTENCE") {
            cfg.persistence = mode;
        }

        if let Some(dedup) = parse_var(&lookup, "CHECKHTML_DEDUP") {
            cfg.dedup = dedup;
        }

        cfg
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value {:?} for {}", raw, key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 3000);
        assert_eq!(cfg.db_path, "checkhtml.db");
        assert_eq!(cfg.min_recheck_interval, Duration::from_millis(60_000));
        assert_eq!(cfg.probe_timeout, Duration::from_millis(10_000));
        assert_eq!(cfg.persistence, Persistence::History);
        assert!(cfg.dedup);
    }

    #[test]
    fn test_overrides() {
        let cfg = from_pairs(&[
            ("CHECKHTML_HTTP_PORT", "8080"),
            ("CHECKHTML_MIN_RECHECK_MS", "5000"),
            ("CHECKHTML_PROBE_TIMEOUT_MS", "250"),
            ("CHECKHTML_PERSISTENCE", "Latest"),
            ("CHECKHTML_DEDUP", "false"),
            ("CHECKHTML_MAX_CONCURRENT_PROBES", "0"),
        ]);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.min_recheck_interval, Duration::from_millis(5000));
        assert_eq!(cfg.probe_timeout, Duration::from_millis(250));
        assert_eq!(cfg.persistence, Persistence::Latest);
        assert!(!cfg.dedup);
        assert_eq!(cfg.max_concurrent_probes, 1);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let cfg = from_pairs(&[
            ("CHECKHTML_HTTP_PORT", "not-a-port"),
            ("CHECKHTML_PERSISTENCE", "sometimes"),
            ("CHECKHTML_CHECK_INTERVAL_MS", "-1"),
        ]);
        assert_eq!(cfg.http_port, 3000);
        assert_eq!(cfg.persistence, Persistence::History);
        assert_eq!(cfg.check_interval, DEFAULT_CHECK_INTERVAL);
    }
}
