//! Engine-wide configuration.
//!
//! TOML is the sole config source; no environment variable overrides
//! (the demo gateway layers `LOG_LEVEL`/`BIND_ADDR` env vars on top of
//! its own config the way `services/server` does, but that's the
//! gateway's concern, not the engine's).

use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Validated, engine-facing configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on how long a `Session` operation waits to acquire one of
    /// its three mutual-exclusion locks before giving up as a no-op.
    pub lock_timeout: Duration,
    /// Default strong-queue lifetime for producers that don't specify one.
    pub default_strong_lifetime: Duration,
    /// Default soft-queue lifetime for producers that don't specify one.
    /// Always `>= default_strong_lifetime`.
    pub default_soft_lifetime: Duration,
    /// How often an idle, frame-attached session receives a ping.
    pub ping_interval: Duration,
    /// How long past its deadline an empty, unattached session survives
    /// before `Registry::reap` removes it.
    pub reap_grace_window: Duration,
    /// Upper bound on the number of soft-queue holders a `DualQueue`
    /// keeps resolvable at once before reclaiming the oldest.
    pub max_soft_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(250),
            default_strong_lifetime: Duration::from_secs(60),
            default_soft_lifetime: Duration::from_secs(300),
            ping_interval: Duration::from_secs(30),
            reap_grace_window: Duration::from_secs(60),
            max_soft_entries: 500,
        }
    }
}

impl EngineConfig {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.default_soft_lifetime < self.default_strong_lifetime {
            return Err(ConfigError::InvalidValue(
                "default_soft_lifetime_ms must be >= default_strong_lifetime_ms".to_owned(),
            ));
        }
        Ok(self)
    }

    /// Loads and validates config from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawEngineConfig =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let defaults = EngineConfig::default();
        let cfg = EngineConfig {
            lock_timeout: raw
                .lock_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            default_strong_lifetime: raw
                .default_strong_lifetime_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_strong_lifetime),
            default_soft_lifetime: raw
                .default_soft_lifetime_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_soft_lifetime),
            ping_interval: raw
                .ping_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.ping_interval),
            reap_grace_window: raw
                .reap_grace_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reap_grace_window),
            max_soft_entries: raw.max_soft_entries.unwrap_or(defaults.max_soft_entries),
        };
        cfg.validate()
    }

    /// Loads and validates config from a TOML file on disk.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
        Self::from_toml_str(&toml_str)
    }
}

/// Raw TOML shape: every field optional, defaults filled in by
/// [`EngineConfig::from_toml_str`].
#[derive(Debug, Default, Deserialize)]
struct RawEngineConfig {
    lock_timeout_ms: Option<u64>,
    default_strong_lifetime_ms: Option<u64>,
    default_soft_lifetime_ms: Option<u64>,
    ping_interval_ms: Option<u64>,
    reap_grace_window_ms: Option<u64>,
    max_soft_entries: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        EngineConfig::default().validate().expect("defaults must validate");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = EngineConfig::from_toml_str("").expect("empty config should use defaults");
        let defaults = EngineConfig::default();
        assert_eq!(cfg.lock_timeout, defaults.lock_timeout);
        assert_eq!(cfg.max_soft_entries, defaults.max_soft_entries);
    }

    #[test]
    fn partial_overrides_apply_and_defaults_fill_the_rest() {
        let cfg = EngineConfig::from_toml_str("lock_timeout_ms = 50\nmax_soft_entries = 10\n")
            .expect("should parse");
        assert_eq!(cfg.lock_timeout, Duration::from_millis(50));
        assert_eq!(cfg.max_soft_entries, 10);
        assert_eq!(cfg.ping_interval, EngineConfig::default().ping_interval);
    }

    #[test]
    fn rejects_soft_lifetime_shorter_than_strong_lifetime() {
        let err = EngineConfig::from_toml_str(
            "default_strong_lifetime_ms = 5000\ndefault_soft_lifetime_ms = 1000\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("not valid = = toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
