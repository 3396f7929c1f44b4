//! Configuration for callers wiring up a gate.
//!
//! Configuration is loaded from two sources, later overriding earlier:
//!
//! 1. Built-in defaults (or a JSON document, see [`GateConfig::from_json`])
//! 2. Environment variables (`MERIT_GATE_*`)
//!
//! Nothing in the control loop reads configuration on its own. Callers turn
//! it into [`RunOptions`](crate::RunOptions) and wrappers such as
//! [`Retrying`](crate::evaluators::Retrying). Backend credentials never
//! belong here; they are the backend constructor's business.

use std::env;

use serde::{Deserialize, Serialize};

use crate::backend::DEFAULT_SHOTS;
use crate::error::{GateError, GateResult};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Shots used when a run does not ask for a specific number.
    #[serde(default = "default_shots")]
    pub default_shots: u32,

    /// Retry policy for evaluators wrapped in `Retrying`.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log filter used by binaries that install a subscriber.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_shots: default_shots(),
            retry: RetryConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl GateConfig {
    /// Defaults with environment overrides applied.
    pub fn load() -> GateResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document, then apply environment overrides.
    pub fn from_json(json: &str) -> GateResult<Self> {
        let mut config: Self = serde_json::from_str(json)
            .map_err(|e| GateError::Configuration(format!("invalid config: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self) {
        if let Some(shots) = env_parse("MERIT_GATE_DEFAULT_SHOTS") {
            self.default_shots = shots;
        }
        if let Some(attempts) = env_parse("MERIT_GATE_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts;
        }
        if let Some(backoff) = env_parse("MERIT_GATE_RETRY_BACKOFF_MS") {
            self.retry.backoff_ms = backoff;
        }
        if let Ok(level) = env::var("MERIT_GATE_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> GateResult<()> {
        if self.default_shots == 0 {
            return Err(GateError::Configuration("default_shots cannot be 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(GateError::Configuration(
                "retry.max_attempts cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first. `1` disables retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_shots() -> u32 {
    DEFAULT_SHOTS
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.default_shots, 1024);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.backoff_ms, 250);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: GateConfig =
            serde_json::from_str(r#"{"retry": {"max_attempts": 3}}"#).unwrap();
        assert_eq!(config.default_shots, 1024);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_ms, 250);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = GateConfig {
            default_shots: 0,
            ..GateConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GateError::Configuration(_))
        ));

        let config = GateConfig {
            retry: RetryConfig {
                max_attempts: 0,
                backoff_ms: 0,
            },
            ..GateConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = GateConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    // Environment variables are process-wide; tests that touch them hold
    // this lock so they never observe each other's values.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: ENV_LOCK serializes every test in this module that reads
        // or writes the environment.
        unsafe { env::set_var(key, value) };
        let out = f();
        unsafe { env::remove_var(key) };
        out
    }

    #[test]
    fn test_env_override_default_shots() {
        let mut config = GateConfig::default();
        with_env("MERIT_GATE_DEFAULT_SHOTS", "4096", || config.apply_env_overrides());
        assert_eq!(config.default_shots, 4096);
    }

    #[test]
    fn test_env_override_retry_max_attempts() {
        let mut config = GateConfig::default();
        with_env("MERIT_GATE_RETRY_MAX_ATTEMPTS", "3", || config.apply_env_overrides());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_env_override_retry_backoff_ms() {
        let mut config = GateConfig::default();
        with_env("MERIT_GATE_RETRY_BACKOFF_MS", " 40 ", || config.apply_env_overrides());
        assert_eq!(config.retry.backoff_ms, 40);
    }

    #[test]
    fn test_env_override_log_level() {
        let mut config = GateConfig::default();
        with_env("MERIT_GATE_LOG_LEVEL", "debug", || config.apply_env_overrides());
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_env_override_unparseable_keeps_default() {
        let mut config = GateConfig::default();
        with_env("MERIT_GATE_DEFAULT_SHOTS", "lots", || config.apply_env_overrides());
        assert_eq!(config.default_shots, 1024);
    }

    #[test]
    fn test_load_applies_env_and_validates() {
        let config = with_env("MERIT_GATE_DEFAULT_SHOTS", "2048", GateConfig::load).unwrap();
        assert_eq!(config.default_shots, 2048);

        let err = with_env("MERIT_GATE_RETRY_MAX_ATTEMPTS", "0", GateConfig::load).unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[test]
    fn test_from_json_round_trip() {
        let original = GateConfig {
            default_shots: 512,
            retry: RetryConfig {
                max_attempts: 4,
                backoff_ms: 100,
            },
            log_level: "warn".to_string(),
        };
        let json = serde_json::to_string(&original).unwrap();

        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let loaded = GateConfig::from_json(&json).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_from_json_env_overrides_document() {
        let config = with_env("MERIT_GATE_LOG_LEVEL", "trace", || {
            GateConfig::from_json(r#"{"log_level": "warn", "default_shots": 256}"#)
        })
        .unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.default_shots, 256);
    }
}
