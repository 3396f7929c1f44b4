//! Backend trait and run options.
//!
//! The [`Backend`] trait is the only thing the gate needs from an execution
//! substrate:
//!
//! ```text
//!   introspect() ──→ Capabilities        (no program executed)
//!   run(program, shots, options) ──→ ExecutionResult
//! ```
//!
//! ## Design principles
//!
//! - **Async-native**: both methods may reach a remote service.
//! - **Thread-safe**: `Send + Sync` so one handle can be shared by reference.
//! - **Program-generic**: the trait is parameterized over `P`, the program
//!   type, so the gate never depends on a circuit representation.
//! - **Borrowed, never owned**: the gate holds `&dyn Backend<P>` for the
//!   duration of one conditional run and never touches its lifecycle.
//!
//! Credentials for remote services belong in the backend's constructor.
//! Nothing in this crate reads them.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::capability::Capabilities;
use crate::config::GateConfig;
use crate::error::{GateError, GateResult};
use crate::result::ExecutionResult;

/// Shots used when the caller does not ask for a specific number.
pub const DEFAULT_SHOTS: u32 = 1024;

/// Whether a backend runs locally or behind a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// In-process or local simulator.
    Simulated,
    /// Cloud device or remote simulator.
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Simulated => write!(f, "simulated"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// Trait for execution backends.
///
/// # Contract
///
/// - `introspect()` MUST NOT execute a program. Fields the backend cannot
///   supply stay `None` in the returned [`Capabilities`].
/// - `run()` MAY take arbitrarily long. On failure it returns
///   [`GateError::BackendUnavailable`] or [`GateError::ExecutionFailed`]
///   and leaves no partial state behind.
/// - Whether concurrent `run()` calls are safe is up to the implementation.
#[async_trait]
pub trait Backend<P>: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Whether this backend is simulated or remote.
    fn kind(&self) -> BackendKind;

    /// Read the backend's current capability snapshot.
    async fn introspect(&self) -> GateResult<Capabilities>;

    /// Execute `program` for `shots` repetitions.
    async fn run(
        &self,
        program: &P,
        shots: u32,
        options: &RunOptions,
    ) -> GateResult<ExecutionResult>;
}

/// Options threaded through one conditional run.
///
/// The same options reach every check, evaluator and action. `shots` is the
/// only field the gate itself interprets; `extra` is passed through for
/// backend-specific or evaluator-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Requested shots. `None` means [`DEFAULT_SHOTS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shots: Option<u32>,
    /// Free-form options, keyed by name.
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub extra: FxHashMap<String, serde_json::Value>,
}

impl RunOptions {
    /// Options with default shots and no extras.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options whose shot default comes from configuration.
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            shots: Some(config.default_shots),
            extra: FxHashMap::default(),
        }
    }

    /// Request a specific number of shots.
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = Some(shots);
        self
    }

    /// Set a free-form option.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Look up a free-form option.
    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }

    /// Validated shot count: the requested value, or [`DEFAULT_SHOTS`].
    pub fn shots(&self) -> GateResult<u32> {
        validate_shots(self.shots.unwrap_or(DEFAULT_SHOTS))
    }
}

/// Reject a zero shot count.
pub fn validate_shots(shots: u32) -> GateResult<u32> {
    if shots == 0 {
        return Err(GateError::InvalidShots("shots must be greater than zero".into()));
    }
    Ok(shots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shots() {
        assert_eq!(RunOptions::new().shots(), Ok(DEFAULT_SHOTS));
        assert_eq!(RunOptions::new().with_shots(2048).shots(), Ok(2048));
    }

    #[test]
    fn test_zero_shots_rejected() {
        let err = RunOptions::new().with_shots(0).shots().unwrap_err();
        assert!(matches!(err, GateError::InvalidShots(_)));
    }

    #[test]
    fn test_extra_options() {
        let options = RunOptions::new().with_extra("optimization_level", serde_json::json!(3));
        assert_eq!(
            options.extra("optimization_level"),
            Some(&serde_json::json!(3))
        );
        assert!(options.extra("seed").is_none());
    }

    #[test]
    fn test_backend_kind() {
        use crate::test_utils::{MockBackend, Program};

        let backend = MockBackend::bell("mock");
        let kind = Backend::<Program>::kind(&backend);
        assert_eq!(kind, BackendKind::Simulated);
        assert_eq!(kind.to_string(), "simulated");
        assert_eq!(
            serde_json::to_value(BackendKind::Remote).unwrap(),
            serde_json::json!("Remote")
        );
    }

    #[test]
    fn test_from_config() {
        let config = GateConfig {
            default_shots: 4096,
            ..GateConfig::default()
        };
        assert_eq!(RunOptions::from_config(&config).shots(), Ok(4096));
    }
}
