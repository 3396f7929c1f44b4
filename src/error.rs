//! Gate error types.
//!
//! Every failure surfaced by [`run_conditionally`](crate::run_conditionally)
//! names the stage that produced it:
//!
//! | Stage | Variants | Raised by |
//! |-------|----------|-----------|
//! | **Backend** | `BackendUnavailable` | backend handle (`introspect`, `run`) |
//! | **Execution** | `ExecutionFailed` | backend `run`, from an evaluator or an action |
//! | **Evaluation** | `EvaluationFailed` | metric evaluators |
//! | **Input** | `InvalidShots`, `Configuration` | option and config validation |
//!
//! A check that simply evaluates to `false` is not an error. It is an
//! ordinary [`ComplianceOutcome`](crate::ComplianceOutcome) routed to the
//! failure action.

use thiserror::Error;

/// Errors that can abort a conditional run.
///
/// None of these are recovered from inside the crate. Retry, where wanted,
/// is the job of a wrapping evaluator such as
/// [`Retrying`](crate::evaluators::Retrying).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum GateError {
    /// Backend cannot be reached or does not accept work.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// A `run` on the backend failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A metric evaluator could not produce a result.
    #[error("Evaluation of `{evaluator}` failed: {reason}")]
    EvaluationFailed {
        /// Identity of the evaluator that failed.
        evaluator: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// Shot count rejected before reaching the backend.
    #[error("Invalid shots: {0}")]
    InvalidShots(String),

    /// Configuration error (fix configuration).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Stage of a conditional run that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// The backend itself could not be reached.
    Backend,
    /// A metric evaluator failed.
    Evaluation,
    /// A program execution failed.
    Execution,
    /// Caller-supplied options or configuration were rejected.
    Input,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Backend => write!(f, "backend"),
            FailureStage::Evaluation => write!(f, "evaluation"),
            FailureStage::Execution => write!(f, "execution"),
            FailureStage::Input => write!(f, "input"),
        }
    }
}

impl GateError {
    /// Shorthand for an [`GateError::EvaluationFailed`] error.
    pub fn evaluation(evaluator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EvaluationFailed {
            evaluator: evaluator.into(),
            reason: reason.into(),
        }
    }

    /// The stage this error belongs to.
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::BackendUnavailable(_) => FailureStage::Backend,
            Self::ExecutionFailed(_) => FailureStage::Execution,
            Self::EvaluationFailed { .. } => FailureStage::Evaluation,
            Self::InvalidShots(_) | Self::Configuration(_) => FailureStage::Input,
        }
    }

    /// Returns `true` if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(GateError::BackendUnavailable("offline".into()).is_transient());
        assert!(!GateError::ExecutionFailed("boom".into()).is_transient());
        assert!(!GateError::evaluation("chsh", "no counts").is_transient());
    }

    #[test]
    fn test_stage() {
        assert_eq!(
            GateError::BackendUnavailable("x".into()).stage(),
            FailureStage::Backend
        );
        assert_eq!(
            GateError::ExecutionFailed("x".into()).stage(),
            FailureStage::Execution
        );
        assert_eq!(
            GateError::evaluation("t1", "missing").stage(),
            FailureStage::Evaluation
        );
        assert_eq!(
            GateError::InvalidShots("0".into()).stage(),
            FailureStage::Input
        );
    }

    #[test]
    fn test_error_display() {
        let err = GateError::evaluation("min_t1", "backend reported no T1 data");
        assert_eq!(
            err.to_string(),
            "Evaluation of `min_t1` failed: backend reported no T1 data"
        );
    }
}
