//! Actions run after the compliance decision.
//!
//! Two implementations share the [`Action`] contract:
//!
//! | Action | Does |
//! |--------|------|
//! | [`ComputationAction`] | runs one fixed program on the backend |
//! | [`CallbackAction`] | calls an arbitrary handler (logging, fallback work, early exit) |
//!
//! Actions receive the metric results gathered so far as read-only
//! evidence. Their outcome is either an execution or an explicit
//! [`ActionResult::NotPerformed`]; choosing not to run anything is not a
//! failure.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::{Backend, RunOptions};
use crate::error::GateResult;
use crate::metric::MetricResult;
use crate::result::ExecutionResult;

/// What an action produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "execution", rename_all = "snake_case")]
pub enum ActionResult {
    /// The action ran a program.
    Executed(ExecutionResult),
    /// The action decided not to run anything on the backend.
    NotPerformed,
}

impl ActionResult {
    /// The execution, if one happened.
    pub fn execution(&self) -> Option<&ExecutionResult> {
        match self {
            ActionResult::Executed(result) => Some(result),
            ActionResult::NotPerformed => None,
        }
    }

    /// Consume into the execution, if one happened.
    pub fn into_execution(self) -> Option<ExecutionResult> {
        match self {
            ActionResult::Executed(result) => Some(result),
            ActionResult::NotPerformed => None,
        }
    }

    /// Whether a program was executed.
    pub fn is_executed(&self) -> bool {
        matches!(self, ActionResult::Executed(_))
    }
}

impl From<ExecutionResult> for ActionResult {
    fn from(result: ExecutionResult) -> Self {
        ActionResult::Executed(result)
    }
}

/// A unit of work dispatched by the orchestrator.
#[async_trait]
pub trait Action<P>: Send + Sync {
    /// Run against `backend`, given the evidence collected by the checks.
    async fn run(
        &self,
        backend: &dyn Backend<P>,
        results: &[MetricResult],
        options: &RunOptions,
    ) -> GateResult<ActionResult>;
}

/// Runs a fixed program with the caller's options.
pub struct ComputationAction<P> {
    program: P,
}

impl<P> ComputationAction<P> {
    /// Wrap `program`.
    pub fn new(program: P) -> Self {
        Self { program }
    }

    /// The wrapped program.
    pub fn program(&self) -> &P {
        &self.program
    }
}

#[async_trait]
impl<P: Send + Sync> Action<P> for ComputationAction<P> {
    async fn run(
        &self,
        backend: &dyn Backend<P>,
        _results: &[MetricResult],
        options: &RunOptions,
    ) -> GateResult<ActionResult> {
        let shots = options.shots()?;
        info!(backend = %backend.name(), shots, "Running computation");
        let execution = backend.run(&self.program, shots, options).await?;
        Ok(ActionResult::Executed(execution))
    }
}

/// Boxed future returned by asynchronous callback handlers.
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = GateResult<ActionResult>> + Send + 'a>>;

type Handler<P> = Box<
    dyn for<'a> Fn(&'a dyn Backend<P>, &'a [MetricResult], &'a RunOptions) -> ActionFuture<'a>
        + Send
        + Sync,
>;

/// Calls an arbitrary handler.
///
/// ```ignore
/// let fallback = CallbackAction::new(|backend, results, options| {
///     Box::pin(async move {
///         let shots = options.shots()?;
///         let execution = backend.run(&classical_fallback(results), shots, options).await?;
///         Ok::<_, GateError>(ActionResult::from(execution))
///     })
/// });
/// let skip = CallbackAction::from_fn(|_, _, _| Ok(ActionResult::NotPerformed));
/// ```
pub struct CallbackAction<P> {
    handler: Handler<P>,
}

impl<P> CallbackAction<P> {
    /// Wrap an asynchronous handler.
    pub fn new<F>(handler: F) -> Self
    where
        F: for<'a> Fn(&'a dyn Backend<P>, &'a [MetricResult], &'a RunOptions) -> ActionFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Wrap a synchronous handler that does not need to await the backend.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&dyn Backend<P>, &[MetricResult], &RunOptions) -> GateResult<ActionResult>
            + Send
            + Sync
            + 'static,
    {
        Self::new(move |backend, results, options| {
            let outcome = handler(backend, results, options);
            Box::pin(async move { outcome })
        })
    }

    /// Handler that runs nothing and reports [`ActionResult::NotPerformed`].
    pub fn skip() -> Self {
        Self::from_fn(|_, _, _| Ok(ActionResult::NotPerformed))
    }
}

#[async_trait]
impl<P> Action<P> for CallbackAction<P> {
    async fn run(
        &self,
        backend: &dyn Backend<P>,
        results: &[MetricResult],
        options: &RunOptions,
    ) -> GateResult<ActionResult> {
        (self.handler)(backend, results, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Counts;
    use crate::test_utils::{MockBackend, Program};

    #[tokio::test]
    async fn test_computation_action_runs_program() {
        let backend = MockBackend::bell("mock");
        let action = ComputationAction::new(Program::new("bell"));

        let result = action
            .run(&backend, &[], &RunOptions::new().with_shots(100))
            .await
            .unwrap();

        let execution = result.execution().unwrap();
        assert_eq!(execution.counts, Counts::from_pairs([("00", 50), ("11", 50)]));
        assert_eq!(backend.runs(), 1);
    }

    #[tokio::test]
    async fn test_computation_action_hands_back_its_execution() {
        let backend = MockBackend::bell("mock");
        let action = ComputationAction::new(Program::new("payload"));
        assert_eq!(action.program(), &Program::new("payload"));

        let execution = action
            .run(&backend, &[], &RunOptions::new().with_shots(10))
            .await
            .unwrap()
            .into_execution()
            .unwrap();

        assert_eq!(execution.shots, 10);
        assert_eq!(execution.raw, serde_json::json!({"program": "payload"}));
        assert_eq!(ActionResult::NotPerformed.into_execution(), None);
    }

    #[tokio::test]
    async fn test_computation_action_rejects_zero_shots() {
        let backend = MockBackend::bell("mock");
        let action = ComputationAction::new(Program::new("bell"));

        let err = action
            .run(&backend, &[], &RunOptions::new().with_shots(0))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::GateError::InvalidShots(_)));
        assert_eq!(backend.runs(), 0);
    }

    #[tokio::test]
    async fn test_callback_sees_results() {
        let backend = MockBackend::bell("mock");
        let action = CallbackAction::<Program>::from_fn(|backend, results, _| {
            assert_eq!(backend.name(), "mock");
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].score(), Some(2.5));
            Ok(ActionResult::NotPerformed)
        });
        let evidence = [MetricResult::scored("chsh", "mock", 2.5)];

        let result = action
            .run(&backend, &evidence, &RunOptions::new())
            .await
            .unwrap();
        assert_eq!(result, ActionResult::NotPerformed);
        assert_eq!(backend.runs(), 0);
    }

    #[tokio::test]
    async fn test_async_callback_can_run_on_backend() {
        let backend = MockBackend::bell("mock");
        let action = CallbackAction::<Program>::new(|backend, _, options| {
            Box::pin(async move {
                let shots = options.shots()?;
                let execution = backend.run(&Program::new("fallback"), shots, options).await?;
                Ok::<_, crate::GateError>(ActionResult::from(execution))
            })
        });

        let result = action
            .run(&backend, &[], &RunOptions::new().with_shots(10))
            .await
            .unwrap();
        assert!(result.is_executed());
        assert_eq!(backend.programs(), vec!["fallback".to_string()]);
    }
}
