//! Compliance checks: an evaluator paired with a decision rule.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{Backend, RunOptions};
use crate::error::GateResult;
use crate::metric::{MetricEvaluator, MetricResult};
use crate::policy::{self, Predicate};

/// Pass/fail decision together with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceOutcome {
    /// Whether the predicate accepted the result.
    pub passed: bool,
    /// The metric result the decision was made on.
    pub fom_result: MetricResult,
}

/// One compliance check.
///
/// [`check`](Self::check) evaluates the metric exactly once and applies the
/// predicate. Evaluator errors are returned as they are: a check whose
/// metric could not be measured has an unknown outcome, which is different
/// from a failed one.
pub struct ComplianceCheck<P> {
    evaluator: Box<dyn MetricEvaluator<P>>,
    predicate: Predicate,
}

impl<P> ComplianceCheck<P> {
    /// Pair `evaluator` with `predicate`.
    pub fn new(evaluator: impl MetricEvaluator<P> + 'static, predicate: Predicate) -> Self {
        Self {
            evaluator: Box::new(evaluator),
            predicate,
        }
    }

    /// Check that passes whatever the evaluator reports.
    pub fn always_pass(evaluator: impl MetricEvaluator<P> + 'static) -> Self {
        Self::new(evaluator, policy::always())
    }

    /// Identity of the wrapped evaluator.
    pub fn evaluator_id(&self) -> &str {
        self.evaluator.id()
    }

    /// Measure `backend` and decide.
    pub async fn check(
        &self,
        backend: &dyn Backend<P>,
        options: &RunOptions,
    ) -> GateResult<ComplianceOutcome> {
        let fom_result = self.evaluator.evaluate(backend, options).await?;
        let passed = (self.predicate)(&fom_result);
        debug!(
            evaluator = %self.evaluator.id(),
            backend = %backend.name(),
            passed,
            "Compliance check decided"
        );
        Ok(ComplianceOutcome { passed, fom_result })
    }
}

impl<P> std::fmt::Debug for ComplianceCheck<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceCheck")
            .field("evaluator", &self.evaluator.id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::policy;
    use crate::test_utils::{CountingEvaluator, MockBackend, Program};

    #[tokio::test]
    async fn test_check_evaluates_once() {
        let backend = MockBackend::bell("mock");
        let evaluator = CountingEvaluator::scoring("chsh", 2.8);
        let calls = evaluator.calls();
        let check = ComplianceCheck::<Program>::new(evaluator, policy::above(2.7));

        let outcome = check.check(&backend, &RunOptions::new()).await.unwrap();

        assert!(outcome.passed);
        assert_eq!(outcome.fom_result.score(), Some(2.8));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_check_fails_on_low_score() {
        let backend = MockBackend::bell("mock");
        let check = ComplianceCheck::<Program>::new(
            CountingEvaluator::scoring("chsh", 2.5),
            policy::above(2.7),
        );

        let outcome = check.check(&backend, &RunOptions::new()).await.unwrap();
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn test_check_propagates_evaluation_error() {
        let backend = MockBackend::bell("mock");
        let check = ComplianceCheck::<Program>::new(
            CountingEvaluator::failing("t1", "no calibration"),
            policy::always(),
        );

        let err = check.check(&backend, &RunOptions::new()).await.unwrap_err();
        assert_eq!(err, GateError::evaluation("t1", "no calibration"));
    }

    #[tokio::test]
    async fn test_always_pass_with_empty_value() {
        let backend = MockBackend::bell("mock");
        let check = ComplianceCheck::<Program>::always_pass(crate::evaluators::AlwaysPass);

        let outcome = check.check(&backend, &RunOptions::new()).await.unwrap();
        assert!(outcome.passed);
        assert!(outcome.fom_result.value().is_none());
    }
}
