//! The measure, decide, act control loop.
//!
//! ```text
//!   check[0] ──pass──→ check[1] ──pass──→ … ──pass──→ on_pass(results)
//!      │                  │
//!      fail               fail
//!      └──────────────────┴───────────────────────────→ on_fail(results)
//! ```
//!
//! **Invariants:**
//! - Checks run in order, one at a time. The first failing check ends
//!   evaluation; later checks are never evaluated.
//! - The chosen action receives one [`MetricResult`] per evaluated check, in
//!   evaluation order, the failing one last.
//! - An empty check list passes vacuously: `on_pass` runs with no results.
//! - Any error from a check aborts the run before either action is invoked.
//!   An unmeasurable check is not a failed check.
//! - Exactly one action runs per successful call, and its result is
//!   returned as is.
//!
//! Nothing here retries, spawns, locks or imposes a deadline.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::{Action, ActionResult};
use crate::backend::{Backend, RunOptions};
use crate::check::{ComplianceCheck, ComplianceOutcome};
use crate::error::GateResult;
use crate::metric::MetricResult;

/// Which branch a conditional run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Every check passed; `on_pass` ran.
    Pass,
    /// A check failed; `on_fail` ran.
    Fail,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Pass => write!(f, "pass"),
            Condition::Fail => write!(f, "fail"),
        }
    }
}

/// Full account of one conditional run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRun {
    /// Branch taken.
    pub condition: Condition,
    /// Outcome of every evaluated check, in evaluation order.
    pub outcomes: Vec<ComplianceOutcome>,
    /// What the chosen action returned.
    pub result: ActionResult,
}

impl ConditionalRun {
    /// Metric results handed to the action.
    pub fn metric_results(&self) -> impl Iterator<Item = &MetricResult> {
        self.outcomes.iter().map(|o| &o.fom_result)
    }
}

/// Run `checks` against `backend`, then `on_pass` or `on_fail`.
///
/// Returns exactly what the invoked action returned. See the
/// [module docs](self) for the evaluation rules.
pub async fn run_conditionally<P>(
    backend: &dyn Backend<P>,
    checks: &[ComplianceCheck<P>],
    on_pass: &dyn Action<P>,
    on_fail: &dyn Action<P>,
    options: &RunOptions,
) -> GateResult<ActionResult> {
    let run = run_with_report(backend, checks, on_pass, on_fail, options).await?;
    Ok(run.result)
}

/// Like [`run_conditionally`], also reporting the branch and every outcome.
pub async fn run_with_report<P>(
    backend: &dyn Backend<P>,
    checks: &[ComplianceCheck<P>],
    on_pass: &dyn Action<P>,
    on_fail: &dyn Action<P>,
    options: &RunOptions,
) -> GateResult<ConditionalRun> {
    let (condition, outcomes) = evaluate_checks(backend, checks, options).await?;
    let results: Vec<MetricResult> = outcomes.iter().map(|o| o.fom_result.clone()).collect();

    info!(
        backend = %backend.name(),
        kind = %backend.kind(),
        %condition,
        evaluated = outcomes.len(),
        total = checks.len(),
        "Dispatching action"
    );
    let action = match condition {
        Condition::Pass => on_pass,
        Condition::Fail => on_fail,
    };
    let result = action.run(backend, &results, options).await?;

    Ok(ConditionalRun {
        condition,
        outcomes,
        result,
    })
}

/// Evaluate checks in order, stopping at the first failure.
async fn evaluate_checks<P>(
    backend: &dyn Backend<P>,
    checks: &[ComplianceCheck<P>],
    options: &RunOptions,
) -> GateResult<(Condition, Vec<ComplianceOutcome>)> {
    if checks.is_empty() {
        debug!(backend = %backend.name(), "No checks configured, passing vacuously");
        return Ok((Condition::Pass, Vec::new()));
    }

    let mut outcomes = Vec::with_capacity(checks.len());
    for (index, check) in checks.iter().enumerate() {
        let outcome = check.check(backend, options).await?;
        let passed = outcome.passed;
        outcomes.push(outcome);
        if !passed {
            info!(
                backend = %backend.name(),
                evaluator = %check.evaluator_id(),
                index,
                skipped = checks.len() - index - 1,
                "Compliance check failed"
            );
            return Ok((Condition::Fail, outcomes));
        }
    }
    Ok((Condition::Pass, outcomes))
}

/// A reusable gate: a fixed check list and its two actions.
pub struct Orchestrator<P> {
    checks: Vec<ComplianceCheck<P>>,
    on_pass: Box<dyn Action<P>>,
    on_fail: Box<dyn Action<P>>,
}

impl<P> Orchestrator<P> {
    /// Gate with no checks yet.
    pub fn new(on_pass: impl Action<P> + 'static, on_fail: impl Action<P> + 'static) -> Self {
        Self {
            checks: Vec::new(),
            on_pass: Box::new(on_pass),
            on_fail: Box::new(on_fail),
        }
    }

    /// Append a check. Checks run in the order they were added.
    pub fn with_check(mut self, check: ComplianceCheck<P>) -> Self {
        self.checks.push(check);
        self
    }

    /// The configured checks, in evaluation order.
    pub fn checks(&self) -> &[ComplianceCheck<P>] {
        &self.checks
    }

    /// Run the gate against `backend`.
    pub async fn run(
        &self,
        backend: &dyn Backend<P>,
        options: &RunOptions,
    ) -> GateResult<ActionResult> {
        run_conditionally(
            backend,
            &self.checks,
            self.on_pass.as_ref(),
            self.on_fail.as_ref(),
            options,
        )
        .await
    }

    /// Run the gate and report the branch and outcomes.
    pub async fn run_with_report(
        &self,
        backend: &dyn Backend<P>,
        options: &RunOptions,
    ) -> GateResult<ConditionalRun> {
        run_with_report(
            backend,
            &self.checks,
            self.on_pass.as_ref(),
            self.on_fail.as_ref(),
            options,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::CallbackAction;
    use crate::policy;
    use crate::test_utils::{CountingEvaluator, MockBackend, Program};

    fn tagging_action(tag: &'static str) -> CallbackAction<Program> {
        CallbackAction::from_fn(move |_, _, _| {
            Ok(ActionResult::Executed(crate::ExecutionResult::new(
                tag,
                crate::Counts::new(),
                1,
            )))
        })
    }

    #[tokio::test]
    async fn test_report_records_branch_and_outcomes() {
        let backend = MockBackend::bell("mock");
        let gate = Orchestrator::new(tagging_action("pass"), tagging_action("fail"))
            .with_check(ComplianceCheck::new(
                CountingEvaluator::scoring("a", 3.0),
                policy::above(2.7),
            ))
            .with_check(ComplianceCheck::new(
                CountingEvaluator::scoring("b", 1.0),
                policy::above(2.7),
            ));

        let run = gate.run_with_report(&backend, &RunOptions::new()).await.unwrap();

        assert_eq!(run.condition, Condition::Fail);
        assert_eq!(run.outcomes.len(), 2);
        assert!(run.outcomes[0].passed);
        assert!(!run.outcomes[1].passed);
        assert_eq!(run.result.execution().map(|e| e.backend.as_str()), Some("fail"));
        let ids: Vec<_> = run
            .metric_results()
            .map(|r| r.metadata().evaluator_id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_gate_reports_pass() {
        let backend = MockBackend::bell("mock");
        let gate = Orchestrator::new(tagging_action("pass"), tagging_action("fail"));

        let run = gate.run_with_report(&backend, &RunOptions::new()).await.unwrap();

        assert_eq!(run.condition, Condition::Pass);
        assert!(run.outcomes.is_empty());
        assert!(gate.checks().is_empty());
    }

    #[test]
    fn test_condition_display() {
        assert_eq!(Condition::Pass.to_string(), "pass");
        assert_eq!(Condition::Fail.to_string(), "fail");
    }
}
