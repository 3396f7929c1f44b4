//! Shared test utilities: a scripted backend and instrumented evaluators
//! and actions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::action::{Action, ActionResult};
use crate::backend::{Backend, BackendKind, RunOptions};
use crate::capability::Capabilities;
use crate::error::{GateError, GateResult};
use crate::metric::{MetricEvaluator, MetricResult};
use crate::result::{Counts, ExecutionResult, ExecutionTimestamps};

/// Named stand-in for a real program representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
}

impl Program {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// Deterministic in-memory backend.
///
/// Without fixed counts, a run splits its shots evenly between `"00"` and
/// `"11"`. Execution timestamps are fixed so repeated runs compare equal.
pub struct MockBackend {
    name: String,
    capabilities: Capabilities,
    counts: Option<Counts>,
    offline: bool,
    failing_runs: bool,
    executed: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Simulated two-qubit Bell-state backend.
    pub fn bell(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Capabilities::simulator(name, 2),
            counts: None,
            offline: false,
            failing_runs: false,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Replace the capability snapshot.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Return these counts from every run, whatever the shots.
    pub fn with_counts(mut self, counts: Counts) -> Self {
        self.counts = Some(counts);
        self
    }

    /// Make every call fail with `BackendUnavailable`.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Make every run fail with `ExecutionFailed`.
    pub fn failing_runs(mut self) -> Self {
        self.failing_runs = true;
        self
    }

    /// Number of successful runs so far.
    pub fn runs(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    /// Names of the programs run so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn fixed_timestamps() -> ExecutionTimestamps {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        ExecutionTimestamps {
            created: at,
            finished: Some(at),
        }
    }
}

#[async_trait]
impl Backend<Program> for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    async fn introspect(&self) -> GateResult<Capabilities> {
        if self.offline {
            return Err(GateError::BackendUnavailable(format!("{} is offline", self.name)));
        }
        Ok(self.capabilities.clone())
    }

    async fn run(
        &self,
        program: &Program,
        shots: u32,
        _options: &RunOptions,
    ) -> GateResult<ExecutionResult> {
        if self.offline {
            return Err(GateError::BackendUnavailable(format!("{} is offline", self.name)));
        }
        if self.failing_runs {
            return Err(GateError::ExecutionFailed(format!(
                "{} rejected {}",
                self.name, program.name
            )));
        }

        let counts = self.counts.clone().unwrap_or_else(|| {
            Counts::from_pairs([("00", u64::from(shots / 2)), ("11", u64::from(shots - shots / 2))])
        });
        self.executed.lock().unwrap().push(program.name.clone());

        Ok(ExecutionResult::new(&self.name, counts, shots)
            .with_timestamps(Self::fixed_timestamps())
            .with_raw(serde_json::json!({"program": program.name})))
    }
}

/// Shared invocation counter.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

enum Behavior {
    Score(f64),
    Fail(String),
}

/// Evaluator with a fixed answer that counts its invocations.
pub struct CountingEvaluator {
    id: String,
    behavior: Behavior,
    unavailable_for: usize,
    calls: CallCounter,
}

impl CountingEvaluator {
    /// Always produces `score`.
    pub fn scoring(id: &str, score: f64) -> Self {
        Self {
            id: id.to_string(),
            behavior: Behavior::Score(score),
            unavailable_for: 0,
            calls: CallCounter::default(),
        }
    }

    /// Always fails with `EvaluationFailed`.
    pub fn failing(id: &str, reason: &str) -> Self {
        Self {
            id: id.to_string(),
            behavior: Behavior::Fail(reason.to_string()),
            unavailable_for: 0,
            calls: CallCounter::default(),
        }
    }

    /// Fail the first `attempts` calls with `BackendUnavailable`.
    pub fn unavailable_for(mut self, attempts: usize) -> Self {
        self.unavailable_for = attempts;
        self
    }

    /// Counter shared with this evaluator.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl<P> MetricEvaluator<P> for CountingEvaluator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(
        &self,
        backend: &dyn Backend<P>,
        _options: &RunOptions,
    ) -> GateResult<MetricResult> {
        if self.calls.bump() < self.unavailable_for {
            return Err(GateError::BackendUnavailable(format!(
                "{} is busy",
                backend.name()
            )));
        }
        match &self.behavior {
            Behavior::Score(score) => Ok(MetricResult::scored(&self.id, backend.name(), *score)),
            Behavior::Fail(reason) => Err(GateError::evaluation(&self.id, reason.as_str())),
        }
    }
}

/// Action that records the evidence it receives and returns a fixed result.
#[derive(Clone)]
pub struct RecordingAction {
    result: ActionResult,
    calls: CallCounter,
    seen: Arc<Mutex<Vec<Vec<MetricResult>>>>,
}

impl RecordingAction {
    pub fn returning(result: ActionResult) -> Self {
        Self {
            result,
            calls: CallCounter::default(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Results received by the most recent invocation.
    pub fn last_results(&self) -> Option<Vec<MetricResult>> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl<P> Action<P> for RecordingAction {
    async fn run(
        &self,
        _backend: &dyn Backend<P>,
        results: &[MetricResult],
        _options: &RunOptions,
    ) -> GateResult<ActionResult> {
        self.calls.bump();
        self.seen.lock().unwrap().push(results.to_vec());
        Ok(self.result.clone())
    }
}
