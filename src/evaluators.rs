//! Reusable, metric-agnostic evaluators.
//!
//! | Evaluator | Reads | Backend runs per evaluation |
//! |-----------|-------|-----------------------------|
//! | [`AlwaysPass`] | nothing | 0 |
//! | [`Introspected`] | capability snapshot | 0 |
//! | [`CircuitEvaluator`] | counts of one characterization program | 1 |
//! | [`Aggregate`] | scores of its sub-metrics | sum of its parts |
//! | [`Retrying`] | whatever it wraps | up to `max_attempts` times its inner cost |
//!
//! Concrete figures of merit (CHSH tests, coherence estimates and so on)
//! are built from these or implement [`MetricEvaluator`] directly.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::{Backend, RunOptions};
use crate::capability::Capabilities;
use crate::config::RetryConfig;
use crate::error::{GateError, GateResult};
use crate::metric::{MetricEvaluator, MetricResult, MetricValue, Properties};
use crate::result::Counts;

/// Evaluator that measures nothing.
///
/// Produces a result with no value and a `message` property. Pair it with
/// [`policy::always`](crate::policy::always) for an unconditional gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPass;

#[async_trait]
impl<P> MetricEvaluator<P> for AlwaysPass {
    fn id(&self) -> &str {
        "always_pass"
    }

    async fn evaluate(
        &self,
        backend: &dyn Backend<P>,
        _options: &RunOptions,
    ) -> GateResult<MetricResult> {
        Ok(MetricResult::new("always_pass", backend.name(), None)
            .with_property("message", serde_json::json!("No constraint applied.")))
    }
}

type CapabilityScore = Box<dyn Fn(&Capabilities) -> Option<f64> + Send + Sync>;

/// Scores a backend from its capability snapshot alone.
///
/// Properties: `score`, plus `is_simulator` when the snapshot reports it.
pub struct Introspected {
    id: String,
    requires: String,
    score: CapabilityScore,
}

impl Introspected {
    /// `score` returns `None` when the snapshot lacks what it needs; the
    /// evaluation then fails naming `requires`.
    pub fn new<F>(id: impl Into<String>, requires: impl Into<String>, score: F) -> Self
    where
        F: Fn(&Capabilities) -> Option<f64> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            requires: requires.into(),
            score: Box::new(score),
        }
    }

    /// Number of qubits the backend reports.
    pub fn qubit_count() -> Self {
        Self::new("qubit_count", "qubit count", |caps| {
            caps.num_qubits.map(f64::from)
        })
    }

    /// Smallest per-qubit T1, in microseconds.
    pub fn min_t1() -> Self {
        Self::new("min_t1", "per-qubit T1 calibration", Capabilities::min_t1)
    }

    /// Smallest per-qubit T2, in microseconds.
    pub fn min_t2() -> Self {
        Self::new("min_t2", "per-qubit T2 calibration", Capabilities::min_t2)
    }

    /// Device-wide average readout fidelity.
    pub fn readout_fidelity() -> Self {
        Self::new("readout_fidelity", "readout fidelity", |caps| {
            caps.noise_profile.as_ref()?.readout_fidelity
        })
    }

    /// Device-wide average two-qubit gate fidelity.
    pub fn two_qubit_fidelity() -> Self {
        Self::new("two_qubit_fidelity", "two-qubit gate fidelity", |caps| {
            caps.noise_profile.as_ref()?.two_qubit_fidelity
        })
    }
}

#[async_trait]
impl<P> MetricEvaluator<P> for Introspected {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(
        &self,
        backend: &dyn Backend<P>,
        _options: &RunOptions,
    ) -> GateResult<MetricResult> {
        let caps = backend.introspect().await?;
        let score = (self.score)(&caps).ok_or_else(|| {
            GateError::evaluation(
                &self.id,
                format!("backend `{}` did not report {}", backend.name(), self.requires),
            )
        })?;
        let mut result = MetricResult::scored(&self.id, backend.name(), score);
        if let Some(is_simulator) = caps.is_simulator {
            result = result.with_property("is_simulator", serde_json::json!(is_simulator));
        }
        Ok(result)
    }
}

type CountsScore = Box<dyn Fn(&Counts) -> Result<(f64, Properties), String> + Send + Sync>;

/// Runs one characterization program and scores its counts.
///
/// Each evaluation costs one backend run with the option-provided shots.
/// The scorer returns the score plus any extra properties, or a reason the
/// counts could not be scored. The execution is attached to the result.
pub struct CircuitEvaluator<P> {
    id: String,
    program: P,
    score: CountsScore,
}

impl<P> CircuitEvaluator<P> {
    /// Evaluate `program` with `score`.
    pub fn new<F>(id: impl Into<String>, program: P, score: F) -> Self
    where
        F: Fn(&Counts) -> Result<(f64, Properties), String> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            program,
            score: Box::new(score),
        }
    }
}

#[async_trait]
impl<P: Send + Sync> MetricEvaluator<P> for CircuitEvaluator<P> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(
        &self,
        backend: &dyn Backend<P>,
        options: &RunOptions,
    ) -> GateResult<MetricResult> {
        let shots = options.shots()?;
        debug!(evaluator = %self.id, backend = %backend.name(), shots, "Running characterization");
        let execution = backend.run(&self.program, shots, options).await?;
        if execution.counts.is_empty() {
            return Err(GateError::evaluation(&self.id, "backend returned no counts"));
        }
        let (score, properties) = (self.score)(&execution.counts)
            .map_err(|reason| GateError::evaluation(&self.id, reason))?;
        Ok(
            MetricResult::new(&self.id, backend.name(), Some(MetricValue::Score(score)))
                .with_properties(properties)
                .with_property("score", serde_json::json!(score))
                .with_execution(execution),
        )
    }
}

type Combine = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Composite metric built from scored sub-metrics.
///
/// Sub-metrics are evaluated in order. If one fails with
/// [`GateError::EvaluationFailed`] or yields no score, the aggregate fails
/// as a whole and the reason names that sub-metric. Backend and execution
/// errors are returned unchanged.
///
/// Properties: `score`, plus `components` mapping each sub-metric id to its
/// score.
pub struct Aggregate<P> {
    id: String,
    parts: Vec<Box<dyn MetricEvaluator<P>>>,
    combine: Combine,
}

impl<P> Aggregate<P> {
    /// Aggregate combining sub-scores with `combine`.
    pub fn new<F>(id: impl Into<String>, combine: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            parts: Vec::new(),
            combine: Box::new(combine),
        }
    }

    /// Sum of sub-scores.
    pub fn sum(id: impl Into<String>) -> Self {
        Self::new(id, |scores| scores.iter().sum())
    }

    /// Arithmetic mean of sub-scores.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(id: impl Into<String>) -> Self {
        Self::new(id, |scores| {
            scores.iter().sum::<f64>() / scores.len() as f64
        })
    }

    /// Smallest sub-score.
    pub fn min(id: impl Into<String>) -> Self {
        Self::new(id, |scores| scores.iter().copied().fold(f64::INFINITY, f64::min))
    }

    /// Append a sub-metric.
    pub fn with(mut self, evaluator: impl MetricEvaluator<P> + 'static) -> Self {
        self.parts.push(Box::new(evaluator));
        self
    }
}

#[async_trait]
impl<P> MetricEvaluator<P> for Aggregate<P> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(
        &self,
        backend: &dyn Backend<P>,
        options: &RunOptions,
    ) -> GateResult<MetricResult> {
        if self.parts.is_empty() {
            return Err(GateError::evaluation(&self.id, "no sub-metrics configured"));
        }

        let mut scores = Vec::with_capacity(self.parts.len());
        let mut components = serde_json::Map::new();
        for part in &self.parts {
            let result = match part.evaluate(backend, options).await {
                Ok(result) => result,
                Err(GateError::EvaluationFailed { evaluator, reason }) => {
                    let reason = if evaluator == part.id() {
                        reason
                    } else {
                        format!("{evaluator}: {reason}")
                    };
                    return Err(GateError::evaluation(
                        &self.id,
                        format!("sub-metric `{}` failed: {reason}", part.id()),
                    ));
                }
                Err(err) => return Err(err),
            };
            let score = result.score().ok_or_else(|| {
                GateError::evaluation(
                    &self.id,
                    format!("sub-metric `{}` produced no score", part.id()),
                )
            })?;
            scores.push(score);
            components.insert(part.id().to_string(), serde_json::json!(score));
        }

        let score = (self.combine)(&scores);
        Ok(MetricResult::scored(&self.id, backend.name(), score)
            .with_property("components", serde_json::Value::Object(components)))
    }
}

/// Retries a wrapped evaluator on transient backend errors.
///
/// Only [`GateError::is_transient`] errors are retried, after a fixed
/// backoff. Everything else, and the last transient error, is returned
/// unchanged.
pub struct Retrying<P> {
    inner: Box<dyn MetricEvaluator<P>>,
    max_attempts: u32,
    backoff: Duration,
}

impl<P> Retrying<P> {
    /// Wrap `inner`, trying at most `max_attempts` times (at least once).
    pub fn new(
        inner: impl MetricEvaluator<P> + 'static,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            inner: Box::new(inner),
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Wrap `inner` with the configured retry policy.
    pub fn from_config(inner: impl MetricEvaluator<P> + 'static, config: &RetryConfig) -> Self {
        Self::new(
            inner,
            config.max_attempts,
            Duration::from_millis(config.backoff_ms),
        )
    }
}

#[async_trait]
impl<P> MetricEvaluator<P> for Retrying<P> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn evaluate(
        &self,
        backend: &dyn Backend<P>,
        options: &RunOptions,
    ) -> GateResult<MetricResult> {
        let mut attempt = 1;
        loop {
            match self.inner.evaluate(backend, options).await {
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        evaluator = %self.inner.id(),
                        attempt,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
