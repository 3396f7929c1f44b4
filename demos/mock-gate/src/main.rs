//! Conditional execution against two in-memory backends.
//!
//! A healthy device passes both checks and runs the payload; a degraded
//! device fails the coherence check and takes the fallback branch.
//! Set `RUST_LOG=debug` to watch each check decide.

use std::sync::Mutex;

use async_trait::async_trait;
use merit_gate::evaluators::{CircuitEvaluator, Introspected, Retrying};
use merit_gate::{
    ActionResult, Backend, BackendKind, Calibration, CallbackAction, Capabilities,
    ComplianceCheck, ComputationAction, Counts, ExecutionResult, GateConfig, GateError,
    GateResult, Orchestrator, Properties, RunOptions, policy,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// A simple program type for demonstration.
struct SimpleCircuit {
    name: String,
    num_qubits: u32,
}

impl SimpleCircuit {
    fn new(name: &str, num_qubits: u32) -> Self {
        Self {
            name: name.to_string(),
            num_qubits,
        }
    }
}

/// In-memory device whose readout flips a fixed fraction of shots.
struct MockDevice {
    capabilities: Capabilities,
    flip_rate: f64,
    next_id: Mutex<u64>,
}

impl MockDevice {
    fn new(name: &str, t1: f64, flip_rate: f64) -> Self {
        let calibration = Calibration::from_qubits((0..4).map(|q| (q, t1 + f64::from(q), t1 * 0.8)));
        Self {
            capabilities: Capabilities::device(name, 4, 20_000).with_calibration(calibration),
            flip_rate,
            next_id: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Backend<SimpleCircuit> for MockDevice {
    fn name(&self) -> &str {
        &self.capabilities.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    async fn introspect(&self) -> GateResult<Capabilities> {
        Ok(self.capabilities.clone())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn run(
        &self,
        circuit: &SimpleCircuit,
        shots: u32,
        _options: &RunOptions,
    ) -> GateResult<ExecutionResult> {
        if let Some(max) = self.capabilities.max_shots {
            if shots > max {
                return Err(GateError::ExecutionFailed(format!(
                    "{} accepts at most {max} shots, got {shots}",
                    self.name()
                )));
            }
        }
        if circuit.num_qubits == 0 {
            return Err(GateError::ExecutionFailed(format!(
                "circuit `{}` measures no qubits",
                circuit.name
            )));
        }

        let id = {
            let mut next = self
                .next_id
                .lock()
                .map_err(|_| GateError::ExecutionFailed("job counter poisoned".into()))?;
            *next += 1;
            format!("mock-{}", *next)
        };

        let flipped = (f64::from(shots) * self.flip_rate).round() as u64;
        let kept = u64::from(shots) - flipped;
        let width = circuit.num_qubits as usize;
        let mut counts = Counts::new();
        counts.insert("0".repeat(width), kept / 2);
        counts.insert("1".repeat(width), kept - kept / 2);
        counts.insert(format!("{}1", "0".repeat(width - 1)), flipped);

        Ok(ExecutionResult::new(self.name(), counts, shots)
            .with_raw(serde_json::json!({"job_id": id, "program": circuit.name})))
    }
}

/// Fraction of shots that landed in all-zeros or all-ones.
#[allow(clippy::cast_precision_loss)]
fn ghz_parity(counts: &Counts) -> Result<(f64, Properties), String> {
    let total = counts.total_shots();
    if total == 0 {
        return Err("no shots recorded".into());
    }
    let width = counts
        .iter()
        .next()
        .map(|(bits, _)| bits.len())
        .ok_or("no bitstrings recorded")?;
    let correlated = counts.get(&"0".repeat(width)) + counts.get(&"1".repeat(width));
    let mut properties = Properties::default();
    properties.insert("correlated_shots".into(), serde_json::json!(correlated));
    Ok((correlated as f64 / total as f64, properties))
}

fn build_gate(config: &GateConfig) -> Orchestrator<SimpleCircuit> {
    let fallback = CallbackAction::<SimpleCircuit>::from_fn(|backend, results, _| {
        for result in results {
            warn!(
                backend = %backend.name(),
                evaluator = %result.metadata().evaluator_id,
                score = ?result.score(),
                "Backend below policy, skipping payload"
            );
        }
        Ok(ActionResult::NotPerformed)
    });

    Orchestrator::new(
        ComputationAction::new(SimpleCircuit::new("payload", 4)),
        fallback,
    )
    .with_check(ComplianceCheck::new(
        Introspected::min_t1(),
        policy::at_least(50.0),
    ))
    .with_check(ComplianceCheck::new(
        Retrying::from_config(
            CircuitEvaluator::new("ghz_parity", SimpleCircuit::new("ghz", 4), ghz_parity),
            &config.retry,
        ),
        policy::above(0.9),
    ))
}

/// Initialize logging with tracing.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GateConfig::load()?;
    init_logging(&config.log_level);

    let gate = build_gate(&config);
    let options = RunOptions::from_config(&config);

    let backends = [
        MockDevice::new("healthy-device", 120.0, 0.02),
        MockDevice::new("degraded-device", 35.0, 0.20),
    ];

    for backend in &backends {
        let run = gate.run_with_report(backend, &options).await?;
        info!(backend = %backend.name(), condition = %run.condition, "Gate decided");

        for outcome in &run.outcomes {
            println!(
                "{:<16} {:<12} passed={:<5} score={:?}",
                backend.name(),
                outcome.fom_result.metadata().evaluator_id,
                outcome.passed,
                outcome.fom_result.score()
            );
        }

        match run.result.execution() {
            Some(execution) => {
                println!("{:<16} payload ran with {} shots:", backend.name(), execution.shots);
                for (bitstring, count) in execution.counts.sorted() {
                    println!("  {bitstring}: {count}");
                }
            }
            None => println!("{:<16} payload skipped", backend.name()),
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_gate::FailureStage;

    #[tokio::test]
    async fn test_device_rejects_excess_shots_as_execution_failure() {
        let device = MockDevice::new("dev", 100.0, 0.0);
        let err = device
            .run(&SimpleCircuit::new("ghz", 4), 20_001, &RunOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), FailureStage::Execution);
    }

    #[tokio::test]
    async fn test_device_rejects_empty_circuit() {
        let device = MockDevice::new("dev", 100.0, 0.0);
        let err = device
            .run(&SimpleCircuit::new("empty", 0), 10, &RunOptions::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GateError::ExecutionFailed("circuit `empty` measures no qubits".into())
        );
    }

    #[tokio::test]
    async fn test_gate_routes_devices_by_coherence() {
        let gate = build_gate(&GateConfig::default());
        let options = RunOptions::new().with_shots(1000);

        let healthy = MockDevice::new("healthy", 120.0, 0.02);
        let run = gate.run_with_report(&healthy, &options).await.unwrap();
        assert!(run.result.is_executed());

        let degraded = MockDevice::new("degraded", 35.0, 0.20);
        let run = gate.run_with_report(&degraded, &options).await.unwrap();
        assert_eq!(run.result, ActionResult::NotPerformed);
        assert_eq!(run.outcomes.len(), 1);
    }
}
