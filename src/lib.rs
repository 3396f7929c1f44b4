//! Merit Gate: conditional execution on noisy quantum backends.
//!
//! This crate runs a computation on a backend only when measured properties
//! of that backend meet a policy, and otherwise dispatches to an alternative
//! action. It is the measure, decide, act loop and nothing more: concrete
//! backend bindings, circuit representations and specific figures of merit
//! live outside it.
//!
//! # Overview
//!
//! - [`Backend`]: the two calls the gate needs from a backend, `introspect`
//!   and `run`
//! - [`MetricEvaluator`] / [`MetricResult`]: figures of merit, measured on
//!   demand
//! - [`ComplianceCheck`] / [`ComplianceOutcome`]: an evaluator paired with a
//!   [`Predicate`]
//! - [`Action`]: [`ComputationAction`] or [`CallbackAction`]
//! - [`run_conditionally`] / [`Orchestrator`]: the control loop
//! - [`GateError`] with a [`FailureStage`] per variant
//!
//! # Control flow
//!
//! ```text
//!   run_conditionally ──→ ComplianceCheck ──→ MetricEvaluator ──→ Backend
//!          │                  (in order, stop at first failure)
//!          └──→ on_pass | on_fail ──→ Backend
//! ```
//!
//! # Example
//!
//! ```ignore
//! use merit_gate::{policy, run_conditionally, CallbackAction, ComplianceCheck,
//!     ComputationAction, RunOptions};
//! use merit_gate::evaluators::Introspected;
//!
//! let checks = [ComplianceCheck::new(Introspected::min_t1(), policy::at_least(50.0))];
//! let on_pass = ComputationAction::new(my_circuit);
//! let on_fail = CallbackAction::skip();
//!
//! let result = run_conditionally(&backend, &checks, &on_pass, &on_fail,
//!     &RunOptions::new().with_shots(4096)).await?;
//! ```

pub mod action;
pub mod backend;
pub mod capability;
pub mod check;
pub mod config;
pub mod error;
pub mod evaluators;
pub mod metric;
pub mod orchestrator;
pub mod policy;
pub mod result;
pub mod test_utils;

pub use action::{Action, ActionFuture, ActionResult, CallbackAction, ComputationAction};
pub use backend::{Backend, BackendKind, DEFAULT_SHOTS, RunOptions, validate_shots};
pub use capability::{Calibration, Capabilities, NoiseProfile};
pub use check::{ComplianceCheck, ComplianceOutcome};
pub use config::{GateConfig, RetryConfig};
pub use error::{FailureStage, GateError, GateResult};
pub use metric::{MetricEvaluator, MetricMetadata, MetricResult, MetricValue, Properties};
pub use orchestrator::{Condition, ConditionalRun, Orchestrator, run_conditionally, run_with_report};
pub use policy::{Predicate, Threshold, ThresholdKind};
pub use result::{Counts, ExecutionResult, ExecutionTimestamps};
