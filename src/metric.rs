//! Figures of merit: the [`MetricEvaluator`] trait and its [`MetricResult`].
//!
//! An evaluator measures one property of a backend on demand. It may read
//! the capability snapshot, run characterization programs, or both. Whatever
//! it does, it ends in exactly one of two ways:
//!
//! - a fresh [`MetricResult`], or
//! - an error. [`GateError::EvaluationFailed`](crate::GateError::EvaluationFailed)
//!   when the data it needed was missing or malformed, or the backend's own
//!   error when a `run` or `introspect` call failed.
//!
//! An evaluator never returns a half-filled result, and it never invents a
//! value for data the backend could not supply.
//!
//! Running programs costs backend quota. Evaluators that do so document
//! how many runs they make.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, RunOptions};
use crate::error::GateResult;
use crate::result::ExecutionResult;

/// Open-ended, evaluator-defined key/value data attached to a result.
///
/// Each evaluator documents the keys it sets. The gate enforces none.
pub type Properties = FxHashMap<String, serde_json::Value>;

/// The headline value of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    /// A numeric score.
    Score(f64),
    /// A yes/no outcome.
    Flag(bool),
    /// A structured measurement.
    Measurement(serde_json::Value),
}

/// Where a [`MetricResult`] came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMetadata {
    /// Identity of the evaluator that produced the result.
    pub evaluator_id: String,
    /// Name of the backend that was measured.
    pub backend_id: String,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
}

/// Immutable record produced by one evaluation.
///
/// There are no setters. The `with_*` methods consume the value and are
/// meant for the evaluator assembling the result before it hands it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    value: Option<MetricValue>,
    properties: Properties,
    metadata: MetricMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution: Option<ExecutionResult>,
}

impl MetricResult {
    /// Create a result stamped with the current time.
    pub fn new(
        evaluator_id: impl Into<String>,
        backend_id: impl Into<String>,
        value: Option<MetricValue>,
    ) -> Self {
        Self {
            value,
            properties: Properties::default(),
            metadata: MetricMetadata {
                evaluator_id: evaluator_id.into(),
                backend_id: backend_id.into(),
                timestamp: Utc::now(),
            },
            execution: None,
        }
    }

    /// Result whose value is `score`, also recorded as the `score` property.
    pub fn scored(
        evaluator_id: impl Into<String>,
        backend_id: impl Into<String>,
        score: f64,
    ) -> Self {
        Self::new(evaluator_id, backend_id, Some(MetricValue::Score(score)))
            .with_property("score", serde_json::json!(score))
    }

    /// Add one property.
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Merge a set of properties, overwriting keys already present.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Attach the execution that backs this measurement.
    pub fn with_execution(mut self, execution: ExecutionResult) -> Self {
        self.execution = Some(execution);
        self
    }

    /// The headline value, if the evaluator computed one.
    pub fn value(&self) -> Option<&MetricValue> {
        self.value.as_ref()
    }

    /// The value as a number, when it is a [`MetricValue::Score`].
    pub fn score(&self) -> Option<f64> {
        match self.value {
            Some(MetricValue::Score(score)) => Some(score),
            _ => None,
        }
    }

    /// The value as a boolean, when it is a [`MetricValue::Flag`].
    pub fn flag(&self) -> Option<bool> {
        match self.value {
            Some(MetricValue::Flag(flag)) => Some(flag),
            _ => None,
        }
    }

    /// The value as structured data, when it is a [`MetricValue::Measurement`].
    pub fn measurement(&self) -> Option<&serde_json::Value> {
        match &self.value {
            Some(MetricValue::Measurement(data)) => Some(data),
            _ => None,
        }
    }

    /// All evaluator-defined properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// One property.
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Provenance of this result.
    pub fn metadata(&self) -> &MetricMetadata {
        &self.metadata
    }

    /// The characterization run behind this result, if any.
    pub fn execution(&self) -> Option<&ExecutionResult> {
        self.execution.as_ref()
    }
}

/// A measurable property of a backend.
#[async_trait]
pub trait MetricEvaluator<P>: Send + Sync {
    /// Stable identity, recorded in every result's metadata.
    fn id(&self) -> &str;

    /// Measure `backend`.
    ///
    /// Each call produces a new [`MetricResult`].
    async fn evaluate(
        &self,
        backend: &dyn Backend<P>,
        options: &RunOptions,
    ) -> GateResult<MetricResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_result_records_score_property() {
        let result = MetricResult::scored("packed_chsh", "aer", 2.5);
        assert_eq!(result.score(), Some(2.5));
        assert_eq!(result.property("score"), Some(&serde_json::json!(2.5)));
        assert_eq!(result.metadata().evaluator_id, "packed_chsh");
        assert_eq!(result.metadata().backend_id, "aer");
    }

    #[test]
    fn test_absent_value() {
        let result = MetricResult::new("always_pass", "aer", None)
            .with_property("message", serde_json::json!("no constraint applied"));
        assert!(result.value().is_none());
        assert!(result.score().is_none());
        assert!(result.flag().is_none());
    }

    #[test]
    fn test_non_numeric_value_has_no_score() {
        let result = MetricResult::new("bell", "aer", Some(MetricValue::Flag(true)));
        assert_eq!(result.flag(), Some(true));
        assert_eq!(result.score(), None);
    }

    #[test]
    fn test_structured_measurement() {
        let data = serde_json::json!({"E00": 0.71, "E01": 0.69, "E10": 0.70, "E11": -0.72});
        let result = MetricResult::new(
            "chsh_correlators",
            "aer",
            Some(MetricValue::Measurement(data.clone())),
        );
        assert_eq!(result.measurement(), Some(&data));
        assert_eq!(result.score(), None);
        assert_eq!(result.flag(), None);

        let json = serde_json::to_value(result.value().unwrap()).unwrap();
        assert_eq!(json["kind"], "measurement");
        assert_eq!(json["value"], data);
    }

    #[test]
    fn test_value_serialization_is_tagged() {
        let json = serde_json::to_value(MetricValue::Score(1.5)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "score", "value": 1.5}));
    }
}
