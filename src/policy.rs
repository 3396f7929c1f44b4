//! Decision predicates over metric results.
//!
//! A [`Predicate`] is a pure function `&MetricResult -> bool`. It is injected
//! into a [`ComplianceCheck`](crate::ComplianceCheck), never subclassed.
//!
//! # Absent values fail closed
//!
//! Every predicate built here returns `false` when the value it compares is
//! missing: no headline value, a value of the wrong kind, or a property that
//! is absent or not a number. It never panics. Hand-written predicates
//! should follow the same rule and test for presence before comparing,
//! which [`MetricResult::score`] and [`MetricResult::flag`] make natural
//! since both return `Option`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metric::MetricResult;

/// Decision rule turning a metric result into pass/fail.
pub type Predicate = Arc<dyn Fn(&MetricResult) -> bool + Send + Sync>;

/// Wrap a closure as a [`Predicate`].
pub fn predicate<F>(f: F) -> Predicate
where
    F: Fn(&MetricResult) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Comparison applied by a [`Threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    /// `score >= threshold`
    AtLeast,
    /// `score > threshold`
    Above,
    /// `score <= threshold`
    AtMost,
    /// `score < threshold`
    Below,
}

/// Numeric threshold on a result's score, loadable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// How the score is compared.
    pub kind: ThresholdKind,
    /// The bound.
    pub value: f64,
}

impl Threshold {
    /// Minimum acceptable value.
    pub fn at_least(value: f64) -> Self {
        Self {
            kind: ThresholdKind::AtLeast,
            value,
        }
    }

    /// Whether `score` satisfies the threshold. NaN never does.
    pub fn accepts(&self, score: f64) -> bool {
        match self.kind {
            ThresholdKind::AtLeast => score >= self.value,
            ThresholdKind::Above => score > self.value,
            ThresholdKind::AtMost => score <= self.value,
            ThresholdKind::Below => score < self.value,
        }
    }

    /// Predicate applying this threshold to a result's score.
    pub fn into_predicate(self) -> Predicate {
        predicate(move |result| result.score().is_some_and(|s| self.accepts(s)))
    }
}

/// Passes when the score is `>= threshold`.
pub fn at_least(threshold: f64) -> Predicate {
    Threshold::at_least(threshold).into_predicate()
}

/// Passes when the score is `> threshold`.
pub fn above(threshold: f64) -> Predicate {
    Threshold {
        kind: ThresholdKind::Above,
        value: threshold,
    }
    .into_predicate()
}

/// Passes when the score is `<= threshold`.
pub fn at_most(threshold: f64) -> Predicate {
    Threshold {
        kind: ThresholdKind::AtMost,
        value: threshold,
    }
    .into_predicate()
}

/// Passes when the score is `< threshold`.
pub fn below(threshold: f64) -> Predicate {
    Threshold {
        kind: ThresholdKind::Below,
        value: threshold,
    }
    .into_predicate()
}

/// Passes when the value is the boolean `expected`.
pub fn flag_is(expected: bool) -> Predicate {
    predicate(move |result| result.flag() == Some(expected))
}

/// Passes when numeric property `key` is `>= threshold`.
pub fn property_at_least(key: impl Into<String>, threshold: f64) -> Predicate {
    let key = key.into();
    predicate(move |result| {
        result
            .property(&key)
            .and_then(serde_json::Value::as_f64)
            .is_some_and(|v| v >= threshold)
    })
}

/// Passes unconditionally, whatever the result holds.
pub fn always() -> Predicate {
    predicate(|_| true)
}
