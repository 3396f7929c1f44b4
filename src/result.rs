//! Execution result types.
//!
//! Bitstring ordering: the rightmost bit corresponds to the
//! lowest-indexed qubit. The string `"01"` means qubit 0 measured `1`
//! and qubit 1 measured `0`.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Measurement counts from one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts {
    counts: FxHashMap<String, u64>,
}

impl Counts {
    /// Create empty counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create counts from (bitstring, count) pairs.
    /// Duplicate bitstrings are summed, consistent with `insert()`.
    pub fn from_pairs(iter: impl IntoIterator<Item = (impl Into<String>, u64)>) -> Self {
        let mut counts = Self::new();
        for (k, v) in iter {
            counts.insert(k, v);
        }
        counts
    }

    /// Add `count` observations of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.counts.entry(bitstring.into()).or_default() += count;
    }

    /// Count for a bitstring, zero if never observed.
    pub fn get(&self, bitstring: &str) -> u64 {
        self.counts.get(bitstring).copied().unwrap_or(0)
    }

    /// Iterate over (bitstring, count) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.counts.iter()
    }

    /// Total number of recorded shots.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Relative frequency of each bitstring.
    #[allow(clippy::cast_precision_loss)]
    pub fn probabilities(&self) -> FxHashMap<String, f64> {
        let total = self.total_shots() as f64;
        if total == 0.0 {
            return FxHashMap::default();
        }
        self.counts
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total))
            .collect()
    }

    /// Counts sorted by bitstring, for stable display.
    pub fn sorted(&self) -> Vec<(&String, &u64)> {
        let mut items: Vec<_> = self.counts.iter().collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        items
    }

    /// Number of distinct bitstrings observed.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Wall-clock milestones of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTimestamps {
    /// When the program was handed to the backend.
    pub created: DateTime<Utc>,
    /// When the backend reported completion, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
}

impl ExecutionTimestamps {
    /// Timestamps for a run created now and not yet finished.
    pub fn now() -> Self {
        Self {
            created: Utc::now(),
            finished: None,
        }
    }
}

/// Immutable record of one execution on a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Measurement counts.
    pub counts: Counts,
    /// Number of shots executed.
    pub shots: u32,
    /// Name of the backend that ran the program.
    pub backend: String,
    /// When the execution happened.
    pub timestamps: ExecutionTimestamps,
    /// Vendor-specific payload, passed through untouched.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl ExecutionResult {
    /// Create a result stamped with the current time.
    pub fn new(backend: impl Into<String>, counts: Counts, shots: u32) -> Self {
        Self {
            counts,
            shots,
            backend: backend.into(),
            timestamps: ExecutionTimestamps::now(),
            raw: serde_json::Value::Null,
        }
    }

    /// Replace the timestamps.
    pub fn with_timestamps(mut self, timestamps: ExecutionTimestamps) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Attach the vendor payload.
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// Relative frequency of each bitstring.
    pub fn probabilities(&self) -> FxHashMap<String, f64> {
        self.counts.probabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let mut counts = Counts::new();
        counts.insert("00", 40);
        counts.insert("11", 50);
        counts.insert("00", 10);

        assert_eq!(counts.get("00"), 50);
        assert_eq!(counts.get("01"), 0);
        assert_eq!(counts.total_shots(), 100);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_counts_probabilities() {
        let counts = Counts::from_pairs([("00", 30), ("01", 20), ("10", 30), ("11", 20)]);
        let probs = counts.probabilities();
        assert!((probs["00"] - 0.3).abs() < 1e-10);
        assert!((probs["01"] - 0.2).abs() < 1e-10);
        assert!(Counts::new().probabilities().is_empty());
    }

    #[test]
    fn test_counts_serialize_as_plain_map() {
        let counts = Counts::from_pairs([("00", 50), ("11", 50)]);
        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json, serde_json::json!({"00": 50, "11": 50}));
    }

    #[test]
    fn test_execution_result_passes_raw_payload_through() {
        let counts = Counts::from_pairs([("00", 512), ("11", 512)]);
        let raw = serde_json::json!({"job": "abc", "quasi_dists": [[0.5, 0.5]]});
        let result = ExecutionResult::new("aer", counts, 1024).with_raw(raw.clone());

        assert_eq!(result.backend, "aer");
        assert_eq!(result.raw, raw);
        assert!(result.timestamps.finished.is_none());
    }
}
