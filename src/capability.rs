//! Backend capability snapshots.
//!
//! A [`Capabilities`] value is what [`Backend::introspect`](crate::Backend::introspect)
//! returns: read-only facts about a backend that evaluators can score
//! without executing anything.
//!
//! Backends differ wildly in what they can report. A local simulator has no
//! calibration data at all; a cloud device may expose per-qubit T1/T2 but no
//! readout fidelity. Every field other than `name` is therefore optional,
//! and an absent field stays `None`. It is never filled with a zero or any
//! other stand-in value.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Capability snapshot of a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Name of the backend.
    pub name: String,
    /// Number of qubits available, if the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_qubits: Option<u32>,
    /// Maximum number of shots per run, if bounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_shots: Option<u32>,
    /// Whether this is a simulator (not real hardware), if the backend says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_simulator: Option<bool>,
    /// Per-qubit calibration data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<Calibration>,
    /// Device-wide noise averages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_profile: Option<NoiseProfile>,
}

impl Capabilities {
    /// Snapshot that knows nothing but the backend name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_qubits: None,
            max_shots: None,
            is_simulator: None,
            calibration: None,
            noise_profile: None,
        }
    }

    /// Create capabilities for an ideal simulator.
    ///
    /// Simulators carry no calibration: coherence is not limited, so the
    /// T1/T2 maps are left absent rather than filled with infinities.
    /// No shot limit is assumed; attach one to `max_shots` if the simulator
    /// reports it.
    pub fn simulator(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits: Some(num_qubits),
            max_shots: None,
            is_simulator: Some(true),
            calibration: None,
            noise_profile: None,
        }
    }

    /// Create capabilities for a remote hardware device.
    pub fn device(name: impl Into<String>, num_qubits: u32, max_shots: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits: Some(num_qubits),
            max_shots: Some(max_shots),
            is_simulator: Some(false),
            calibration: None,
            noise_profile: None,
        }
    }

    /// Attach per-qubit calibration data.
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Attach a noise profile to these capabilities.
    pub fn with_noise_profile(mut self, profile: NoiseProfile) -> Self {
        self.noise_profile = Some(profile);
        self
    }

    /// Smallest reported T1 across qubits, in microseconds.
    pub fn min_t1(&self) -> Option<f64> {
        self.calibration.as_ref().and_then(|c| min_value(&c.t1))
    }

    /// Smallest reported T2 across qubits, in microseconds.
    pub fn min_t2(&self) -> Option<f64> {
        self.calibration.as_ref().and_then(|c| min_value(&c.t2))
    }
}

fn min_value(map: &FxHashMap<u32, f64>) -> Option<f64> {
    map.values().copied().reduce(f64::min)
}

/// Per-qubit calibration snapshot.
///
/// Times are in **microseconds**, keyed by qubit index. A qubit missing from
/// a map has no reported value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// T1 relaxation time per qubit.
    #[serde(default)]
    pub t1: FxHashMap<u32, f64>,
    /// T2 dephasing time per qubit.
    #[serde(default)]
    pub t2: FxHashMap<u32, f64>,
    /// When the calibration was taken, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Calibration {
    /// Build calibration from (qubit, t1, t2) triples.
    pub fn from_qubits(iter: impl IntoIterator<Item = (u32, f64, f64)>) -> Self {
        let mut calibration = Self::default();
        for (qubit, t1, t2) in iter {
            calibration.t1.insert(qubit, t1);
            calibration.t2.insert(qubit, t2);
        }
        calibration
    }
}

/// Device-wide noise averages reported by a backend.
///
/// All fidelity values are in `[0.0, 1.0]` where `1.0` means perfect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// Average single-qubit gate fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_qubit_fidelity: Option<f64>,
    /// Average two-qubit gate fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_qubit_fidelity: Option<f64>,
    /// Average readout fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readout_fidelity: Option<f64>,
}
