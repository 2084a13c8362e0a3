// Station identity, per-station metric vector and the snapshot mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ParameterKind;

/// Number of QC slots per station. One per [`ParameterKind`].
pub const METRIC_SLOTS: usize = 6;

/// `NET.STA` composite key. Case-sensitive; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(network: &str, station: &str) -> Self {
        Self(format!("{}.{}", network, station))
    }

    /// Station id of a waveform stream id (`NET.STA.LOC.CHA`, or just `NET.STA`).
    /// Location may be empty; network and station may not.
    pub fn from_waveform_id(waveform_id: &str) -> Option<Self> {
        let mut parts = waveform_id.split('.');
        let network = parts.next().filter(|s| !s.is_empty())?;
        let station = parts.next().filter(|s| !s.is_empty())?;
        Some(Self::new(network, station))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Six QC values in [`ParameterKind`] slot order. `None` = not observed yet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricVector(pub [Option<f64>; METRIC_SLOTS]);

impl MetricVector {
    pub fn unobserved() -> Self {
        Self([None; METRIC_SLOTS])
    }

    pub fn get(&self, kind: ParameterKind) -> Option<f64> {
        self.0[kind.slot()]
    }

    pub fn set(&mut self, kind: ParameterKind, value: Option<f64>) {
        self.0[kind.slot()] = value;
    }

    pub fn values(&self) -> &[Option<f64>; METRIC_SLOTS] {
        &self.0
    }

    pub fn is_unobserved(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// StationID -> MetricVector. Ordered so reports list stations sorted.
pub type Snapshot = BTreeMap<StationId, MetricVector>;

/// Fresh snapshot with every station unobserved. Duplicates collapse.
pub fn empty_snapshot<I>(stations: I) -> Snapshot
where
    I: IntoIterator<Item = StationId>,
{
    stations
        .into_iter()
        .map(|id| (id, MetricVector::unobserved()))
        .collect()
}

/// Round half away from zero to one decimal place. Values too large to scale
/// are already whole numbers and come back unchanged.
pub fn round_one_decimal(value: f64) -> f64 {
    let scaled = value * 10.0;
    if scaled.is_finite() {
        scaled.round() / 10.0
    } else {
        value
    }
}
