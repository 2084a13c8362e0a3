// Threshold classification of QC values into health tiers. Pure; read side only.
//
// Intervals are half-open. Absent latency/delay is Unknown, but absent counts
// and availability are Critical: a station that never reported gaps or
// availability is treated as down.

use serde::Serialize;

use crate::models::{METRIC_SLOTS, MetricVector, ParameterKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Unknown,
    Good,
    Warning,
    Critical,
}

impl Tier {
    /// Table cell background used by the dashboard.
    pub fn color(self) -> &'static str {
        match self {
            Tier::Unknown => "white",
            Tier::Good => "lightgreen",
            Tier::Warning => "#F9DA79",
            Tier::Critical => "#F97979",
        }
    }
}

/// `None` means the value is outside every band (percentages at or above 101).
pub fn classify(kind: ParameterKind, value: Option<f64>) -> Option<Tier> {
    match kind {
        ParameterKind::Latency | ParameterKind::Delay => Some(match value {
            None => Tier::Unknown,
            Some(v) if v < 0.0 => Tier::Critical,
            Some(v) if v < 5.0 => Tier::Good,
            Some(v) if v < 10.0 => Tier::Warning,
            Some(_) => Tier::Critical,
        }),
        ParameterKind::TimingQuality => match value {
            None => Some(Tier::Unknown),
            Some(v) if v < 80.0 => Some(Tier::Critical),
            Some(v) if v < 101.0 => Some(Tier::Good),
            Some(_) => None,
        },
        ParameterKind::GapsCount | ParameterKind::OverlapsCount => Some(match value {
            None => Tier::Critical,
            Some(v) if v < 5.0 => Tier::Good,
            Some(v) if v < 10.0 => Tier::Warning,
            Some(_) => Tier::Critical,
        }),
        ParameterKind::Availability => match value {
            None => Some(Tier::Critical),
            Some(v) if v < 90.0 => Some(Tier::Critical),
            Some(v) if v < 95.0 => Some(Tier::Warning),
            Some(v) if v < 101.0 => Some(Tier::Good),
            Some(_) => None,
        },
    }
}

/// Classify every slot of a vector, in slot order.
pub fn classify_vector(vector: &MetricVector) -> [Option<Tier>; METRIC_SLOTS] {
    let mut out = [None; METRIC_SLOTS];
    for kind in ParameterKind::ALL {
        out[kind.slot()] = classify(kind, vector.get(kind));
    }
    out
}
