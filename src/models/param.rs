// QC parameter kinds and the normalized ingestion event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StationId;

/// QC parameter reported by the QC feed. Discriminant is the MetricVector slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKind {
    Latency = 0,
    Delay = 1,
    TimingQuality = 2,
    GapsCount = 3,
    OverlapsCount = 4,
    Availability = 5,
}

impl ParameterKind {
    /// All kinds in slot order.
    pub const ALL: [ParameterKind; 6] = [
        ParameterKind::Latency,
        ParameterKind::Delay,
        ParameterKind::TimingQuality,
        ParameterKind::GapsCount,
        ParameterKind::OverlapsCount,
        ParameterKind::Availability,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }

    /// Feed parameter name -> kind. SeisComP spells these with spaces
    /// ("timing quality"); camelCase spellings are accepted too.
    /// Anything else is not a tracked parameter.
    pub fn from_feed_name(name: &str) -> Option<Self> {
        match name {
            "latency" => Some(Self::Latency),
            "delay" => Some(Self::Delay),
            "timing quality" | "timingQuality" => Some(Self::TimingQuality),
            "gaps count" | "gapsCount" => Some(Self::GapsCount),
            "overlaps count" | "overlapsCount" => Some(Self::OverlapsCount),
            "availability" => Some(Self::Availability),
            _ => None,
        }
    }

    /// Column header shown on the dashboard table.
    pub fn header(self) -> &'static str {
        match self {
            Self::Latency => "Latency (s)",
            Self::Delay => "Delay (s)",
            Self::TimingQuality => "Timing Quality",
            Self::GapsCount => "Gaps Count",
            Self::OverlapsCount => "Overlaps Count",
            Self::Availability => "Availability (%)",
        }
    }
}

/// One validated QC update, ready for the store. `value` is already rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamEvent {
    pub station: StationId,
    pub kind: ParameterKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}
