// Host resource samples (the resource log rows)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of monitored mount points per sample.
pub const DISK_SLOTS: usize = 5;

/// One collection pass, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReading {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// Usage percent per configured mount point, in configured order.
    pub disk_percent: [f64; DISK_SLOTS],
    pub load_avg_1min: f64,
    pub load_avg_5min: f64,
    pub load_avg_15min: f64,
}

/// A persisted reading. `id` and `timestamp` are assigned by the resource log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSample {
    pub id: i64,
    /// UTC, whole seconds.
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub reading: ResourceReading,
}
