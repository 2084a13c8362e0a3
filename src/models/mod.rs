// Domain models: stations, QC parameters, resource samples

mod param;
mod resource;
mod station;

pub use param::{ParamEvent, ParameterKind};
pub use resource::{DISK_SLOTS, ResourceReading, ResourceSample};
pub use station::{
    METRIC_SLOTS, MetricVector, Snapshot, StationId, empty_snapshot, round_one_decimal,
};
