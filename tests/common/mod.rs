// Shared test helpers
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use stationqc::models::*;
use stationqc::store::{StoreHandle, StoreOwner, WriterLock, snapshot_file};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn snapshot_of(stations: &[&str]) -> Snapshot {
    empty_snapshot(stations.iter().map(|s| StationId::from(*s)))
}

pub fn reading(cpu_percent: f64) -> ResourceReading {
    ResourceReading {
        cpu_percent,
        memory_percent: 40.0,
        disk_percent: [10.0, 20.0, 30.0, 40.0, 50.0],
        load_avg_1min: 0.5,
        load_avg_5min: 0.4,
        load_avg_15min: 0.3,
    }
}

pub fn write_inventory(dir: &Path, name: &str, json: &str) {
    std::fs::write(dir.join(name), json).unwrap();
}

/// Persist an all-unobserved snapshot at `path` and start an owner on it.
pub fn start_store(
    path: &Path,
    stations: &[&str],
) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let lock = WriterLock::acquire(path).unwrap();
    let snapshot = snapshot_of(stations);
    snapshot_file::persist(path, &snapshot).unwrap();
    StoreOwner::with_snapshot(lock, snapshot).spawn(16)
}

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join("qc").join("snapshot.bin")
}
