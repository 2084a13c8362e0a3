// Snapshot blob on disk. Layout: [version: u8][wincode payload].
// Every write replaces the whole file via temp file + fsync + rename, so a
// reader in another process sees either the old or the new snapshot.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use wincode::{SchemaRead, SchemaWrite};

use super::StoreError;
use crate::models::{METRIC_SLOTS, MetricVector, Snapshot, StationId};

pub(super) const SNAPSHOT_BLOB_VERSION: u8 = 1;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(SchemaRead, SchemaWrite)]
struct SnapshotEntry {
    station: String,
    values: [Option<f64>; METRIC_SLOTS],
}

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
    let entries: Vec<SnapshotEntry> = snapshot
        .iter()
        .map(|(id, vector)| SnapshotEntry {
            station: id.as_str().to_string(),
            values: *vector.values(),
        })
        .collect();
    let payload =
        wincode::serialize(&entries).map_err(|e| StoreError::Codec(e.to_string()))?;
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(SNAPSHOT_BLOB_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Snapshot, StoreError> {
    let Some((&version, payload)) = bytes.split_first() else {
        return Err(StoreError::Codec("empty snapshot blob".into()));
    };
    if version != SNAPSHOT_BLOB_VERSION {
        return Err(StoreError::Codec(format!(
            "unsupported snapshot blob version {}",
            version
        )));
    }
    let entries: Vec<SnapshotEntry> =
        wincode::deserialize(payload).map_err(|e| StoreError::Codec(e.to_string()))?;
    Ok(entries
        .into_iter()
        .map(|e| (StationId::from(e.station.as_str()), MetricVector(e.values)))
        .collect())
}

pub fn load(path: &Path) -> Result<Snapshot, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    decode(&bytes)
}

/// Replace the snapshot file atomically.
pub fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let bytes = encode(snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let temp = temp_path(path);
    let result = write_synced(&temp, &bytes).and_then(|()| {
        fs::rename(&temp, path).map_err(|e| StoreError::io(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// Last modification time, shown as "updated" on the dashboard.
pub fn modified_at(path: &Path) -> Result<DateTime<Utc>, StoreError> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| StoreError::io(path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file: File = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    file.write_all(bytes).map_err(|e| StoreError::io(path, e))?;
    file.sync_all().map_err(|e| StoreError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(format!(".tmp.{}.{}", std::process::id(), seq));
    path.with_file_name(name)
}
