// Metric state store: the per-station QC snapshot shared between the
// ingestion loop (writer) and the reporting side (readers).
//
// FileStore is the plain whole-snapshot read-modify-write over the blob file.
// It is what readers use, and its `update` is only correct with a single
// writer. The live writer path is StoreOwner/StoreHandle: one task owns the
// snapshot and serializes every update, behind the WriterLock.

mod lock;
mod owner;
pub mod snapshot_file;

pub use lock::WriterLock;
pub use owner::{StoreHandle, StoreOwner};

use std::path::{Path, PathBuf};

use crate::models::{MetricVector, ParameterKind, Snapshot, StationId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown station {0}")]
    UnknownStation(StationId),

    #[error("snapshot is locked by another writer ({path})")]
    Locked { path: String },

    #[error("snapshot io at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot codec: {0}")]
    Codec(String),

    #[error("snapshot persist failed, update rolled back: {0}")]
    Persist(Box<StoreError>),

    #[error("store owner is not running")]
    Closed,
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result of a successful update call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// Slot written; `previous` is what it held before.
    Applied { previous: Option<f64> },
    /// Slot already holds a value observed later; nothing written.
    Stale,
}

/// Set one slot of one station. Unknown stations are rejected, never inserted.
pub(crate) fn apply_update(
    snapshot: &mut Snapshot,
    station: &StationId,
    kind: ParameterKind,
    value: f64,
) -> Result<Option<f64>, StoreError> {
    let vector = snapshot
        .get_mut(station)
        .ok_or_else(|| StoreError::UnknownStation(station.clone()))?;
    let previous = vector.get(kind);
    vector.set(kind, Some(value));
    Ok(previous)
}

/// Direct access to the snapshot file.
///
/// `load`/`get` are safe from any number of readers. `update` reloads the
/// whole snapshot, changes one slot and rewrites the whole file; two writers
/// doing this concurrently can overwrite each other's slot (last full write
/// wins), so it must only be used by the one process holding the writer role.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Snapshot, StoreError> {
        snapshot_file::load(&self.path)
    }

    /// `Ok(None)` for a station that is not in the snapshot.
    pub fn get(&self, station: &StationId) -> Result<Option<MetricVector>, StoreError> {
        Ok(self.load()?.get(station).copied())
    }

    pub fn replace(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        snapshot_file::persist(&self.path, snapshot)
    }

    pub fn update(
        &self,
        station: &StationId,
        kind: ParameterKind,
        value: f64,
    ) -> Result<Option<f64>, StoreError> {
        let mut snapshot = self.load()?;
        let previous = apply_update(&mut snapshot, station, kind, value)?;
        self.replace(&snapshot)?;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::empty_snapshot;

    #[test]
    fn apply_update_touches_one_slot() {
        let id = StationId::from("NN.STA");
        let mut snapshot = empty_snapshot([id.clone()]);
        assert_eq!(apply_update(&mut snapshot, &id, ParameterKind::Delay, 3.0).unwrap(), None);
        assert_eq!(
            apply_update(&mut snapshot, &id, ParameterKind::Delay, 4.0).unwrap(),
            Some(3.0)
        );
        let vector = snapshot[&id];
        assert_eq!(vector.get(ParameterKind::Delay), Some(4.0));
        assert_eq!(vector.values().iter().filter(|v| v.is_some()).count(), 1);
    }

    #[test]
    fn apply_update_never_inserts() {
        let mut snapshot = empty_snapshot([StationId::from("NN.STA")]);
        let err = apply_update(&mut snapshot, &StationId::from("NN.X"), ParameterKind::Latency, 1.0);
        assert!(matches!(err, Err(StoreError::UnknownStation(_))));
        assert_eq!(snapshot.len(), 1);
    }
}
