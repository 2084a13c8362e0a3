// Station registry bootstrap: list active stations from the inventory and
// write a fresh all-unobserved snapshot. Runs once before ingestion starts.

mod inventory;

pub use inventory::InventoryDir;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::models::{Snapshot, StationId, empty_snapshot};
use crate::store::{StoreError, WriterLock, snapshot_file};

/// One station epoch as reported by the inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct StationEpoch {
    pub network: String,
    pub station: String,
    /// `None` when the start could not be determined; such epochs are never active.
    pub start: Option<DateTime<Utc>>,
    /// `None` = open-ended.
    pub end: Option<DateTime<Utc>>,
}

impl StationEpoch {
    /// Validity is `[start, end)`.
    pub fn is_active_at(&self, as_of: DateTime<Utc>) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        start <= as_of && self.end.is_none_or(|end| as_of < end)
    }

    pub fn station_id(&self) -> StationId {
        StationId::new(&self.network, &self.station)
    }
}

/// Station inventory the registry is built from.
pub trait MetadataSource {
    /// Every station epoch known to the source. An error means the source
    /// could not be read at all.
    fn list_stations(&self, as_of: DateTime<Utc>) -> Result<Vec<StationEpoch>, RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("station inventory unreadable: {0}")]
    Source(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Active stations at `as_of`, sorted and deduplicated.
pub fn active_stations(epochs: &[StationEpoch], as_of: DateTime<Utc>) -> Vec<StationId> {
    let mut ids: Vec<StationId> = epochs
        .iter()
        .filter(|e| e.is_active_at(as_of))
        .map(StationEpoch::station_id)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Build the snapshot for `as_of` and overwrite the snapshot file with it.
/// Nothing is written if the source fails.
#[instrument(skip(source, lock), fields(operation = "refresh_registry"))]
pub fn refresh(
    source: &dyn MetadataSource,
    as_of: DateTime<Utc>,
    lock: &WriterLock,
) -> Result<Snapshot, RegistryError> {
    let epochs = source.list_stations(as_of)?;
    let stations = active_stations(&epochs, as_of);
    let snapshot = empty_snapshot(stations);
    snapshot_file::persist(lock.snapshot_path(), &snapshot)?;
    tracing::info!(
        epochs = epochs.len(),
        stations = snapshot.len(),
        path = %lock.snapshot_path().display(),
        "station registry refreshed"
    );
    Ok(snapshot)
}
