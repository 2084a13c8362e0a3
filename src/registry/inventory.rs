// Inventory read from a directory of JSON station documents (one file per
// network export). Each file:
//   { "networks": [ { "code": "NN", "stations": [
//       { "code": "STA", "start": "2020-01-01T00:00:00Z", "end": null } ] } ] }

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::{MetadataSource, RegistryError, StationEpoch};

#[derive(Debug, Deserialize)]
struct InventoryDocument {
    #[serde(default)]
    networks: Vec<NetworkEntry>,
}

#[derive(Debug, Deserialize)]
struct NetworkEntry {
    code: String,
    #[serde(default)]
    stations: Vec<StationEntry>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    code: String,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

pub struct InventoryDir {
    dir: PathBuf,
}

impl InventoryDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn documents(&self) -> Result<Vec<PathBuf>, RegistryError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            RegistryError::Source(format!("{}: {}", self.dir.display(), e))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| RegistryError::Source(format!("{}: {}", self.dir.display(), e)))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl MetadataSource for InventoryDir {
    fn list_stations(&self, _as_of: DateTime<Utc>) -> Result<Vec<StationEpoch>, RegistryError> {
        let mut epochs = Vec::new();
        for path in self.documents()? {
            epochs.extend(read_document(&path)?);
        }
        tracing::debug!(
            dir = %self.dir.display(),
            epochs = epochs.len(),
            "inventory read"
        );
        Ok(epochs)
    }
}

fn read_document(path: &Path) -> Result<Vec<StationEpoch>, RegistryError> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| RegistryError::Source(format!("{}: {}", path.display(), e)))?;
    let doc: InventoryDocument = serde_json::from_str(&s)
        .map_err(|e| RegistryError::Source(format!("{}: {}", path.display(), e)))?;

    let mut out = Vec::new();
    for network in doc.networks {
        for station in network.stations {
            out.push(StationEpoch {
                network: network.code.clone(),
                station: station.code,
                start: station.start.as_deref().and_then(parse_time),
                end: station.end.as_deref().and_then(parse_time),
            });
        }
    }
    Ok(out)
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC. Anything else is
/// "not determinable".
pub(super) fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
