// GET handlers: version, station QC table, resource history

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::classify::{Tier, classify_vector};
use crate::models::{METRIC_SLOTS, MetricVector, ParameterKind, Snapshot, StationId};
use crate::store::StoreError;
use crate::version::{NAME, VERSION};

/// Default window for /api/resources when no start is given.
const DEFAULT_RESOURCE_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StationRow {
    station: StationId,
    values: [Option<f64>; METRIC_SLOTS],
    tiers: [Option<Tier>; METRIC_SLOTS],
    /// Cell colour per slot; `None` where the value is outside every band.
    colors: [Option<&'static str>; METRIC_SLOTS],
}

impl StationRow {
    fn new(station: StationId, vector: &MetricVector) -> Self {
        let tiers = classify_vector(vector);
        Self {
            station,
            values: *vector.values(),
            tiers,
            colors: tiers.map(|t| t.map(Tier::color)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StationTable {
    updated: DateTime<Utc>,
    headers: [&'static str; METRIC_SLOTS],
    stations: Vec<StationRow>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResourceRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn store_error_response(e: StoreError) -> Response {
    tracing::warn!(error = %e, operation = "read_snapshot", "snapshot unavailable");
    error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

async fn read_snapshot(state: &AppState) -> Result<(Snapshot, DateTime<Utc>), StoreError> {
    let store = state.snapshot.clone();
    tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
        let updated = crate::store::snapshot_file::modified_at(store.path())?;
        Ok((store.load()?, updated))
    })
    .await
    .map_err(|e| StoreError::Codec(format!("snapshot read task join: {}", e)))?
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/stations: every station with values, tiers and cell colours.
pub(super) async fn stations_handler(State(state): State<AppState>) -> Response {
    let (snapshot, updated) = match read_snapshot(&state).await {
        Ok(s) => s,
        Err(e) => return store_error_response(e),
    };
    let stations = snapshot
        .iter()
        .map(|(id, vector)| StationRow::new(id.clone(), vector))
        .collect();
    Json(StationTable {
        updated,
        headers: ParameterKind::ALL.map(ParameterKind::header),
        stations,
    })
    .into_response()
}

/// GET /api/stations/{id}: one station, 404 if it is not in the registry.
pub(super) async fn station_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let (snapshot, _) = match read_snapshot(&state).await {
        Ok(s) => s,
        Err(e) => return store_error_response(e),
    };
    let id = StationId::from(id.as_str());
    match snapshot.get(&id) {
        Some(vector) => Json(StationRow::new(id, vector)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("unknown station {}", id)),
    }
}

/// GET /api/resources?start=&end=: samples in the closed range, oldest first.
pub(super) async fn resources_handler(
    State(state): State<AppState>,
    Query(range): Query<ResourceRange>,
) -> Response {
    let end = range.end.unwrap_or_else(Utc::now);
    let start = range
        .start
        .unwrap_or_else(|| end - Duration::days(DEFAULT_RESOURCE_WINDOW_DAYS));
    if start > end {
        return error_response(StatusCode::BAD_REQUEST, "start must not be after end");
    }
    match state.resource_log.query(start, end).await {
        Ok(samples) => Json(samples).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, operation = "query_resources", "resource query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "resource query failed")
        }
    }
}
