// Read-only HTTP reporting API

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::resource_log::ResourceLog;
use crate::store::FileStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) snapshot: FileStore,
    pub(crate) resource_log: Arc<ResourceLog>,
}

pub fn app(snapshot: FileStore, resource_log: Arc<ResourceLog>) -> Router {
    let state = AppState {
        snapshot,
        resource_log,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/stations", get(http::stations_handler)) // GET /api/stations
        .route("/api/stations/{id}", get(http::station_handler)) // GET /api/stations/NN.STA
        .route("/api/resources", get(http::resources_handler)) // GET /api/resources?start=&end=
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
