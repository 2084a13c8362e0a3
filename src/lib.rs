// Library for the binary and the integration tests

pub mod classify;
pub mod collector;
pub mod config;
pub mod ingest;
pub mod models;
pub mod recorder;
pub mod registry;
pub mod resource_log;
pub mod routes;
pub mod store;
pub mod version;
