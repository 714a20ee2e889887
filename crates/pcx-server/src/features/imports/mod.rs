//! Catalog import feature slice
//!
//! Upload creates the job and stores the raw file; processing runs the
//! parse → validate → batch-persist pipeline synchronously for that job;
//! status reads back the latest persisted state including row errors.

pub mod commands;
pub mod processor;
pub mod queries;
pub mod routes;
pub mod store;
pub mod types;

pub use routes::import_routes;
