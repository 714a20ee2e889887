//! Export feature slice
//!
//! Generates filtered, size-bounded export files and delivers them via
//! time-limited presigned URLs. Generation runs synchronously inside the
//! request; the job row is updated in two phases (50% after the data
//! fetch, 100% after the upload) so a crash mid-export leaves a legible
//! partial state.

pub mod commands;
pub mod data;
pub mod queries;
pub mod routes;
pub mod store;
pub mod types;
pub mod writer;

pub use routes::export_routes;
