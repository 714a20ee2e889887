//! Import template feature slice
//!
//! Downloadable sample files for each accepted format, plus saved
//! per-owner column mappings with an at-most-one-default-per-file-type
//! invariant.

pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use routes::template_routes;
