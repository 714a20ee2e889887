//! Job overview feature slice
//!
//! Read-only aggregate view over both job kinds, for dashboards and
//! polling clients that want one call instead of two.

pub mod queries;
pub mod routes;

pub use routes::jobs_routes;
