//! Marker traits separating write and read operations
//!
//! Commands mutate state and run behind the origin guard and rate
//! limiter; queries are read-only.

/// Marker for write operations (create, process, delete).
pub trait Command {}

/// Marker for read operations (get, list, status).
pub trait Query {}
