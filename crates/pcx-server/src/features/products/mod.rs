//! Product catalog persistence
//!
//! The bulk-insert target for imports and the primary data source for
//! exports.

pub mod store;
