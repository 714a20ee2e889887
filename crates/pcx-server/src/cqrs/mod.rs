//! CQRS wiring
//!
//! Commands and queries are plain structs implementing the mediator
//! `Request` trait plus one of the marker traits below. Handlers stay
//! free functions (`handle(pool, cmd)`), so each is independently
//! callable from routes and tests.

pub use mediator::Request;

pub mod middleware;
