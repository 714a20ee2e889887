//! PCX Server Library
//!
//! HTTP service for bulk product-catalog exchange: secure import of
//! user-supplied CSV/XLSX/JSON catalogs and filtered, size-bounded
//! exports delivered through time-limited signed links.
//!
//! # Overview
//!
//! - **Secure Parser**: format-specific extraction with injection and
//!   resource-exhaustion defenses ([`parser`])
//! - **Validator**: schema-driven per-row validation with error
//!   isolation ([`validator`])
//! - **Batch Processor**: chunked bulk persistence with incrementally
//!   persisted progress ([`features::imports::processor`])
//! - **Export Generator**: owner-scoped filtered exports with column
//!   allow-listing ([`features::exports`])
//! - **Job Store**: forward-only job state machines polled by clients
//! - **Security Middleware**: auth gate, origin guard, keyed rate
//!   limiting ([`middleware`])
//!
//! # Architecture
//!
//! Feature slices follow the CQRS pattern: each command and query is a
//! struct with its own error enum, `validate()`, and a free `handle()`
//! function, wired to axum routes per slice.
//!
//! # Example
//!
//! ```no_run
//! use pcx_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     api::serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;
pub mod parser;
pub mod storage;
pub mod validator;

// Re-export commonly used types
pub use error::{AppError, AppResult};
