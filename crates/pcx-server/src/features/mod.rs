//! Feature modules implementing the PCX API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes, following the CQRS (Command Query Responsibility Segregation)
//! pattern:
//!
//! - **imports**: catalog upload, synchronous processing, job status
//! - **exports**: filtered export generation with signed download links
//! - **templates**: downloadable sample files and saved column mappings
//! - **products**: the bulk-insert target and export data source
//! - **jobs**: cross-kind job overview and cumulative analytics
//!
//! Commands and queries implement the mediator `Request` trait, keeping
//! handlers independently callable and testable.

pub mod exports;
pub mod imports;
pub mod jobs;
pub mod products;
pub mod shared;
pub mod templates;

use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::config::LimitsConfig;
use crate::middleware::rate_limit::RateLimiter;
use crate::storage::Storage;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool
    pub db: sqlx::PgPool,
    /// S3-compatible storage backend
    pub storage: Storage,
    /// Pipeline limits for this deployment
    pub limits: LimitsConfig,
    /// Keyed per-identity rate limiter
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Cancelled on shutdown; batch loops check it between chunks
    pub shutdown: CancellationToken,
}

/// Creates the main API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/import", imports::import_routes())
        .nest("/export", exports::export_routes())
        .nest("/templates", templates::template_routes())
        .nest("/jobs", jobs::jobs_routes())
        .with_state(state)
}
