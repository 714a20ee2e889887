//! Aggregate job overview query

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Recent jobs shown per kind.
const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOverviewQuery {
    pub owner_id: Uuid,
}

/// Compact job summary used in the overview lists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobSummary {
    pub id: Uuid,
    pub status: String,
    pub progress: i32,
    pub record_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Cumulative counters across the owner's whole history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverviewTotals {
    pub imports: i64,
    pub imports_completed: i64,
    pub imports_failed: i64,
    pub records_imported: i64,
    pub row_errors: i64,
    pub exports: i64,
    pub exports_completed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub recent_imports: Vec<JobSummary>,
    pub recent_exports: Vec<JobSummary>,
    pub totals: OverviewTotals,
}

#[derive(Debug, thiserror::Error)]
pub enum GetOverviewError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<OverviewResponse, GetOverviewError>> for GetOverviewQuery {}

impl crate::cqrs::middleware::Query for GetOverviewQuery {}

pub async fn handle(
    pool: PgPool,
    query: GetOverviewQuery,
) -> Result<OverviewResponse, GetOverviewError> {
    let recent_imports = sqlx::query_as::<_, JobSummary>(
        r#"
        SELECT id, status, progress, total_records AS record_count, created_at
        FROM import_jobs
        WHERE owner_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(query.owner_id)
    .bind(RECENT_LIMIT)
    .fetch_all(&pool)
    .await?;

    let recent_exports = sqlx::query_as::<_, JobSummary>(
        r#"
        SELECT id, status, progress, record_count, created_at
        FROM export_jobs
        WHERE owner_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(query.owner_id)
    .bind(RECENT_LIMIT)
    .fetch_all(&pool)
    .await?;

    let import_totals: (i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'completed'),
               COUNT(*) FILTER (WHERE status = 'failed'),
               COALESCE(SUM(success_count), 0)::BIGINT,
               COALESCE(SUM(error_count), 0)::BIGINT
        FROM import_jobs
        WHERE owner_id = $1
        "#,
    )
    .bind(query.owner_id)
    .fetch_one(&pool)
    .await?;

    let export_totals: (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'completed')
        FROM export_jobs
        WHERE owner_id = $1
        "#,
    )
    .bind(query.owner_id)
    .fetch_one(&pool)
    .await?;

    Ok(OverviewResponse {
        recent_imports,
        recent_exports,
        totals: OverviewTotals {
            imports: import_totals.0,
            imports_completed: import_totals.1,
            imports_failed: import_totals.2,
            records_imported: import_totals.3,
            row_errors: import_totals.4,
            exports: export_totals.0,
            exports_completed: export_totals.1,
        },
    })
}
