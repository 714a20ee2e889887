//! Export data sources for campaigns and analytics
//!
//! Products live in their own slice; campaigns and the cross-job
//! analytics rollup are queried here. Every query is owner-scoped and
//! bounded by the caller's limit.

use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use chrono::{DateTime, Utc};

use super::types::ExportFilters;

/// Column order used for campaign exports.
pub const CAMPAIGN_EXPORT_COLUMNS: &[&str] =
    &["name", "status", "budget", "created_at"];

/// Column order used for analytics exports.
pub const ANALYTICS_EXPORT_COLUMNS: &[&str] = &[
    "job_kind",
    "job_id",
    "status",
    "total_records",
    "success_count",
    "error_count",
    "created_at",
];

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    name: String,
    status: String,
    budget: f64,
    created_at: DateTime<Utc>,
}

/// Campaigns for one owner under the applicable filters.
pub async fn query_campaigns(
    pool: &PgPool,
    owner_id: Uuid,
    filters: &ExportFilters,
    limit: i64,
) -> Result<Vec<Map<String, Value>>, sqlx::Error> {
    let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT name, status, budget, created_at FROM campaigns WHERE owner_id = ",
    );
    builder.push_bind(owner_id);

    if let Some(ref status) = filters.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(date_from) = filters.date_from {
        builder.push(" AND created_at >= ").push_bind(date_from);
    }
    if let Some(date_to) = filters.date_to {
        builder.push(" AND created_at <= ").push_bind(date_to);
    }
    builder.push(" ORDER BY created_at, name LIMIT ").push_bind(limit);

    let rows = builder
        .build_query_as::<CampaignRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut map = Map::new();
            map.insert("name".into(), Value::String(row.name));
            map.insert("status".into(), Value::String(row.status));
            map.insert("budget".into(), json_number(row.budget));
            map.insert(
                "created_at".into(),
                Value::String(row.created_at.to_rfc3339()),
            );
            map
        })
        .collect())
}

#[derive(Debug, sqlx::FromRow)]
struct JobStatRow {
    job_kind: String,
    job_id: Uuid,
    status: String,
    total_records: i64,
    success_count: i64,
    error_count: i64,
    created_at: DateTime<Utc>,
}

/// Per-job statistics across both job kinds, newest first.
pub async fn query_analytics(
    pool: &PgPool,
    owner_id: Uuid,
    filters: &ExportFilters,
    limit: i64,
) -> Result<Vec<Map<String, Value>>, sqlx::Error> {
    let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
        r#"
        SELECT * FROM (
            SELECT 'import' AS job_kind, id AS job_id, status,
                   total_records, success_count, error_count, created_at
            FROM import_jobs WHERE owner_id =
        "#,
    );
    builder.push_bind(owner_id);
    builder.push(
        r#"
            UNION ALL
            SELECT 'export' AS job_kind, id AS job_id, status,
                   record_count AS total_records, record_count AS success_count,
                   0 AS error_count, created_at
            FROM export_jobs WHERE owner_id =
        "#,
    );
    builder.push_bind(owner_id);
    builder.push(") jobs WHERE TRUE");

    if let Some(date_from) = filters.date_from {
        builder.push(" AND created_at >= ").push_bind(date_from);
    }
    if let Some(date_to) = filters.date_to {
        builder.push(" AND created_at <= ").push_bind(date_to);
    }
    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit);

    let rows = builder
        .build_query_as::<JobStatRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut map = Map::new();
            map.insert("job_kind".into(), Value::String(row.job_kind));
            map.insert("job_id".into(), Value::String(row.job_id.to_string()));
            map.insert("status".into(), Value::String(row.status));
            map.insert("total_records".into(), Value::from(row.total_records));
            map.insert("success_count".into(), Value::from(row.success_count));
            map.insert("error_count".into(), Value::from(row.error_count));
            map.insert(
                "created_at".into(),
                Value::String(row.created_at.to_rfc3339()),
            );
            map
        })
        .collect())
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
