//! Product bulk insert and export queries

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::validator::ValidRow;

/// Outcome of inserting one chunk.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    pub inserted: usize,
    /// (index within the chunk, database error message)
    pub failures: Vec<(usize, String)>,
}

/// Insert one chunk of validated records.
///
/// Fast path: a single multi-row INSERT inside a transaction, atomic for
/// the chunk. If the store rejects it (a constraint violation on an
/// already-schema-valid record, e.g. a duplicate SKU), the chunk is
/// retried row-at-a-time so individual offenders are reported without
/// discarding their chunk-mates.
pub async fn insert_chunk(
    pool: &PgPool,
    owner_id: Uuid,
    rows: &[ValidRow],
) -> Result<ChunkOutcome, sqlx::Error> {
    if rows.is_empty() {
        return Ok(ChunkOutcome::default());
    }

    let mut tx = pool.begin().await?;
    let mut builder = bulk_insert_builder(owner_id, rows);
    let bulk_result = builder.build().execute(&mut *tx).await;

    match bulk_result {
        Ok(_) => {
            tx.commit().await?;
            Ok(ChunkOutcome {
                inserted: rows.len(),
                failures: Vec::new(),
            })
        }
        Err(error) if is_constraint_violation(&error) => {
            tx.rollback().await?;
            insert_rows_individually(pool, owner_id, rows).await
        }
        Err(error) => Err(error),
    }
}

fn bulk_insert_builder<'a>(
    owner_id: Uuid,
    rows: &'a [ValidRow],
) -> QueryBuilder<'a, sqlx::Postgres> {
    let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "INSERT INTO products \
         (id, owner_id, sku, name, description, price, category, stock, commission_rate, status) ",
    );

    builder.push_values(rows, |mut row, valid| {
        let record = &valid.record;
        row.push_bind(Uuid::new_v4())
            .push_bind(owner_id)
            .push_bind(record.sku.as_deref())
            .push_bind(&record.name)
            .push_bind(record.description.as_deref())
            .push_bind(record.price)
            .push_bind(&record.category)
            .push_bind(record.stock)
            .push_bind(record.commission_rate)
            .push_bind(&record.status);
    });

    builder
}

async fn insert_rows_individually(
    pool: &PgPool,
    owner_id: Uuid,
    rows: &[ValidRow],
) -> Result<ChunkOutcome, sqlx::Error> {
    let mut outcome = ChunkOutcome::default();

    for (index, valid) in rows.iter().enumerate() {
        let record = &valid.record;
        let result = sqlx::query(
            r#"
            INSERT INTO products
                (id, owner_id, sku, name, description, price, category, stock,
                 commission_rate, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(record.sku.as_deref())
        .bind(&record.name)
        .bind(record.description.as_deref())
        .bind(record.price)
        .bind(&record.category)
        .bind(record.stock)
        .bind(record.commission_rate)
        .bind(&record.status)
        .execute(pool)
        .await;

        match result {
            Ok(_) => outcome.inserted += 1,
            Err(error) if is_constraint_violation(&error) => {
                outcome.failures.push((index, database_message(&error)));
            }
            Err(error) => return Err(error),
        }
    }

    Ok(outcome)
}

/// SQLSTATE class 23 covers integrity constraint violations.
fn is_constraint_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| code.starts_with("23"))
            .unwrap_or(false),
        _ => false,
    }
}

fn database_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

/// Product row as queried for export.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub stock: i32,
    pub commission_rate: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Column order used for product exports.
pub const PRODUCT_EXPORT_COLUMNS: &[&str] = &[
    "sku",
    "name",
    "description",
    "price",
    "category",
    "stock",
    "commission_rate",
    "status",
    "created_at",
];

/// Filters applicable to a product export.
#[derive(Debug, Clone, Default, serde::Deserialize, Serialize)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

/// Query the owner's products under filters, bounded by `limit`.
pub async fn query_for_export(
    pool: &PgPool,
    owner_id: Uuid,
    filters: &ProductFilters,
    limit: i64,
) -> Result<Vec<ProductRow>, sqlx::Error> {
    let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "SELECT id, sku, name, description, price, category, stock, commission_rate, \
         status, created_at FROM products WHERE owner_id = ",
    );
    builder.push_bind(owner_id);

    if let Some(ref category) = filters.category {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(ref status) = filters.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(date_from) = filters.date_from {
        builder.push(" AND created_at >= ").push_bind(date_from);
    }
    if let Some(date_to) = filters.date_to {
        builder.push(" AND created_at <= ").push_bind(date_to);
    }
    if let Some(price_min) = filters.price_min {
        builder.push(" AND price >= ").push_bind(price_min);
    }
    if let Some(price_max) = filters.price_max {
        builder.push(" AND price <= ").push_bind(price_max);
    }

    builder.push(" ORDER BY created_at, id LIMIT ").push_bind(limit);

    builder.build_query_as::<ProductRow>().fetch_all(pool).await
}

impl ProductRow {
    /// Flatten to a string-keyed map for the export writer.
    pub fn to_export_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(self.id.to_string()));
        map.insert(
            "sku".into(),
            self.sku.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert(
            "description".into(),
            self.description
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        map.insert("price".into(), json_number(self.price));
        map.insert("category".into(), Value::String(self.category.clone()));
        map.insert("stock".into(), Value::from(self.stock));
        map.insert("commission_rate".into(), json_number(self.commission_rate));
        map.insert("status".into(), Value::String(self.status.clone()));
        map.insert(
            "created_at".into(),
            Value::String(self.created_at.to_rfc3339()),
        );
        map
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_map_covers_export_columns() {
        let row = ProductRow {
            id: Uuid::nil(),
            sku: Some("SKU-1".to_string()),
            name: "Widget".to_string(),
            description: None,
            price: 9.99,
            category: "electronics".to_string(),
            stock: 3,
            commission_rate: 10.0,
            status: "active".to_string(),
            created_at: Utc::now(),
        };

        let map = row.to_export_map();
        for column in PRODUCT_EXPORT_COLUMNS {
            assert!(map.contains_key(*column), "missing column {column}");
        }
        assert_eq!(map["name"], Value::String("Widget".to_string()));
        assert_eq!(map["description"], Value::Null);
    }
}
