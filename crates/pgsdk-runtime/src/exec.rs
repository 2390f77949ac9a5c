//! Thin query-execution helpers: one place that pairs a SQL string with its
//! `BindValue` vector and runs it on any executor (pool or pinned
//! connection).

use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row};

use crate::error::{ApiError, Result};
use crate::value::{bind_params, BindValue};

pub async fn fetch_rows<'a, E>(executor: E, sql: &str, params: &[BindValue]) -> Result<Vec<PgRow>>
where
    E: sqlx::Executor<'a, Database = Postgres>,
{
    tracing::debug!(sql, params = params.len(), "executing query");
    bind_params(sqlx::query(sql), params)
        .fetch_all(executor)
        .await
        .map_err(|e| ApiError::db("query", e))
}

pub async fn fetch_optional_row<'a, E>(
    executor: E,
    sql: &str,
    params: &[BindValue],
) -> Result<Option<PgRow>>
where
    E: sqlx::Executor<'a, Database = Postgres>,
{
    tracing::debug!(sql, params = params.len(), "executing query");
    bind_params(sqlx::query(sql), params)
        .fetch_optional(executor)
        .await
        .map_err(|e| ApiError::db("query", e))
}

pub async fn fetch_count<'a, E>(executor: E, sql: &str, params: &[BindValue]) -> Result<u64>
where
    E: sqlx::Executor<'a, Database = Postgres>,
{
    tracing::debug!(sql, params = params.len(), "executing count query");
    let row = bind_params(sqlx::query(sql), params)
        .fetch_one(executor)
        .await
        .map_err(|e| ApiError::db("count", e))?;
    let count: i64 = row.try_get(0).map_err(|e| ApiError::db("count", e))?;
    Ok(count.max(0) as u64)
}

/// Qualified, quoted table reference: `"schema"."table"`.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!(
        "{}.{}",
        crate::value::quote_ident(schema),
        crate::value::quote_ident(table)
    )
}
