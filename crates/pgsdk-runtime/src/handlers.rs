//! # CRUD handlers
//!
//! Framework-neutral handler bodies for the generated routes: create,
//! get-by-pk, list, update, delete. Each handler acquires one pool
//! connection, runs the optional per-request hook on it (session-local SQL
//! settings stay scoped to that connection), executes its primary queries on
//! the same connection, and releases it. The include loader draws its own
//! short-lived connections from the pool.

use std::sync::Arc;

use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};

use crate::error::{ApiError, Result};
use crate::exec::{fetch_optional_row, qualified_table};
use crate::meta::{ApiRegistry, TableMeta};
use crate::query::{run_list, ListContext, ListRequest, ListResult};
use crate::schema::{validate_insert, validate_update};
use crate::value::{
    bind_value_from_segment, quote_ident, row_to_json, select_list, ParamBuffer,
};

/// Which generated operation a request is running; handed to the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Get,
    List,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub table: String,
    pub operation: Operation,
}

/// Per-request hook injected at server construction. Runs before any
/// route-specific work, on the same connection the handler will use.
#[async_trait::async_trait]
pub trait RequestHook: Send + Sync {
    async fn on_request(&self, ctx: &RequestContext, conn: &mut PgConnection) -> Result<()>;
}

/// Runtime options a generated server is constructed with.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub include_depth: usize,
    pub strict_includes: bool,
    /// Surface internal error detail in 500 bodies.
    pub debug: bool,
    pub api_keys: Vec<String>,
    pub api_key_header: String,
    pub pull_token: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            include_depth: 3,
            strict_includes: false,
            debug: false,
            api_keys: Vec::new(),
            api_key_header: "x-api-key".to_string(),
            pull_token: None,
        }
    }
}

/// Everything the handlers need, injected once at registration time.
#[derive(Clone)]
pub struct ApiContext {
    pub pool: PgPool,
    pub registry: Arc<ApiRegistry>,
    pub options: ServerOptions,
    pub hook: Option<Arc<dyn RequestHook>>,
}

impl ApiContext {
    pub fn new(pool: PgPool, registry: Arc<ApiRegistry>) -> Self {
        Self {
            pool,
            registry,
            options: ServerOptions::default(),
            hook: None,
        }
    }

    pub fn with_options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    fn table(&self, name: &str) -> Result<&TableMeta> {
        self.registry.table(name).ok_or(ApiError::NotFound)
    }

    async fn acquire(
        &self,
        table: &str,
        operation: Operation,
    ) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| ApiError::db("acquire connection", e))?;
        if let Some(hook) = &self.hook {
            let ctx = RequestContext {
                table: table.to_string(),
                operation,
            };
            hook.on_request(&ctx, &mut conn).await?;
        }
        Ok(conn)
    }
}

/// `POST /v1/{table}` — validate against the insert schema, insert, return
/// the full created row.
pub async fn create(ctx: &ApiContext, table: &str, body: &Value) -> Result<Value> {
    let meta = ctx.table(table)?;
    let columns = validate_insert(meta, body)?;
    let mut conn = ctx.acquire(table, Operation::Create).await?;

    let mut buf = ParamBuffer::new();
    let sql = if columns.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(&ctx.registry.schema, &meta.name),
            select_list(meta),
        )
    } else {
        let col_list = columns
            .keys()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = columns
            .iter()
            .map(|(name, bind)| {
                let ty = &meta.columns[name].ty;
                buf.placeholder(bind.clone(), ty)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(&ctx.registry.schema, &meta.name),
            col_list,
            placeholders,
            select_list(meta),
        )
    };

    let row = fetch_optional_row(&mut *conn, &sql, &buf.into_params())
        .await?
        .ok_or_else(|| {
            ApiError::db(
                "insert",
                sqlx::Error::RowNotFound,
            )
        })?;
    Ok(Value::Object(row_to_json(&row, &meta.columns)?))
}

/// `GET /v1/{table}/{pk...}` — `None` maps to 404 with a null body.
/// Soft-deleted rows are invisible here.
pub async fn get_by_pk(ctx: &ApiContext, table: &str, segments: &[String]) -> Result<Option<Value>> {
    let meta = ctx.table(table)?;
    let mut conn = ctx.acquire(table, Operation::Get).await?;

    let mut buf = ParamBuffer::new();
    let mut pred = pk_predicate(meta, segments, &mut buf)?;
    if let Some(sd) = meta.soft_delete() {
        pred.push_str(&format!(" AND {} IS NULL", quote_ident(sd)));
    }
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_list(meta),
        qualified_table(&ctx.registry.schema, &meta.name),
        pred,
    );
    let row = fetch_optional_row(&mut *conn, &sql, &buf.into_params()).await?;
    row.map(|r| row_to_json(&r, &meta.columns).map(Value::Object))
        .transpose()
}

/// `POST /v1/{table}/list`.
pub async fn list(ctx: &ApiContext, table: &str, req: &ListRequest) -> Result<ListResult> {
    // Table resolution first so unknown tables 404 before body validation.
    ctx.table(table)?;
    let mut conn = ctx.acquire(table, Operation::List).await?;
    let list_ctx = ListContext {
        pool: &ctx.pool,
        registry: &ctx.registry,
        include_depth: ctx.options.include_depth,
        strict_includes: ctx.options.strict_includes,
    };
    run_list(&mut conn, &list_ctx, table, req).await
}

/// `PATCH /v1/{table}/{pk...}` — primary-key keys are stripped from the
/// patch; an empty remainder is a validation error, a missing target 404s.
pub async fn update(
    ctx: &ApiContext,
    table: &str,
    segments: &[String],
    body: &Value,
) -> Result<Option<Value>> {
    let meta = ctx.table(table)?;

    let stripped = match body.as_object() {
        Some(obj) => {
            let mut copy = Map::new();
            for (k, v) in obj {
                if !meta.primary_key.iter().any(|pk| pk == k) {
                    copy.insert(k.clone(), v.clone());
                }
            }
            Value::Object(copy)
        }
        None => body.clone(),
    };
    let columns = validate_update(meta, &stripped)?;
    if columns.is_empty() {
        return Err(ApiError::invalid("body", "no updatable fields remain"));
    }

    let mut conn = ctx.acquire(table, Operation::Update).await?;
    let mut buf = ParamBuffer::new();
    let assignments = columns
        .iter()
        .map(|(name, bind)| {
            let ty = &meta.columns[name].ty;
            format!("{} = {}", quote_ident(name), buf.placeholder(bind.clone(), ty))
        })
        .collect::<Vec<_>>()
        .join(", ");
    let mut pred = pk_predicate(meta, segments, &mut buf)?;
    if let Some(sd) = meta.soft_delete() {
        pred.push_str(&format!(" AND {} IS NULL", quote_ident(sd)));
    }
    let sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        qualified_table(&ctx.registry.schema, &meta.name),
        assignments,
        pred,
        select_list(meta),
    );
    let row = fetch_optional_row(&mut *conn, &sql, &buf.into_params()).await?;
    row.map(|r| row_to_json(&r, &meta.columns).map(Value::Object))
        .transpose()
}

/// `DELETE /v1/{table}/{pk...}` — hard delete, or soft delete when the
/// configured column exists on the table (sets it and returns the row).
pub async fn delete(ctx: &ApiContext, table: &str, segments: &[String]) -> Result<Option<Value>> {
    let meta = ctx.table(table)?;
    let mut conn = ctx.acquire(table, Operation::Delete).await?;

    let mut buf = ParamBuffer::new();
    let pred = pk_predicate(meta, segments, &mut buf)?;
    let sql = match meta.soft_delete() {
        Some(sd) => format!(
            "UPDATE {} SET {} = now() WHERE {} AND {} IS NULL RETURNING {}",
            qualified_table(&ctx.registry.schema, &meta.name),
            quote_ident(sd),
            pred,
            quote_ident(sd),
            select_list(meta),
        ),
        None => format!(
            "DELETE FROM {} WHERE {} RETURNING {}",
            qualified_table(&ctx.registry.schema, &meta.name),
            pred,
            select_list(meta),
        ),
    };
    let row = fetch_optional_row(&mut *conn, &sql, &buf.into_params()).await?;
    row.map(|r| row_to_json(&r, &meta.columns).map(Value::Object))
        .transpose()
}

/// Predicate over the primary key from `/`-split path segments.
fn pk_predicate(meta: &TableMeta, segments: &[String], buf: &mut ParamBuffer) -> Result<String> {
    if meta.primary_key.is_empty() {
        return Err(ApiError::invalid(
            "pk",
            format!("'{}' has no primary key", meta.name),
        ));
    }
    if segments.len() != meta.primary_key.len() {
        return Err(ApiError::invalid(
            "pk",
            format!(
                "expected {} key segment(s), got {}",
                meta.primary_key.len(),
                segments.len()
            ),
        ));
    }
    let mut parts = Vec::with_capacity(segments.len());
    for (col, seg) in meta.primary_key.iter().zip(segments) {
        let Some(col_meta) = meta.column(col) else {
            return Err(ApiError::invalid("pk", format!("unknown key column '{col}'")));
        };
        let bind = bind_value_from_segment(&col_meta.ty, seg, &format!("pk.{col}"))
            .map_err(|issue| ApiError::Validation { issues: vec![issue] })?;
        let ph = buf.placeholder(bind, &col_meta.ty);
        parts.push(format!("{} = {}", quote_ident(col), ph));
    }
    Ok(parts.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ColumnMeta, ColumnType};

    fn composite_meta() -> TableMeta {
        let mut t = TableMeta::new("book_tags");
        t.columns.insert(
            "book_id".into(),
            ColumnMeta::new("book_id", ColumnType::Uuid),
        );
        t.columns
            .insert("tag_id".into(), ColumnMeta::new("tag_id", ColumnType::BigInt));
        t.primary_key = vec!["book_id".into(), "tag_id".into()];
        t
    }

    #[test]
    fn test_pk_predicate_composite() {
        let meta = composite_meta();
        let mut buf = ParamBuffer::new();
        let pred = pk_predicate(
            &meta,
            &[
                "5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f".to_string(),
                "42".to_string(),
            ],
            &mut buf,
        )
        .unwrap();
        assert_eq!(pred, "\"book_id\" = $1 AND \"tag_id\" = $2");
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_pk_predicate_wrong_arity() {
        let meta = composite_meta();
        let mut buf = ParamBuffer::new();
        assert!(pk_predicate(&meta, &["only-one".to_string()], &mut buf).is_err());
    }

    #[test]
    fn test_pk_predicate_bad_segment_type() {
        let meta = composite_meta();
        let mut buf = ParamBuffer::new();
        let err = pk_predicate(
            &meta,
            &[
                "5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f".to_string(),
                "not-a-number".to_string(),
            ],
            &mut buf,
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[test]
    fn test_server_options_defaults() {
        let opts = ServerOptions::default();
        assert_eq!(opts.include_depth, 3);
        assert!(!opts.strict_includes);
        assert_eq!(opts.api_key_header, "x-api-key");
    }
}
