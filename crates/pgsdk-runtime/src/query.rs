//! # List query execution
//!
//! Compiles a list request (filter, ordering, pagination, optional vector
//! search and include tree) into at most two primary queries — an exact
//! count and a page fetch — then hands the page to the include loader.
//! `total` disregards limit/offset; `hasMore` is `offset + returned < total`.

use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};

use crate::error::{ApiError, Result};
use crate::exec::{fetch_count, fetch_rows, qualified_table};
use crate::filter::compile_where;
use crate::include::{parse_include, validate_include, IncludeLoader, StitchError};
use crate::meta::{ApiRegistry, TableMeta, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::order::{parse_order, primary_key_order};
use crate::value::{quote_ident, row_to_json, select_list, ParamBuffer};
use crate::vector::{parse_vector_input, validate_vector, VectorSearch};

/// Body of `POST /v1/{table}/list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListRequest {
    pub include: Option<Value>,
    #[serde(rename = "where")]
    pub filter: Option<Value>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<Value>,
    pub order: Option<Value>,
    pub select: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub vector: Option<Value>,
    #[serde(rename = "includeDeleted", default)]
    pub include_deleted: bool,
}

#[derive(Debug)]
pub struct ListResult {
    pub data: Vec<Value>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
    pub include_errors: Vec<StitchError>,
}

pub struct ListContext<'a> {
    pub pool: &'a PgPool,
    pub registry: &'a ApiRegistry,
    pub include_depth: usize,
    pub strict_includes: bool,
}

/// Execute a validated list request. Primary queries run on `conn`; the
/// include loader draws per-query connections from the pool.
pub async fn run_list(
    conn: &mut PgConnection,
    ctx: &ListContext<'_>,
    table: &str,
    req: &ListRequest,
) -> Result<ListResult> {
    let Some(meta) = ctx.registry.table(table) else {
        return Err(ApiError::NotFound);
    };

    if req.select.is_some() && req.exclude.is_some() {
        return Err(ApiError::invalid(
            "select",
            "select and exclude are mutually exclusive",
        ));
    }
    for (list, name) in [(&req.select, "select"), (&req.exclude, "exclude")] {
        if let Some(cols) = list {
            for col in cols {
                if !meta.columns.contains_key(col) {
                    return Err(ApiError::invalid(
                        name,
                        format!("unknown column '{col}' on '{}'", meta.name),
                    ));
                }
            }
        }
    }

    let vector = match &req.vector {
        Some(v) => Some(validate_vector(meta, &parse_vector_input(v)?)?),
        None => None,
    };
    let order = parse_order(meta, req.order_by.as_ref(), req.order.as_ref(), "")?;

    // Validate the include tree up front so the page query never runs for a
    // request that would 400 anyway.
    let include = match &req.include {
        Some(v) => {
            let spec = parse_include(v, "include")?;
            validate_include(ctx.registry, table, &spec, ctx.include_depth)?;
            Some(spec)
        }
        None => None,
    };

    let limit = req.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let offset = req.offset.unwrap_or(0);

    // Exact count, disregarding limit/offset.
    let total = {
        let mut buf = ParamBuffer::new();
        let where_sql = count_predicate(meta, req, vector.as_ref(), &mut buf)?;
        let sql = format!(
            "SELECT count(*) FROM {} WHERE {}",
            qualified_table(&ctx.registry.schema, &meta.name),
            where_sql
        );
        fetch_count(&mut *conn, &sql, &buf.into_params()).await?
    };

    // Page query.
    let mut buf = ParamBuffer::new();
    let mut projection = select_list(meta);
    let mut order_parts: Vec<String> = Vec::new();
    let where_sql = {
        let mut conjuncts = base_conjuncts(meta, req, &mut buf)?;
        if let Some(v) = &vector {
            let dist = v.distance_expr(&mut buf);
            projection = format!("{projection}, {dist} AS _distance");
            order_parts.push(format!("{dist} ASC"));
            if let Some(pred) = v.threshold_predicate(&dist, &mut buf) {
                conjuncts.push(pred);
            }
        }
        join_conjuncts(conjuncts)
    };
    if !order.is_empty() {
        order_parts.push(order.to_sql(None));
    }
    let pk_order = primary_key_order(meta);
    if !pk_order.is_empty() {
        order_parts.push(pk_order.to_sql(None));
    }
    let order_sql = if order_parts.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order_parts.join(", "))
    };

    let limit_ph = buf.push(crate::value::BindValue::Int(limit as i64));
    let offset_ph = buf.push(crate::value::BindValue::Int(offset as i64));
    let sql = format!(
        "SELECT {} FROM {} WHERE {}{} LIMIT ${} OFFSET ${}",
        projection,
        qualified_table(&ctx.registry.schema, &meta.name),
        where_sql,
        order_sql,
        limit_ph,
        offset_ph,
    );

    let rows = fetch_rows(&mut *conn, &sql, &buf.into_params()).await?;
    let mut decoded = rows
        .iter()
        .map(|r| row_to_json(r, &meta.columns))
        .collect::<Result<Vec<_>>>()?;

    let mut include_errors = Vec::new();
    if let Some(spec) = &include {
        let loader = IncludeLoader::new(ctx.pool, ctx.registry)
            .with_max_depth(ctx.include_depth)
            .strict(ctx.strict_includes);
        let (loaded, errors) = loader.load(table, &decoded, spec).await?;
        decoded = loaded;
        include_errors = errors;
    }

    let data: Vec<Value> = decoded
        .into_iter()
        .map(|mut row| {
            apply_projection(&mut row, meta, req.select.as_deref(), req.exclude.as_deref());
            Value::Object(row)
        })
        .collect();

    let has_more = offset + (data.len() as u64) < total;
    Ok(ListResult {
        data,
        total,
        limit,
        offset,
        has_more,
        include_errors,
    })
}

/// WHERE clause for the count query. The query vector is only bound when a
/// threshold makes the distance part of the predicate.
fn count_predicate(
    meta: &TableMeta,
    req: &ListRequest,
    vector: Option<&VectorSearch>,
    buf: &mut ParamBuffer,
) -> Result<String> {
    let mut conjuncts = base_conjuncts(meta, req, buf)?;
    if let Some(v) = vector {
        if v.max_distance.is_some() {
            let dist = v.distance_expr(buf);
            if let Some(pred) = v.threshold_predicate(&dist, buf) {
                conjuncts.push(pred);
            }
        }
    }
    Ok(join_conjuncts(conjuncts))
}

fn base_conjuncts(meta: &TableMeta, req: &ListRequest, buf: &mut ParamBuffer) -> Result<Vec<String>> {
    let mut conjuncts = Vec::new();
    if let Some(filter) = &req.filter {
        conjuncts.push(compile_where(meta, filter, buf)?);
    }
    if let Some(sd) = meta.soft_delete() {
        if !req.include_deleted {
            conjuncts.push(format!("{} IS NULL", quote_ident(sd)));
        }
    }
    Ok(conjuncts)
}

fn join_conjuncts(conjuncts: Vec<String>) -> String {
    if conjuncts.is_empty() {
        "TRUE".to_string()
    } else if conjuncts.len() == 1 {
        conjuncts.into_iter().next().unwrap_or_else(|| "TRUE".to_string())
    } else {
        conjuncts
            .into_iter()
            .map(|c| format!("({c})"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Root-level select/exclude: trims the row's own columns, keeps relation
/// keys and `_distance`.
fn apply_projection(
    row: &mut Map<String, Value>,
    meta: &TableMeta,
    select: Option<&[String]>,
    exclude: Option<&[String]>,
) {
    if let Some(select) = select {
        let drop: Vec<String> = row
            .keys()
            .filter(|k| meta.columns.contains_key(*k) && !select.iter().any(|s| s == *k))
            .cloned()
            .collect();
        for k in drop {
            row.remove(&k);
        }
    } else if let Some(exclude) = exclude {
        for k in exclude {
            row.remove(k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ColumnMeta, ColumnType};
    use serde_json::json;

    fn books_meta() -> TableMeta {
        let mut t = TableMeta::new("books");
        t.columns
            .insert("id".into(), ColumnMeta::new("id", ColumnType::Uuid));
        t.columns
            .insert("title".into(), ColumnMeta::new("title", ColumnType::Text));
        t.columns.insert(
            "deleted_at".into(),
            ColumnMeta::new("deleted_at", ColumnType::TimestampTz).nullable(),
        );
        t.primary_key = vec!["id".into()];
        t.soft_delete_column = Some("deleted_at".into());
        t
    }

    #[test]
    fn test_list_request_rejects_unknown_keys() {
        let parsed: std::result::Result<ListRequest, _> =
            serde_json::from_value(json!({"limit": 10, "bogus": true}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_list_request_accepts_full_shape() {
        let req: ListRequest = serde_json::from_value(json!({
            "include": {"author": true},
            "where": {"title": {"$ilike": "%p%"}},
            "limit": 10,
            "offset": 20,
            "orderBy": ["title"],
            "order": "desc",
            "select": ["id", "title"],
            "vector": {"field": "emb", "query": [1, 0, 0]}
        }))
        .unwrap();
        assert_eq!(req.limit, Some(10));
        assert!(req.include.is_some());
        assert!(!req.include_deleted);
    }

    #[test]
    fn test_soft_delete_conjunct_added_by_default() {
        let meta = books_meta();
        let req = ListRequest::default();
        let mut buf = ParamBuffer::new();
        let conjuncts = base_conjuncts(&meta, &req, &mut buf).unwrap();
        assert_eq!(conjuncts, vec!["\"deleted_at\" IS NULL".to_string()]);

        let mut req = ListRequest::default();
        req.include_deleted = true;
        let mut buf = ParamBuffer::new();
        assert!(base_conjuncts(&meta, &req, &mut buf).unwrap().is_empty());
    }

    #[test]
    fn test_join_conjuncts() {
        assert_eq!(join_conjuncts(vec![]), "TRUE");
        assert_eq!(join_conjuncts(vec!["a = $1".into()]), "a = $1");
        assert_eq!(
            join_conjuncts(vec!["a = $1".into(), "b IS NULL".into()]),
            "(a = $1) AND (b IS NULL)"
        );
    }

    #[test]
    fn test_apply_projection_select() {
        let meta = books_meta();
        let mut row = json!({"id": "x", "title": "T", "deleted_at": null, "author": {"name": "J"}, "_distance": 0.1})
            .as_object()
            .unwrap()
            .clone();
        apply_projection(&mut row, &meta, Some(&["title".to_string()]), None);
        assert!(row.contains_key("title"));
        assert!(row.contains_key("author"));
        assert!(row.contains_key("_distance"));
        assert!(!row.contains_key("id"));
    }
}
