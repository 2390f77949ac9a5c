//! # Value binding and row decoding
//!
//! Bridges the three value worlds of a generated endpoint: JSON input from
//! the wire, positional SQL bind parameters, and decoded result rows. Every
//! user-supplied value crosses into SQL exclusively through a `BindValue` —
//! never through string splicing — and every identifier that reaches SQL is
//! double-quoted after passing a column allow-list upstream.

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, Postgres, Row};

use crate::error::{ApiError, Issue};
use crate::meta::{ColumnMeta, ColumnType, TableMeta};

/// Double-quote a SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A value bound positionally into a query.
#[derive(Debug, Clone)]
pub enum BindValue {
    /// Typed NULL — the type picks the `None::<T>` bind.
    Null(ColumnType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(uuid::Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Json(Value),
    Bytes(Vec<u8>),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    TextArray(Vec<String>),
    UuidArray(Vec<uuid::Uuid>),
}

/// Accumulates bind parameters while a SQL string is being assembled.
/// Placeholders are 1-based and carry the cast the column type requires.
#[derive(Debug, Default)]
pub struct ParamBuffer {
    params: Vec<BindValue>,
}

impl ParamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a value and return its 1-based placeholder index.
    pub fn push(&mut self, value: BindValue) -> usize {
        self.params.push(value);
        self.params.len()
    }

    /// Push a value and render its placeholder, including any cast the
    /// column type needs (`$3::numeric`, `$4::vector`, `$5::"status"`).
    pub fn placeholder(&mut self, value: BindValue, ty: &ColumnType) -> String {
        let idx = self.push(value);
        match ty {
            ColumnType::Array(inner) => match array_cast(inner) {
                Some(cast) => format!("${idx}::{cast}"),
                None => format!("${idx}"),
            },
            other => match other.param_cast() {
                Some(cast) => format!("${idx}{cast}"),
                None => format!("${idx}"),
            },
        }
    }

    /// Placeholder for an array-membership test (`= ANY($n::text[])`).
    pub fn any_placeholder(&mut self, value: BindValue, cast: &str) -> String {
        let idx = self.push(value);
        format!("${idx}::{cast}")
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_params(self) -> Vec<BindValue> {
        self.params
    }
}

/// SQL array type for binding a whole array column value.
fn array_cast(inner: &ColumnType) -> Option<String> {
    match inner {
        ColumnType::Integer => Some("int4[]".to_string()),
        ColumnType::BigInt => Some("int8[]".to_string()),
        ColumnType::Float => Some("float4[]".to_string()),
        ColumnType::Double => Some("float8[]".to_string()),
        ColumnType::Numeric => Some("numeric[]".to_string()),
        ColumnType::Text => Some("text[]".to_string()),
        ColumnType::Uuid => Some("uuid[]".to_string()),
        ColumnType::Boolean => Some("bool[]".to_string()),
        ColumnType::Timestamp => Some("timestamp[]".to_string()),
        ColumnType::TimestampTz => Some("timestamptz[]".to_string()),
        ColumnType::Date => Some("date[]".to_string()),
        ColumnType::Enum(name) => Some(format!("\"{}\"[]", name.replace('"', "\"\""))),
        _ => None,
    }
}

/// Bind every parameter onto a prepared query, in order.
pub fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &[BindValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            BindValue::Null(ty) => bind_null(query, ty),
            BindValue::Bool(v) => query.bind(*v),
            BindValue::Int(v) => query.bind(*v),
            BindValue::Float(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.clone()),
            BindValue::Uuid(v) => query.bind(*v),
            BindValue::Timestamp(v) => query.bind(*v),
            BindValue::TimestampTz(v) => query.bind(*v),
            BindValue::Date(v) => query.bind(*v),
            BindValue::Json(v) => query.bind(v.clone()),
            BindValue::Bytes(v) => query.bind(v.clone()),
            BindValue::BoolArray(v) => query.bind(v.clone()),
            BindValue::IntArray(v) => query.bind(v.clone()),
            BindValue::FloatArray(v) => query.bind(v.clone()),
            BindValue::TextArray(v) => query.bind(v.clone()),
            BindValue::UuidArray(v) => query.bind(v.clone()),
        };
    }
    query
}

fn bind_null<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    ty: &ColumnType,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match ty {
        ColumnType::Uuid => query.bind(None::<uuid::Uuid>),
        ColumnType::Integer | ColumnType::BigInt => query.bind(None::<i64>),
        ColumnType::Float | ColumnType::Double => query.bind(None::<f64>),
        ColumnType::Boolean => query.bind(None::<bool>),
        ColumnType::Timestamp => query.bind(None::<NaiveDateTime>),
        ColumnType::TimestampTz => query.bind(None::<DateTime<Utc>>),
        ColumnType::Date => query.bind(None::<NaiveDate>),
        ColumnType::Json => query.bind(None::<Value>),
        ColumnType::Bytea => query.bind(None::<Vec<u8>>),
        ColumnType::Array(inner) => match inner.as_ref() {
            ColumnType::Integer | ColumnType::BigInt => query.bind(None::<Vec<i64>>),
            ColumnType::Float | ColumnType::Double => query.bind(None::<Vec<f64>>),
            ColumnType::Boolean => query.bind(None::<Vec<bool>>),
            ColumnType::Uuid => query.bind(None::<Vec<uuid::Uuid>>),
            _ => query.bind(None::<Vec<String>>),
        },
        // Text-carried types: text, enum, numeric, vector.
        _ => query.bind(None::<String>),
    }
}

/// Convert a JSON value into a bind value for the given column type.
///
/// `path` names the input location for validation issues. A JSON `null`
/// becomes a typed NULL; nullability is the caller's concern.
pub fn bind_value_from_json(
    ty: &ColumnType,
    value: &Value,
    path: &str,
) -> std::result::Result<BindValue, Issue> {
    if value.is_null() {
        return Ok(BindValue::Null(ty.clone()));
    }
    match ty {
        ColumnType::Uuid => match value.as_str().and_then(|s| uuid::Uuid::parse_str(s).ok()) {
            Some(u) => Ok(BindValue::Uuid(u)),
            None => Err(Issue::new(path, "expected a UUID string")),
        },
        ColumnType::Text | ColumnType::Enum(_) => match value.as_str() {
            Some(s) => Ok(BindValue::Text(s.to_string())),
            None => Err(Issue::new(path, "expected a string")),
        },
        ColumnType::Integer | ColumnType::BigInt => match value.as_i64() {
            Some(n) => Ok(BindValue::Int(n)),
            None => Err(Issue::new(path, "expected an integer")),
        },
        ColumnType::Float | ColumnType::Double => match value.as_f64() {
            Some(n) => Ok(BindValue::Float(n)),
            None => Err(Issue::new(path, "expected a number")),
        },
        ColumnType::Numeric => match value {
            Value::Number(n) => Ok(BindValue::Text(n.to_string())),
            Value::String(s) if s.parse::<f64>().is_ok() => Ok(BindValue::Text(s.clone())),
            _ => Err(Issue::new(path, "expected a number")),
        },
        ColumnType::Boolean => match value.as_bool() {
            Some(b) => Ok(BindValue::Bool(b)),
            None => Err(Issue::new(path, "expected a boolean")),
        },
        ColumnType::Timestamp => parse_timestamp(value, path).map(BindValue::Timestamp),
        ColumnType::TimestampTz => match value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            Some(dt) => Ok(BindValue::TimestampTz(dt.with_timezone(&Utc))),
            None => Err(Issue::new(path, "expected an RFC 3339 timestamp string")),
        },
        ColumnType::Date => match value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        {
            Some(d) => Ok(BindValue::Date(d)),
            None => Err(Issue::new(path, "expected a YYYY-MM-DD date string")),
        },
        ColumnType::Json => Ok(BindValue::Json(value.clone())),
        ColumnType::Bytea => match value
            .as_str()
            .and_then(|s| base64::engine::general_purpose::STANDARD.decode(s).ok())
        {
            Some(bytes) => Ok(BindValue::Bytes(bytes)),
            None => Err(Issue::new(path, "expected a base64 string")),
        },
        ColumnType::Array(inner) => array_from_json(inner, value, path),
        ColumnType::Vector(dim) => vector_from_json(*dim, value, path),
    }
}

fn parse_timestamp(value: &Value, path: &str) -> std::result::Result<NaiveDateTime, Issue> {
    let Some(s) = value.as_str() else {
        return Err(Issue::new(path, "expected a timestamp string"));
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    Err(Issue::new(path, "expected a timestamp string"))
}

fn array_from_json(
    inner: &ColumnType,
    value: &Value,
    path: &str,
) -> std::result::Result<BindValue, Issue> {
    let Some(items) = value.as_array() else {
        return Err(Issue::new(path, "expected an array"));
    };
    match inner {
        ColumnType::Integer | ColumnType::BigInt => items
            .iter()
            .map(|v| v.as_i64().ok_or_else(|| Issue::new(path, "expected integer elements")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(BindValue::IntArray),
        ColumnType::Float | ColumnType::Double => items
            .iter()
            .map(|v| v.as_f64().ok_or_else(|| Issue::new(path, "expected number elements")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(BindValue::FloatArray),
        ColumnType::Boolean => items
            .iter()
            .map(|v| v.as_bool().ok_or_else(|| Issue::new(path, "expected boolean elements")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(BindValue::BoolArray),
        ColumnType::Uuid => items
            .iter()
            .map(|v| {
                v.as_str()
                    .and_then(|s| uuid::Uuid::parse_str(s).ok())
                    .ok_or_else(|| Issue::new(path, "expected UUID elements"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(BindValue::UuidArray),
        ColumnType::Text
        | ColumnType::Enum(_)
        | ColumnType::Numeric
        | ColumnType::Timestamp
        | ColumnType::TimestampTz
        | ColumnType::Date => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .or_else(|| v.as_number().map(|n| n.to_string()))
                    .ok_or_else(|| Issue::new(path, "expected string elements"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(BindValue::TextArray),
        _ => Err(Issue::new(path, "unsupported array element type")),
    }
}

/// A query vector binds as its pgvector text form, cast back with `::vector`.
fn vector_from_json(dim: u32, value: &Value, path: &str) -> std::result::Result<BindValue, Issue> {
    let Some(items) = value.as_array() else {
        return Err(Issue::new(path, "expected an array of numbers"));
    };
    if items.len() != dim as usize {
        return Err(Issue::new(
            path,
            format!("expected a vector of dimension {dim}, got {}", items.len()),
        ));
    }
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item.as_f64() {
            Some(n) => parts.push(format!("{n}")),
            None => return Err(Issue::new(path, "expected an array of numbers")),
        }
    }
    Ok(BindValue::Text(format!("[{}]", parts.join(","))))
}

/// Convert a path segment (composite PKs arrive `/`-separated) into a bind
/// value for the given primary-key column.
pub fn bind_value_from_segment(
    ty: &ColumnType,
    segment: &str,
    path: &str,
) -> std::result::Result<BindValue, Issue> {
    match ty {
        ColumnType::Integer | ColumnType::BigInt => segment
            .parse::<i64>()
            .map(BindValue::Int)
            .map_err(|_| Issue::new(path, "expected an integer key")),
        ColumnType::Float | ColumnType::Double => segment
            .parse::<f64>()
            .map(BindValue::Float)
            .map_err(|_| Issue::new(path, "expected a numeric key")),
        ColumnType::Boolean => segment
            .parse::<bool>()
            .map(BindValue::Bool)
            .map_err(|_| Issue::new(path, "expected a boolean key")),
        _ => bind_value_from_json(ty, &Value::String(segment.to_string()), path),
    }
}

/// Build the SELECT projection for a table: every column, with the casts
/// that make enum, numeric, vector, and exotic array columns decodable.
pub fn select_list(table: &TableMeta) -> String {
    select_list_prefixed(table, None)
}

pub fn select_list_prefixed(table: &TableMeta, prefix: Option<&str>) -> String {
    table
        .columns
        .values()
        .map(|col| column_expr(col, prefix))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_expr(col: &ColumnMeta, prefix: Option<&str>) -> String {
    let quoted = quote_ident(&col.name);
    let qualified = match prefix {
        Some(p) => format!("{p}.{quoted}"),
        None => quoted.clone(),
    };
    match &col.ty {
        ColumnType::Enum(_) | ColumnType::Numeric | ColumnType::Vector(_) => {
            format!("{qualified}::text AS {quoted}")
        }
        ColumnType::Array(inner) => match inner.as_ref() {
            ColumnType::Enum(_)
            | ColumnType::Numeric
            | ColumnType::Timestamp
            | ColumnType::TimestampTz
            | ColumnType::Date => format!("{qualified}::text[] AS {quoted}"),
            _ => qualified,
        },
        _ => qualified,
    }
}

/// Decode a result row into a JSON object, driven by column metadata.
/// Internal aliases (window row numbers, stitch keys) are skipped; a
/// `_distance` projection from vector search decodes as a number.
pub fn row_to_json(
    row: &PgRow,
    columns: &IndexMap<String, ColumnMeta>,
) -> crate::error::Result<Map<String, Value>> {
    let mut out = Map::new();
    for col in row.columns() {
        let name = col.name();
        if let Some(meta) = columns.get(name) {
            out.insert(name.to_string(), decode_column(row, name, &meta.ty)?);
        } else if name == "_distance" {
            let v: Option<f64> = row.try_get(name).map_err(|e| ApiError::db("decode row", e))?;
            out.insert(name.to_string(), float_value(v));
        }
        // anything else is loader plumbing (e.g. "__rn") and stays internal
    }
    Ok(out)
}

fn decode_column(row: &PgRow, name: &str, ty: &ColumnType) -> crate::error::Result<Value> {
    let err = |e: sqlx::Error| ApiError::db("decode row", e);
    let value = match ty {
        ColumnType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)
            .map_err(err)?
            .map(|u| Value::String(u.to_string())),
        ColumnType::Text | ColumnType::Enum(_) => row
            .try_get::<Option<String>, _>(name)
            .map_err(err)?
            .map(Value::String),
        ColumnType::Integer => row
            .try_get::<Option<i32>, _>(name)
            .map_err(err)?
            .map(|n| Value::Number(n.into())),
        ColumnType::BigInt => row
            .try_get::<Option<i64>, _>(name)
            .map_err(err)?
            .map(|n| Value::Number(n.into())),
        ColumnType::Float => row
            .try_get::<Option<f32>, _>(name)
            .map_err(err)?
            .map(|n| float_value(Some(n as f64))),
        ColumnType::Double => row
            .try_get::<Option<f64>, _>(name)
            .map_err(err)?
            .map(|n| float_value(Some(n))),
        ColumnType::Numeric => row
            .try_get::<Option<String>, _>(name)
            .map_err(err)?
            .map(|s| match s.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                None => Value::String(s),
            }),
        ColumnType::Boolean => row
            .try_get::<Option<bool>, _>(name)
            .map_err(err)?
            .map(Value::Bool),
        ColumnType::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(name)
            .map_err(err)?
            .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        ColumnType::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(name)
            .map_err(err)?
            .map(|t| Value::String(t.to_rfc3339())),
        ColumnType::Date => row
            .try_get::<Option<NaiveDate>, _>(name)
            .map_err(err)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ColumnType::Json => row.try_get::<Option<Value>, _>(name).map_err(err)?,
        ColumnType::Bytea => row
            .try_get::<Option<Vec<u8>>, _>(name)
            .map_err(err)?
            .map(|b| Value::String(base64::engine::general_purpose::STANDARD.encode(b))),
        ColumnType::Array(inner) => decode_array(row, name, inner)?,
        ColumnType::Vector(_) => row
            .try_get::<Option<String>, _>(name)
            .map_err(err)?
            .map(|s| parse_vector_text(&s)),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn decode_array(row: &PgRow, name: &str, inner: &ColumnType) -> crate::error::Result<Option<Value>> {
    let err = |e: sqlx::Error| ApiError::db("decode row", e);
    let value = match inner {
        ColumnType::Integer => row
            .try_get::<Option<Vec<i32>>, _>(name)
            .map_err(err)?
            .map(|v| Value::Array(v.into_iter().map(|n| Value::Number(n.into())).collect())),
        ColumnType::BigInt => row
            .try_get::<Option<Vec<i64>>, _>(name)
            .map_err(err)?
            .map(|v| Value::Array(v.into_iter().map(|n| Value::Number(n.into())).collect())),
        ColumnType::Float => row
            .try_get::<Option<Vec<f32>>, _>(name)
            .map_err(err)?
            .map(|v| Value::Array(v.into_iter().map(|n| float_value(Some(n as f64))).collect())),
        ColumnType::Double => row
            .try_get::<Option<Vec<f64>>, _>(name)
            .map_err(err)?
            .map(|v| Value::Array(v.into_iter().map(|n| float_value(Some(n))).collect())),
        ColumnType::Boolean => row
            .try_get::<Option<Vec<bool>>, _>(name)
            .map_err(err)?
            .map(|v| Value::Array(v.into_iter().map(Value::Bool).collect())),
        ColumnType::Uuid => row
            .try_get::<Option<Vec<uuid::Uuid>>, _>(name)
            .map_err(err)?
            .map(|v| Value::Array(v.into_iter().map(|u| Value::String(u.to_string())).collect())),
        // everything else was projected as text[]
        _ => row
            .try_get::<Option<Vec<String>>, _>(name)
            .map_err(err)?
            .map(|v| Value::Array(v.into_iter().map(Value::String).collect())),
    };
    Ok(value)
}

/// Parse pgvector's text form (`[0.1,0.2,0.3]`) into a JSON number array.
fn parse_vector_text(s: &str) -> Value {
    let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
    let nums: Vec<Value> = trimmed
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| float_value(p.trim().parse::<f64>().ok()))
        .collect();
    Value::Array(nums)
}

fn float_value(v: Option<f64>) -> Value {
    match v.and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_placeholder_casts() {
        let mut buf = ParamBuffer::new();
        let ph = buf.placeholder(BindValue::Text("1.5".into()), &ColumnType::Numeric);
        assert_eq!(ph, "$1::numeric");
        let ph = buf.placeholder(BindValue::Text("x".into()), &ColumnType::Text);
        assert_eq!(ph, "$2");
        let ph = buf.placeholder(
            BindValue::Text("[1,0,0]".into()),
            &ColumnType::Vector(3),
        );
        assert_eq!(ph, "$3::vector");
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_bind_value_uuid_rejects_garbage() {
        let err = bind_value_from_json(&ColumnType::Uuid, &json!("nope"), "id").unwrap_err();
        assert_eq!(err.path, "id");
        assert!(bind_value_from_json(
            &ColumnType::Uuid,
            &json!("5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f"),
            "id"
        )
        .is_ok());
    }

    #[test]
    fn test_bind_value_null_is_typed() {
        let v = bind_value_from_json(&ColumnType::Integer, &Value::Null, "age").unwrap();
        assert!(matches!(v, BindValue::Null(ColumnType::Integer)));
    }

    #[test]
    fn test_bind_value_integer_rejects_float() {
        assert!(bind_value_from_json(&ColumnType::Integer, &json!(1.5), "n").is_err());
        assert!(bind_value_from_json(&ColumnType::Integer, &json!(7), "n").is_ok());
    }

    #[test]
    fn test_vector_dimension_checked() {
        let err = vector_from_json(3, &json!([1.0, 0.0]), "vector.query").unwrap_err();
        assert!(err.message.contains("dimension 3"));
        let ok = vector_from_json(3, &json!([1.0, 0.0, 0.0]), "vector.query").unwrap();
        match ok {
            BindValue::Text(s) => assert_eq!(s, "[1,0,0]"),
            other => panic!("expected text bind, got {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_accepts_rfc3339_and_naive() {
        assert!(parse_timestamp(&json!("2024-05-01T10:30:00Z"), "t").is_ok());
        assert!(parse_timestamp(&json!("2024-05-01T10:30:00.250"), "t").is_ok());
        assert!(parse_timestamp(&json!("2024-05-01 10:30:00"), "t").is_ok());
        assert!(parse_timestamp(&json!("yesterday"), "t").is_err());
    }

    #[test]
    fn test_segment_parsing_for_pk_types() {
        assert!(matches!(
            bind_value_from_segment(&ColumnType::BigInt, "42", "pk.id").unwrap(),
            BindValue::Int(42)
        ));
        assert!(bind_value_from_segment(&ColumnType::BigInt, "x", "pk.id").is_err());
        assert!(matches!(
            bind_value_from_segment(&ColumnType::Text, "slug-1", "pk.slug").unwrap(),
            BindValue::Text(_)
        ));
    }

    #[test]
    fn test_select_list_casts_enum_numeric_vector() {
        let mut t = TableMeta::new("items");
        t.columns
            .insert("id".into(), ColumnMeta::new("id", ColumnType::Uuid));
        t.columns.insert(
            "status".into(),
            ColumnMeta::new("status", ColumnType::Enum("item_status".into())),
        );
        t.columns.insert(
            "price".into(),
            ColumnMeta::new("price", ColumnType::Numeric),
        );
        t.columns
            .insert("emb".into(), ColumnMeta::new("emb", ColumnType::Vector(3)));

        let list = select_list(&t);
        assert!(list.contains("\"id\""));
        assert!(list.contains("\"status\"::text AS \"status\""));
        assert!(list.contains("\"price\"::text AS \"price\""));
        assert!(list.contains("\"emb\"::text AS \"emb\""));
    }

    #[test]
    fn test_parse_vector_text() {
        assert_eq!(parse_vector_text("[1,0.5,0]"), json!([1.0, 0.5, 0.0]));
        assert_eq!(parse_vector_text("[]"), json!([]));
    }
}
