//! # Filter compiler
//!
//! Compiles the wire filter format — operator-prefixed leaves plus `$and` /
//! `$or` groups — into a parameterized SQL predicate. Two phases: an explicit
//! parser that turns loose JSON into a tagged `Filter` tree (rejecting
//! unknown shapes early), then a compiler that validates every column and
//! operator against the table's metadata and renders SQL.
//!
//! The injection invariant lives here: every user value leaves through the
//! `ParamBuffer`, every identifier passes the column allow-list and is
//! double-quoted.

use serde_json::Value;

use crate::error::{ApiError, Issue, Result};
use crate::meta::{ColumnType, TableMeta};
use crate::value::{bind_value_from_json, quote_ident, BindValue, ParamBuffer};

/// Maximum nesting depth of `$and`/`$or` groups.
const MAX_GROUP_DEPTH: usize = 2;

/// Parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Leaf { column: String, op: FilterOp },
}

/// Closed operator set for column leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Like(String),
    Ilike(String),
    IsNull,
    IsNotNull,
}

/// Parse a JSON filter into a `Filter` tree, validating shape only.
///
/// A root object mixes column leaves (implicit AND) with at most one
/// `$and`/`$or` key; group members are themselves filter objects.
pub fn parse_filter(value: &Value, path: &str) -> Result<Filter> {
    parse_object(value, path, 0)
}

fn parse_object(value: &Value, path: &str, group_depth: usize) -> Result<Filter> {
    let Some(obj) = value.as_object() else {
        return Err(ApiError::invalid(path, "filter must be an object"));
    };

    let mut parts: Vec<Filter> = Vec::new();
    let mut group_seen = false;

    for (key, val) in obj {
        if key == "$and" || key == "$or" {
            if group_seen {
                return Err(ApiError::invalid(
                    path,
                    "a filter object may contain at most one $and/$or key",
                ));
            }
            group_seen = true;
            if group_depth >= MAX_GROUP_DEPTH {
                return Err(ApiError::invalid(
                    format!("{path}.{key}"),
                    format!("group nesting deeper than {MAX_GROUP_DEPTH} is not allowed"),
                ));
            }
            let Some(items) = val.as_array() else {
                return Err(ApiError::invalid(
                    format!("{path}.{key}"),
                    "expected an array of filters",
                ));
            };
            let children = items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_object(item, &format!("{path}.{key}[{i}]"), group_depth + 1))
                .collect::<Result<Vec<_>>>()?;
            parts.push(if key == "$and" {
                Filter::And(children)
            } else {
                Filter::Or(children)
            });
        } else if key.starts_with('$') {
            return Err(ApiError::invalid(
                format!("{path}.{key}"),
                "unknown logical operator",
            ));
        } else {
            parts.push(parse_leaf(key, val, path)?);
        }
    }

    // A bare `{}` is an empty conjunction: matches everything.
    if parts.len() == 1 {
        Ok(parts.into_iter().next().unwrap_or(Filter::And(Vec::new())))
    } else {
        Ok(Filter::And(parts))
    }
}

fn parse_leaf(column: &str, value: &Value, path: &str) -> Result<Filter> {
    let leaf_path = format!("{path}.{column}");

    let Some(obj) = value.as_object() else {
        // Direct value: shorthand for $eq (null handled at compile time).
        return Ok(Filter::Leaf {
            column: column.to_string(),
            op: FilterOp::Eq(value.clone()),
        });
    };

    // An object value must be an operator object: all keys from the closed set.
    if obj.is_empty() || !obj.keys().all(|k| k.starts_with('$')) {
        return Err(ApiError::invalid(
            leaf_path,
            "expected an operator object ($eq, $ne, $gt, $gte, $lt, $lte, $in, $nin, $like, $ilike, $is, $isNot)",
        ));
    }

    let mut ops = Vec::new();
    for (op_key, op_val) in obj {
        let op_path = format!("{leaf_path}.{op_key}");
        let op = match op_key.as_str() {
            "$eq" => FilterOp::Eq(op_val.clone()),
            "$ne" => FilterOp::Ne(op_val.clone()),
            "$gt" => FilterOp::Gt(op_val.clone()),
            "$gte" => FilterOp::Gte(op_val.clone()),
            "$lt" => FilterOp::Lt(op_val.clone()),
            "$lte" => FilterOp::Lte(op_val.clone()),
            "$in" | "$nin" => {
                let Some(items) = op_val.as_array() else {
                    return Err(ApiError::invalid(op_path, "expected an array"));
                };
                if op_key == "$in" {
                    FilterOp::In(items.clone())
                } else {
                    FilterOp::Nin(items.clone())
                }
            }
            "$like" | "$ilike" => {
                let Some(s) = op_val.as_str() else {
                    return Err(ApiError::invalid(op_path, "expected a string pattern"));
                };
                if op_key == "$like" {
                    FilterOp::Like(s.to_string())
                } else {
                    FilterOp::Ilike(s.to_string())
                }
            }
            "$is" | "$isNot" => {
                if !op_val.is_null() {
                    return Err(ApiError::invalid(op_path, "only the literal null is accepted"));
                }
                if op_key == "$is" {
                    FilterOp::IsNull
                } else {
                    FilterOp::IsNotNull
                }
            }
            _ => return Err(ApiError::invalid(op_path, "unknown operator")),
        };
        ops.push(Filter::Leaf {
            column: column.to_string(),
            op,
        });
    }

    if ops.len() == 1 {
        Ok(ops.into_iter().next().unwrap_or(Filter::And(Vec::new())))
    } else {
        // Multiple operators on one column conjoin.
        Ok(Filter::And(ops))
    }
}

/// Compile a parsed filter against a table into a SQL predicate.
/// Values land in `buf`; the returned string contains only identifiers from
/// the table's column set and positional placeholders.
pub fn compile_filter(table: &TableMeta, filter: &Filter, buf: &mut ParamBuffer) -> Result<String> {
    match filter {
        Filter::And(children) => compile_group(table, children, " AND ", "TRUE", buf),
        Filter::Or(children) => compile_group(table, children, " OR ", "FALSE", buf),
        Filter::Leaf { column, op } => compile_leaf(table, column, op, buf),
    }
}

fn compile_group(
    table: &TableMeta,
    children: &[Filter],
    joiner: &str,
    empty: &str,
    buf: &mut ParamBuffer,
) -> Result<String> {
    if children.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = children
        .iter()
        .map(|c| compile_filter(table, c, buf))
        .collect::<Result<Vec<_>>>()?;
    if parts.len() == 1 {
        Ok(parts.into_iter().next().unwrap_or_else(|| empty.to_string()))
    } else {
        Ok(format!("({})", parts.join(joiner)))
    }
}

fn compile_leaf(
    table: &TableMeta,
    column: &str,
    op: &FilterOp,
    buf: &mut ParamBuffer,
) -> Result<String> {
    let Some(col) = table.column(column) else {
        return Err(ApiError::invalid(
            format!("where.{column}"),
            format!("unknown column on '{}'", table.name),
        ));
    };
    let path = format!("where.{column}");

    // Enum columns compare through text so the bound parameter stays text.
    let expr = match &col.ty {
        ColumnType::Enum(_) => format!("{}::text", quote_ident(column)),
        _ => quote_ident(column),
    };
    let ty = match &col.ty {
        ColumnType::Enum(_) => &ColumnType::Text,
        other => other,
    };

    match op {
        FilterOp::Eq(v) if v.is_null() => Ok(format!("{expr} IS NULL")),
        FilterOp::Ne(v) if v.is_null() => Ok(format!("{expr} IS NOT NULL")),
        FilterOp::Eq(v) => {
            let ph = buf.placeholder(convert(ty, v, &path)?, ty);
            Ok(format!("{expr} = {ph}"))
        }
        FilterOp::Ne(v) => {
            let ph = buf.placeholder(convert(ty, v, &path)?, ty);
            Ok(format!("{expr} <> {ph}"))
        }
        FilterOp::Gt(v) | FilterOp::Gte(v) | FilterOp::Lt(v) | FilterOp::Lte(v) => {
            if !col.ty.is_comparable() {
                return Err(ApiError::invalid(
                    path,
                    "ordering comparison is not supported for this column type",
                ));
            }
            let sql_op = match op {
                FilterOp::Gt(_) => ">",
                FilterOp::Gte(_) => ">=",
                FilterOp::Lt(_) => "<",
                _ => "<=",
            };
            let ph = buf.placeholder(convert(ty, v, &path)?, ty);
            Ok(format!("{expr} {sql_op} {ph}"))
        }
        FilterOp::In(items) | FilterOp::Nin(items) => {
            let negated = matches!(op, FilterOp::Nin(_));
            if items.is_empty() {
                // Empty $in matches nothing; empty $nin matches everything.
                return Ok(if negated { "TRUE" } else { "FALSE" }.to_string());
            }
            let Some(cast) = col.ty.any_array_cast() else {
                return Err(ApiError::invalid(
                    path,
                    "membership tests are not supported for this column type",
                ));
            };
            let array = membership_array(ty, items, &path)?;
            let ph = buf.any_placeholder(array, cast);
            if negated {
                Ok(format!("NOT ({expr} = ANY({ph}))"))
            } else {
                Ok(format!("{expr} = ANY({ph})"))
            }
        }
        FilterOp::Like(pattern) | FilterOp::Ilike(pattern) => {
            if !col.ty.is_text() {
                return Err(ApiError::invalid(path, "pattern match requires a text column"));
            }
            let sql_op = if matches!(op, FilterOp::Like(_)) {
                "LIKE"
            } else {
                "ILIKE"
            };
            let ph = buf.placeholder(BindValue::Text(pattern.clone()), &ColumnType::Text);
            Ok(format!("{expr} {sql_op} {ph}"))
        }
        FilterOp::IsNull => Ok(format!("{expr} IS NULL")),
        FilterOp::IsNotNull => Ok(format!("{expr} IS NOT NULL")),
    }
}

fn convert(ty: &ColumnType, value: &Value, path: &str) -> Result<BindValue> {
    bind_value_from_json(ty, value, path).map_err(|issue| ApiError::Validation {
        issues: vec![issue],
    })
}

/// Fold membership-test items into one typed array bind.
pub(crate) fn membership_array(ty: &ColumnType, items: &[Value], path: &str) -> Result<BindValue> {
    let mut converted = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if item.is_null() {
            return Err(ApiError::invalid(
                format!("{path}[{i}]"),
                "null is not allowed inside $in/$nin; use $is",
            ));
        }
        converted.push(convert(ty, item, &format!("{path}[{i}]"))?);
    }

    // All elements converted to the same scalar family; collapse into one array.
    match ty {
        ColumnType::Uuid => Ok(BindValue::UuidArray(
            converted
                .into_iter()
                .filter_map(|v| match v {
                    BindValue::Uuid(u) => Some(u),
                    _ => None,
                })
                .collect(),
        )),
        ColumnType::Integer | ColumnType::BigInt => Ok(BindValue::IntArray(
            converted
                .into_iter()
                .filter_map(|v| match v {
                    BindValue::Int(n) => Some(n),
                    _ => None,
                })
                .collect(),
        )),
        ColumnType::Float | ColumnType::Double => Ok(BindValue::FloatArray(
            converted
                .into_iter()
                .filter_map(|v| match v {
                    BindValue::Float(n) => Some(n),
                    _ => None,
                })
                .collect(),
        )),
        ColumnType::Boolean => Ok(BindValue::BoolArray(
            converted
                .into_iter()
                .filter_map(|v| match v {
                    BindValue::Bool(b) => Some(b),
                    _ => None,
                })
                .collect(),
        )),
        // Text, enum, numeric, and temporal types ride as text and are cast
        // server-side by the `ANY($n::<type>[])` expression.
        _ => Ok(BindValue::TextArray(
            converted
                .into_iter()
                .filter_map(|v| match v {
                    BindValue::Text(s) => Some(s),
                    BindValue::Timestamp(t) => Some(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
                    BindValue::TimestampTz(t) => Some(t.to_rfc3339()),
                    BindValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
                    _ => None,
                })
                .collect(),
        )),
    }
}

/// Parse and compile in one step — the common handler path.
pub fn compile_where(table: &TableMeta, value: &Value, buf: &mut ParamBuffer) -> Result<String> {
    let filter = parse_filter(value, "where")?;
    compile_filter(table, &filter, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ColumnMeta;
    use serde_json::json;

    fn authors_table() -> TableMeta {
        let mut t = TableMeta::new("authors");
        t.columns
            .insert("id".into(), ColumnMeta::new("id", ColumnType::Uuid));
        t.columns
            .insert("name".into(), ColumnMeta::new("name", ColumnType::Text));
        t.columns.insert(
            "age".into(),
            ColumnMeta::new("age", ColumnType::Integer).nullable(),
        );
        t.columns.insert(
            "active".into(),
            ColumnMeta::new("active", ColumnType::Boolean),
        );
        t.columns.insert(
            "meta".into(),
            ColumnMeta::new("meta", ColumnType::Json).nullable(),
        );
        t.columns.insert(
            "status".into(),
            ColumnMeta::new("status", ColumnType::Enum("author_status".into())),
        );
        t.primary_key = vec!["id".into()];
        t
    }

    fn compile(v: Value) -> Result<(String, usize)> {
        let t = authors_table();
        let mut buf = ParamBuffer::new();
        let sql = compile_where(&t, &v, &mut buf)?;
        Ok((sql, buf.len()))
    }

    #[test]
    fn test_direct_equality_binds_parameter() {
        let (sql, n) = compile(json!({"name": "Jane"})).unwrap();
        assert_eq!(sql, "\"name\" = $1");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_injection_probe_stays_bound() {
        let probe = "Robert'); DROP TABLE authors;--";
        let t = authors_table();
        let mut buf = ParamBuffer::new();
        let sql = compile_where(&t, &json!({ "name": probe }), &mut buf).unwrap();
        assert_eq!(sql, "\"name\" = $1");
        assert!(!sql.contains("DROP"));
        let params = buf.into_params();
        assert!(matches!(&params[0], BindValue::Text(s) if s == probe));
    }

    #[test]
    fn test_null_equality_rewrites_to_is_null() {
        let (sql, n) = compile(json!({"age": null})).unwrap();
        assert_eq!(sql, "\"age\" IS NULL");
        assert_eq!(n, 0);

        let (sql, _) = compile(json!({"age": {"$ne": null}})).unwrap();
        assert_eq!(sql, "\"age\" IS NOT NULL");
    }

    #[test]
    fn test_is_operators_match_null_equality() {
        let (a, _) = compile(json!({"age": {"$is": null}})).unwrap();
        let (b, _) = compile(json!({"age": null})).unwrap();
        assert_eq!(a, b);

        let (c, _) = compile(json!({"age": {"$isNot": null}})).unwrap();
        assert_eq!(c, "\"age\" IS NOT NULL");
    }

    #[test]
    fn test_is_rejects_non_null() {
        assert!(compile(json!({"age": {"$is": 5}})).is_err());
    }

    #[test]
    fn test_comparison_on_boolean_rejected() {
        assert!(compile(json!({"active": {"$gt": true}})).is_err());
        assert!(compile(json!({"meta": {"$lt": 3}})).is_err());
        assert!(compile(json!({"age": {"$gte": 21}})).is_ok());
    }

    #[test]
    fn test_like_requires_text() {
        assert!(compile(json!({"age": {"$like": "%1%"}})).is_err());
        // enums are not text for pattern matching
        assert!(compile(json!({"status": {"$ilike": "%a%"}})).is_err());
        let (sql, _) = compile(json!({"name": {"$ilike": "%a%"}})).unwrap();
        assert_eq!(sql, "\"name\" ILIKE $1");
    }

    #[test]
    fn test_in_becomes_any_with_single_array_param() {
        let (sql, n) = compile(json!({"name": {"$in": ["a", "b", "c"]}})).unwrap();
        assert_eq!(sql, "\"name\" = ANY($1::text[])");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_empty_in_and_nin_are_constants() {
        let (sql, n) = compile(json!({"name": {"$in": []}})).unwrap();
        assert_eq!(sql, "FALSE");
        assert_eq!(n, 0);

        let (sql, _) = compile(json!({"name": {"$nin": []}})).unwrap();
        assert_eq!(sql, "TRUE");
    }

    #[test]
    fn test_empty_groups() {
        let (sql, _) = compile(json!({"$and": []})).unwrap();
        assert_eq!(sql, "TRUE");
        let (sql, _) = compile(json!({"$or": []})).unwrap();
        assert_eq!(sql, "FALSE");
        // empty root object matches everything
        let (sql, _) = compile(json!({})).unwrap();
        assert_eq!(sql, "TRUE");
    }

    #[test]
    fn test_root_mixes_leaves_and_one_group() {
        let (sql, n) = compile(json!({
            "active": true,
            "$or": [{"name": {"$ilike": "%a%"}}, {"name": {"$ilike": "%b%"}}]
        }))
        .unwrap();
        assert_eq!(
            sql,
            "(\"active\" = $1 AND (\"name\" ILIKE $2 OR \"name\" ILIKE $3))"
        );
        assert_eq!(n, 3);
    }

    #[test]
    fn test_two_groups_in_one_object_rejected() {
        assert!(compile(json!({"$and": [], "$or": []})).is_err());
    }

    #[test]
    fn test_group_depth_capped_at_two() {
        // depth 2 is allowed
        let ok = json!({"$and": [{"$or": [{"name": "a"}]}]});
        assert!(compile(ok).is_ok());
        // depth 3 is not
        let too_deep = json!({"$and": [{"$or": [{"$and": [{"name": "a"}]}]}]});
        assert!(compile(too_deep).is_err());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let err = compile(json!({"ghost": 1})).unwrap_err();
        match err {
            ApiError::Validation { issues } => {
                assert!(issues[0].path.contains("ghost"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_operator_rejected() {
        assert!(compile(json!({"name": {"$regex": "x"}})).is_err());
        assert!(compile(json!({"$not": [{"name": "a"}]})).is_err());
    }

    #[test]
    fn test_enum_compares_through_text_cast() {
        let (sql, _) = compile(json!({"status": "active"})).unwrap();
        assert_eq!(sql, "\"status\"::text = $1");

        let (sql, _) = compile(json!({"status": {"$in": ["active", "retired"]}})).unwrap();
        assert_eq!(sql, "\"status\"::text = ANY($1::text[])");
    }

    #[test]
    fn test_multiple_operators_on_one_column_conjoin() {
        let (sql, n) = compile(json!({"age": {"$gte": 18, "$lt": 65}})).unwrap();
        assert_eq!(sql, "(\"age\" >= $1 AND \"age\" < $2)");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_null_inside_in_rejected() {
        assert!(compile(json!({"name": {"$in": ["a", null]}})).is_err());
    }
}
