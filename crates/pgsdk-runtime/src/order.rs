//! Ordering clause validation. `orderBy` is a column name or array of
//! names; `order` is `"asc"`/`"desc"` or an array aligned positionally
//! (a scalar applies to every column).

use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::meta::TableMeta;
use crate::value::quote_ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(s: &str, path: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ApiError::invalid(path, "expected \"asc\" or \"desc\"")),
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated ordering: column/direction pairs over an allow-listed table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderSpec {
    pub columns: Vec<(String, SortOrder)>,
}

impl OrderSpec {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Render `"a" ASC, "b" DESC`, optionally qualified with a table alias.
    pub fn to_sql(&self, prefix: Option<&str>) -> String {
        self.columns
            .iter()
            .map(|(col, dir)| match prefix {
                Some(p) => format!("{p}.{} {}", quote_ident(col), dir.sql()),
                None => format!("{} {}", quote_ident(col), dir.sql()),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse and validate `orderBy`/`order` against a table.
pub fn parse_order(
    table: &TableMeta,
    order_by: Option<&Value>,
    order: Option<&Value>,
    path: &str,
) -> Result<OrderSpec> {
    let Some(order_by) = order_by else {
        if order.is_some() {
            return Err(ApiError::invalid(sub(path, "order"), "order without orderBy"));
        }
        return Ok(OrderSpec::default());
    };

    let columns: Vec<String> = match order_by {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ApiError::invalid(sub(path, "orderBy"), "expected column name strings")
                })
            })
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(ApiError::invalid(
                sub(path, "orderBy"),
                "expected a column name or array of column names",
            ))
        }
    };

    let directions: Vec<SortOrder> = match order {
        None => vec![SortOrder::Asc; columns.len()],
        Some(Value::String(s)) => {
            let dir = SortOrder::parse(s, &sub(path, "order"))?;
            vec![dir; columns.len()]
        }
        Some(Value::Array(items)) => {
            if items.len() != columns.len() {
                return Err(ApiError::invalid(
                    sub(path, "order"),
                    "order array must align with orderBy",
                ));
            }
            items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let p = format!("{}[{i}]", sub(path, "order"));
                    v.as_str()
                        .ok_or_else(|| ApiError::invalid(&p, "expected \"asc\" or \"desc\""))
                        .and_then(|s| SortOrder::parse(s, &p))
                })
                .collect::<Result<Vec<_>>>()?
        }
        Some(_) => {
            return Err(ApiError::invalid(
                sub(path, "order"),
                "expected \"asc\", \"desc\", or an array of them",
            ))
        }
    };

    let mut spec = OrderSpec::default();
    for (col, dir) in columns.into_iter().zip(directions) {
        let Some(meta) = table.column(&col) else {
            return Err(ApiError::invalid(
                sub(path, "orderBy"),
                format!("unknown column '{col}' on '{}'", table.name),
            ));
        };
        if !meta.ty.is_orderable() {
            return Err(ApiError::invalid(
                sub(path, "orderBy"),
                format!("column '{col}' cannot be used for ordering"),
            ));
        }
        spec.columns.push((col, dir));
    }
    Ok(spec)
}

fn sub(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

/// Deterministic fallback order: the table's primary-key tuple ascending.
pub fn primary_key_order(table: &TableMeta) -> OrderSpec {
    OrderSpec {
        columns: table
            .primary_key
            .iter()
            .map(|c| (c.clone(), SortOrder::Asc))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ColumnMeta, ColumnType};
    use serde_json::json;

    fn books_table() -> TableMeta {
        let mut t = TableMeta::new("books");
        t.columns
            .insert("id".into(), ColumnMeta::new("id", ColumnType::Uuid));
        t.columns
            .insert("title".into(), ColumnMeta::new("title", ColumnType::Text));
        t.columns.insert(
            "payload".into(),
            ColumnMeta::new("payload", ColumnType::Json).nullable(),
        );
        t.primary_key = vec!["id".into()];
        t
    }

    #[test]
    fn test_scalar_order_applies_to_all_columns() {
        let t = books_table();
        let spec = parse_order(
            &t,
            Some(&json!(["title", "id"])),
            Some(&json!("desc")),
            "q",
        )
        .unwrap();
        assert_eq!(spec.to_sql(None), "\"title\" DESC, \"id\" DESC");
    }

    #[test]
    fn test_aligned_order_array() {
        let t = books_table();
        let spec = parse_order(
            &t,
            Some(&json!(["title", "id"])),
            Some(&json!(["asc", "desc"])),
            "q",
        )
        .unwrap();
        assert_eq!(spec.to_sql(Some("t")), "t.\"title\" ASC, t.\"id\" DESC");
    }

    #[test]
    fn test_misaligned_order_array_rejected() {
        let t = books_table();
        assert!(parse_order(&t, Some(&json!(["title"])), Some(&json!(["asc", "desc"])), "q").is_err());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let t = books_table();
        assert!(parse_order(&t, Some(&json!("ghost")), None, "q").is_err());
    }

    #[test]
    fn test_json_column_not_orderable() {
        let t = books_table();
        assert!(parse_order(&t, Some(&json!("payload")), None, "q").is_err());
    }

    #[test]
    fn test_order_without_order_by_rejected() {
        let t = books_table();
        assert!(parse_order(&t, None, Some(&json!("asc")), "q").is_err());
    }

    #[test]
    fn test_primary_key_fallback() {
        let t = books_table();
        assert_eq!(primary_key_order(&t).to_sql(None), "\"id\" ASC");
    }
}
