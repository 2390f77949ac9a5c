//! # Runtime record validation
//!
//! The runtime mirror of the generated per-table validation schemas. An
//! insert accepts a column only when it exists, type-checks against the
//! column, and is present whenever the column is required (not nullable, no
//! default). An update is the insert with every field optional — and
//! primary-key columns rejected outright.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ApiError, Issue, Result};
use crate::meta::TableMeta;
use crate::value::{bind_value_from_json, BindValue};

/// Validate an insert body, returning column → bind value in column order.
pub fn validate_insert(table: &TableMeta, body: &Value) -> Result<IndexMap<String, BindValue>> {
    let Some(obj) = body.as_object() else {
        return Err(ApiError::invalid("body", "expected a JSON object"));
    };

    let mut issues = Vec::new();
    let mut out = IndexMap::new();

    for key in obj.keys() {
        if !table.columns.contains_key(key) {
            issues.push(Issue::new(key, format!("unknown column on '{}'", table.name)));
        }
    }

    for (name, col) in &table.columns {
        match obj.get(name) {
            Some(value) => {
                if value.is_null() && !col.nullable {
                    issues.push(Issue::new(name, "must not be null"));
                    continue;
                }
                match bind_value_from_json(&col.ty, value, name) {
                    Ok(bind) => {
                        out.insert(name.clone(), bind);
                    }
                    Err(issue) => issues.push(issue),
                }
            }
            None => {
                if !col.nullable && !col.has_default {
                    issues.push(Issue::new(name, "required"));
                }
            }
        }
    }

    match ApiError::from_issues(issues) {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Validate an update body. `{}` is valid (and later 400s at the handler as
/// "no updatable fields"); primary-key columns are rejected.
pub fn validate_update(table: &TableMeta, body: &Value) -> Result<IndexMap<String, BindValue>> {
    let Some(obj) = body.as_object() else {
        return Err(ApiError::invalid("body", "expected a JSON object"));
    };

    let mut issues = Vec::new();
    let mut out = IndexMap::new();

    for (key, value) in obj {
        let Some(col) = table.columns.get(key) else {
            issues.push(Issue::new(key, format!("unknown column on '{}'", table.name)));
            continue;
        };
        if table.primary_key.iter().any(|pk| pk == key) {
            issues.push(Issue::new(key, "primary-key column cannot be updated"));
            continue;
        }
        if value.is_null() && !col.nullable {
            issues.push(Issue::new(key, "must not be null"));
            continue;
        }
        match bind_value_from_json(&col.ty, value, key) {
            Ok(bind) => {
                out.insert(key.clone(), bind);
            }
            Err(issue) => issues.push(issue),
        }
    }

    match ApiError::from_issues(issues) {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ColumnMeta, ColumnType};
    use serde_json::json;

    fn books_table() -> TableMeta {
        let mut t = TableMeta::new("books");
        t.columns.insert(
            "id".into(),
            ColumnMeta::new("id", ColumnType::Uuid).with_default(),
        );
        t.columns
            .insert("title".into(), ColumnMeta::new("title", ColumnType::Text));
        t.columns.insert(
            "author_id".into(),
            ColumnMeta::new("author_id", ColumnType::Uuid),
        );
        t.columns.insert(
            "subtitle".into(),
            ColumnMeta::new("subtitle", ColumnType::Text).nullable(),
        );
        t.primary_key = vec!["id".into()];
        t
    }

    #[test]
    fn test_minimal_insert_accepted() {
        let t = books_table();
        let body = json!({
            "title": "P&P",
            "author_id": "5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f"
        });
        let cols = validate_insert(&t, &body).unwrap();
        assert_eq!(cols.len(), 2);
        assert!(cols.contains_key("title"));
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let t = books_table();
        let err = validate_insert(&t, &json!({"title": "P&P"})).unwrap_err();
        match err {
            ApiError::Validation { issues } => {
                assert!(issues.iter().any(|i| i.path == "author_id" && i.message == "required"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaulted_and_nullable_fields_may_be_omitted() {
        let t = books_table();
        // id has a default, subtitle is nullable — both omitted
        let body = json!({
            "title": "P&P",
            "author_id": "5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f"
        });
        assert!(validate_insert(&t, &body).is_ok());
    }

    #[test]
    fn test_unknown_insert_column_rejected() {
        let t = books_table();
        assert!(validate_insert(&t, &json!({"title": "x", "author_id": "5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f", "ghost": 1})).is_err());
    }

    #[test]
    fn test_explicit_null_on_non_nullable_rejected() {
        let t = books_table();
        let body = json!({"title": null, "author_id": "5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f"});
        assert!(validate_insert(&t, &body).is_err());
    }

    #[test]
    fn test_update_accepts_empty_object() {
        let t = books_table();
        let cols = validate_update(&t, &json!({})).unwrap();
        assert!(cols.is_empty());
    }

    #[test]
    fn test_update_rejects_primary_key() {
        let t = books_table();
        let err = validate_update(
            &t,
            &json!({"id": "5f8b1c1e-50c4-4d3c-b3c5-09a9f2d41d6f"}),
        )
        .unwrap_err();
        match err {
            ApiError::Validation { issues } => {
                assert!(issues[0].message.contains("primary-key"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_update_nullable_field_set_to_null() {
        let t = books_table();
        let cols = validate_update(&t, &json!({"subtitle": null})).unwrap();
        assert!(matches!(cols["subtitle"], BindValue::Null(_)));
    }

    #[test]
    fn test_update_type_mismatch_rejected() {
        let t = books_table();
        assert!(validate_update(&t, &json!({"title": 42})).is_err());
    }
}
