//! Per-table record types: the select shape, the insert shape (columns
//! with defaults or nullability may be omitted), and the update shape
//! (everything optional, primary-key columns not expressible at all).

use crate::emit::ir::{pascal_case, rust_ident, FieldDef, Item, RustFile, StructDef};
use crate::graph::naming::Inflector;
use crate::graph::relations::RelationGraph;
use crate::schema::types::{DataType, Table};

/// How temporal columns surface in generated types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateType {
    /// chrono types
    Date,
    /// ISO strings
    String,
}

pub fn rust_type(dt: &DataType, date_type: DateType) -> String {
    match dt {
        DataType::Uuid => "uuid::Uuid".to_string(),
        DataType::Char
        | DataType::VarChar
        | DataType::Text
        | DataType::Enum(_)
        | DataType::Unknown(_) => "String".to_string(),
        DataType::SmallInt | DataType::Integer => "i32".to_string(),
        DataType::BigInt => "i64".to_string(),
        DataType::Float => "f32".to_string(),
        DataType::Double | DataType::Numeric => "f64".to_string(),
        DataType::Boolean => "bool".to_string(),
        DataType::Date => match date_type {
            DateType::Date => "chrono::NaiveDate".to_string(),
            DateType::String => "String".to_string(),
        },
        DataType::Timestamp => match date_type {
            DateType::Date => "chrono::NaiveDateTime".to_string(),
            DateType::String => "String".to_string(),
        },
        DataType::TimestampTz => match date_type {
            DateType::Date => "chrono::DateTime<chrono::Utc>".to_string(),
            DateType::String => "String".to_string(),
        },
        DataType::Json | DataType::Jsonb => "serde_json::Value".to_string(),
        // bytea rides as base64
        DataType::Bytea => "String".to_string(),
        DataType::Array(inner) => format!("Vec<{}>", rust_type(inner, date_type)),
        DataType::Vector(_) => "Vec<f64>".to_string(),
    }
}

/// `authors` → `Author` (record type base name).
pub fn type_name(table: &str, inflector: &dyn Inflector) -> String {
    pascal_case(&inflector.singularize(table))
}

/// Emit the types module for one table. With `with_include`, also emits the
/// typed include struct wired to the relation graph (client side).
pub fn types_module(
    table: &Table,
    graph: &RelationGraph,
    inflector: &dyn Inflector,
    date_type: DateType,
    with_include: bool,
) -> RustFile {
    let base = type_name(&table.name, inflector);
    let mut file = RustFile::new()
        .header(&[&format!("Record types for `{}`.", table.name)])
        .use_("serde::{Deserialize, Serialize}");
    if with_include {
        file.uses.push("super::support::IncludeRel".to_string());
    }

    // Select shape: every column, nullable columns optional.
    let mut select = StructDef {
        doc: Some(format!("One `{}` row.", table.name)),
        derives: vec![
            "Debug".into(),
            "Clone".into(),
            "Serialize".into(),
            "Deserialize".into(),
        ],
        attrs: vec![],
        name: base.clone(),
        fields: vec![],
    };
    for (col_name, col) in &table.columns {
        let (ident, renamed) = rust_ident(col_name);
        let mut attrs = Vec::new();
        if renamed {
            attrs.push(format!("serde(rename = \"{col_name}\")"));
        }
        let ty = rust_type(&col.data_type, date_type);
        let ty = if col.nullable { format!("Option<{ty}>") } else { ty };
        select.fields.push(FieldDef {
            attrs,
            name: ident,
            ty,
        });
    }
    file.push(Item::Struct(select));

    // Insert shape: defaulted or nullable columns may be omitted.
    let mut insert = StructDef {
        doc: Some(format!(
            "Insert shape for `{}`; omitted fields fall back to column defaults.",
            table.name
        )),
        derives: vec![
            "Debug".into(),
            "Clone".into(),
            "Default".into(),
            "Serialize".into(),
            "Deserialize".into(),
        ],
        attrs: vec![],
        name: format!("{base}Insert"),
        fields: vec![],
    };
    for (col_name, col) in &table.columns {
        let (ident, renamed) = rust_ident(col_name);
        let mut attrs = Vec::new();
        if renamed {
            attrs.push(format!("serde(rename = \"{col_name}\")"));
        }
        let ty = rust_type(&col.data_type, date_type);
        let optional = col.nullable || col.has_default;
        let ty = if optional {
            attrs.push("serde(default, skip_serializing_if = \"Option::is_none\")".to_string());
            format!("Option<{ty}>")
        } else {
            ty
        };
        insert.fields.push(FieldDef {
            attrs,
            name: ident,
            ty,
        });
    }
    // Default derive needs every field defaultable; required fields break
    // that, so drop it when any remain.
    if insert.fields.iter().any(|f| !f.ty.starts_with("Option<")) {
        insert.derives.retain(|d| d != "Default");
    }
    file.push(Item::Struct(insert));

    // Update shape: everything optional, primary-key columns absent.
    let mut update = StructDef {
        doc: Some(format!("Patch shape for `{}`.", table.name)),
        derives: vec![
            "Debug".into(),
            "Clone".into(),
            "Default".into(),
            "Serialize".into(),
            "Deserialize".into(),
        ],
        attrs: vec![],
        name: format!("{base}Update"),
        fields: vec![],
    };
    for (col_name, col) in &table.columns {
        if table.primary_key.iter().any(|pk| pk == col_name) {
            continue;
        }
        let (ident, renamed) = rust_ident(col_name);
        let mut attrs = Vec::new();
        if renamed {
            attrs.push(format!("serde(rename = \"{col_name}\")"));
        }
        attrs.push("serde(default, skip_serializing_if = \"Option::is_none\")".to_string());
        update.fields.push(FieldDef {
            attrs,
            name: ident,
            ty: format!("Option<{}>", rust_type(&col.data_type, date_type)),
        });
    }
    file.push(Item::Struct(update));

    if with_include {
        let mut include = StructDef {
            doc: Some(format!(
                "Typed include spec for `{}`; each field mirrors a relation key.",
                table.name
            )),
            derives: vec![
                "Debug".into(),
                "Clone".into(),
                "Default".into(),
                "Serialize".into(),
            ],
            attrs: vec![],
            name: format!("{base}Include"),
            fields: vec![],
        };
        if let Some(edges) = graph.edges(&table.name) {
            for (key, edge) in edges {
                let (ident, renamed) = rust_ident(key);
                let mut attrs = Vec::new();
                if renamed {
                    attrs.push(format!("serde(rename = \"{key}\")"));
                }
                attrs.push("serde(skip_serializing_if = \"Option::is_none\")".to_string());
                let target = type_name(&edge.target, inflector);
                include.fields.push(FieldDef {
                    attrs,
                    name: ident,
                    ty: format!("Option<IncludeRel<{target}Include>>"),
                });
            }
        }
        file.push(Item::Struct(include));
    }

    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::naming::TrailingS;
    use crate::schema::types::Column;

    fn books_table() -> Table {
        let mut t = Table::new("books".to_string());
        let mut id = Column::new("id".to_string(), DataType::Uuid, "uuid".to_string());
        id.nullable = false;
        id.has_default = true;
        t.columns.insert("id".into(), id);
        let mut title = Column::new("title".to_string(), DataType::Text, "text".to_string());
        title.nullable = false;
        t.columns.insert("title".into(), title);
        let mut subtitle = Column::new("subtitle".to_string(), DataType::Text, "text".to_string());
        subtitle.nullable = true;
        t.columns.insert("subtitle".into(), subtitle);
        t.primary_key = vec!["id".into()];
        t
    }

    #[test]
    fn test_select_insert_update_shapes() {
        let table = books_table();
        let file = types_module(
            &table,
            &RelationGraph::default(),
            &TrailingS,
            DateType::String,
            false,
        );
        let out = file.render();

        assert!(out.contains("pub struct Book {"));
        assert!(out.contains("pub struct BookInsert {"));
        assert!(out.contains("pub struct BookUpdate {"));
        // select: nullable → Option
        assert!(out.contains("pub subtitle: Option<String>,"));
        // insert: defaulted id is optional, required title is not
        assert!(out.contains("pub title: String,"));
        // update: no id field
        let update_part = out.split("pub struct BookUpdate").nth(1).unwrap();
        assert!(!update_part.contains("pub id"));
        assert!(update_part.contains("pub title: Option<String>,"));
    }

    #[test]
    fn test_insert_keeps_default_derive_only_when_fully_optional() {
        let mut table = books_table();
        // all columns defaulted → Default derive stays
        for col in table.columns.values_mut() {
            col.has_default = true;
        }
        let out = types_module(
            &table,
            &RelationGraph::default(),
            &TrailingS,
            DateType::String,
            false,
        )
        .render();
        let insert_part = out.split("pub struct BookInsert").next().unwrap();
        assert!(insert_part.contains("Default"));
    }

    #[test]
    fn test_date_type_switch() {
        assert_eq!(rust_type(&DataType::TimestampTz, DateType::String), "String");
        assert_eq!(
            rust_type(&DataType::TimestampTz, DateType::Date),
            "chrono::DateTime<chrono::Utc>"
        );
        assert_eq!(rust_type(&DataType::Vector(3), DateType::String), "Vec<f64>");
    }
}
