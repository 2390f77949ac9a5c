//! Emits `registry.rs`: the relation-graph-plus-schema data literal the
//! generated server constructs its `ApiRegistry` from.

use pgsdk_runtime::meta::{ApiRegistry, ColumnType, JunctionMeta, RelationMeta, TableMeta};

use crate::emit::ir::{string_literal, FnDef, Item, RustFile};

pub fn registry_module(registry: &ApiRegistry) -> RustFile {
    let mut file = RustFile::new()
        .header(&["Frozen table and relation metadata for this schema."])
        .use_("pgsdk_runtime::meta::{ApiRegistry, ColumnMeta, ColumnType, FkOwner, JunctionMeta, RelationKind, RelationMeta, TableMeta}");

    let mut body = Vec::new();
    body.push(format!(
        "let mut registry = ApiRegistry::new({});",
        string_literal(&registry.schema)
    ));
    for (name, table) in &registry.tables {
        body.push("{".to_string());
        push_table(&mut body, table);
        body.push(format!(
            "    registry.tables.insert({}.to_string(), t);",
            string_literal(name)
        ));
        body.push("}".to_string());
    }
    for (name, table) in &registry.junction_tables {
        body.push("{".to_string());
        push_table(&mut body, table);
        body.push(format!(
            "    registry.junction_tables.insert({}.to_string(), t);",
            string_literal(name)
        ));
        body.push("}".to_string());
    }
    body.push("registry".to_string());

    file.push(Item::Fn(FnDef {
        doc: Some("Build the registry this server was generated against.".to_string()),
        signature: "pub fn registry() -> ApiRegistry".to_string(),
        body,
    }));
    file
}

fn push_table(body: &mut Vec<String>, table: &TableMeta) {
    body.push(format!(
        "    let mut t = TableMeta::new({});",
        string_literal(&table.name)
    ));
    for (col_name, col) in &table.columns {
        body.push(format!(
            "    t.columns.insert({key}.to_string(), ColumnMeta {{ name: {key}.to_string(), ty: {ty}, nullable: {nullable}, has_default: {has_default} }});",
            key = string_literal(col_name),
            ty = column_type_expr(&col.ty),
            nullable = col.nullable,
            has_default = col.has_default,
        ));
    }
    body.push(format!(
        "    t.primary_key = {};",
        string_vec_expr(&table.primary_key)
    ));
    if let Some(sd) = &table.soft_delete_column {
        body.push(format!(
            "    t.soft_delete_column = Some({}.to_string());",
            string_literal(sd)
        ));
    }
    for (key, rel) in &table.relations {
        body.push(format!(
            "    t.relations.insert({}.to_string(), {});",
            string_literal(key),
            relation_expr(rel)
        ));
    }
}

fn column_type_expr(ty: &ColumnType) -> String {
    match ty {
        ColumnType::Uuid => "ColumnType::Uuid".to_string(),
        ColumnType::Text => "ColumnType::Text".to_string(),
        ColumnType::Integer => "ColumnType::Integer".to_string(),
        ColumnType::BigInt => "ColumnType::BigInt".to_string(),
        ColumnType::Float => "ColumnType::Float".to_string(),
        ColumnType::Double => "ColumnType::Double".to_string(),
        ColumnType::Numeric => "ColumnType::Numeric".to_string(),
        ColumnType::Boolean => "ColumnType::Boolean".to_string(),
        ColumnType::Timestamp => "ColumnType::Timestamp".to_string(),
        ColumnType::TimestampTz => "ColumnType::TimestampTz".to_string(),
        ColumnType::Date => "ColumnType::Date".to_string(),
        ColumnType::Json => "ColumnType::Json".to_string(),
        ColumnType::Bytea => "ColumnType::Bytea".to_string(),
        ColumnType::Enum(name) => {
            format!("ColumnType::Enum({}.to_string())", string_literal(name))
        }
        ColumnType::Array(inner) => {
            format!("ColumnType::Array(Box::new({}))", column_type_expr(inner))
        }
        ColumnType::Vector(dim) => format!("ColumnType::Vector({dim})"),
    }
}

fn string_vec_expr(items: &[String]) -> String {
    if items.is_empty() {
        return "Vec::new()".to_string();
    }
    let parts: Vec<String> = items
        .iter()
        .map(|s| format!("{}.to_string()", string_literal(s)))
        .collect();
    format!("vec![{}]", parts.join(", "))
}

fn relation_expr(rel: &RelationMeta) -> String {
    let kind = match rel.kind {
        pgsdk_runtime::meta::RelationKind::One => "RelationKind::One",
        pgsdk_runtime::meta::RelationKind::Many => "RelationKind::Many",
    };
    let owner = match rel.fk_owner {
        pgsdk_runtime::meta::FkOwner::Source => "FkOwner::Source",
        pgsdk_runtime::meta::FkOwner::Target => "FkOwner::Target",
    };
    let junction = match &rel.junction {
        Some(jm) => format!("Some({})", junction_expr(jm)),
        None => "None".to_string(),
    };
    format!(
        "RelationMeta {{ target: {}.to_string(), kind: {kind}, fk_owner: {owner}, fk_columns: {}, ref_columns: {}, junction: {junction} }}",
        string_literal(&rel.target),
        string_vec_expr(&rel.fk_columns),
        string_vec_expr(&rel.ref_columns),
    )
}

fn junction_expr(jm: &JunctionMeta) -> String {
    format!(
        "JunctionMeta {{ table: {}.to_string(), source_fk_columns: {}, source_ref_columns: {}, target_fk_columns: {}, target_ref_columns: {} }}",
        string_literal(&jm.table),
        string_vec_expr(&jm.source_fk_columns),
        string_vec_expr(&jm.source_ref_columns),
        string_vec_expr(&jm.target_fk_columns),
        string_vec_expr(&jm.target_ref_columns),
    )
}
