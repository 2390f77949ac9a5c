//! Per-table validation-schema modules: thin bindings from generated code
//! onto the runtime validators, resolved against the embedded registry.

use crate::emit::ir::{rust_ident, string_literal, FnDef, Item, RustFile};

/// `schemas/{table}.rs`
pub fn table_schemas_module(table: &str) -> RustFile {
    let lit = string_literal(table);
    let mut file = RustFile::new()
        .header(&[&format!("Validation schemas for `{table}`.")])
        .use_("pgsdk_runtime::error::Result")
        .use_("pgsdk_runtime::meta::TableMeta")
        .use_("pgsdk_runtime::schema")
        .use_("serde_json::Value");

    file.push(Item::Fn(FnDef {
        doc: Some(format!("Metadata for `{table}` from the embedded registry.")),
        signature: "pub fn table() -> TableMeta".to_string(),
        body: vec![format!(
            "super::super::registry::registry().tables[{lit}].clone()"
        )],
    }));
    file.push(Item::Fn(FnDef {
        doc: Some(
            "Check a create body: required columns present, types matching,\nno unknown keys."
                .to_string(),
        ),
        signature: "pub fn validate_insert(body: &Value) -> Result<()>".to_string(),
        body: vec!["schema::validate_insert(&table(), body).map(|_| ())".to_string()],
    }));
    file.push(Item::Fn(FnDef {
        doc: Some(
            "Check a patch body: everything optional, primary-key columns rejected.".to_string(),
        ),
        signature: "pub fn validate_update(body: &Value) -> Result<()>".to_string(),
        body: vec!["schema::validate_update(&table(), body).map(|_| ())".to_string()],
    }));
    file
}

/// `schemas/mod.rs`
pub fn schemas_mod(tables: &[String]) -> RustFile {
    let mut file =
        RustFile::new().header(&["Runtime validation schemas, one module per table."]);
    for table in tables {
        let (ident, _) = rust_ident(table);
        file.push(Item::Mod {
            name: ident.trim_start_matches("r#").to_string(),
        });
    }
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_schemas_module() {
        let out = table_schemas_module("authors").render();
        assert!(out.contains("pub fn validate_insert(body: &Value) -> Result<()>"));
        assert!(out.contains("registry::registry().tables[\"authors\"].clone()"));
    }

    #[test]
    fn test_schemas_mod_lists_tables() {
        let out = schemas_mod(&["authors".to_string(), "books".to_string()]).render();
        assert!(out.contains("pub mod authors;"));
        assert!(out.contains("pub mod books;"));
    }
}
