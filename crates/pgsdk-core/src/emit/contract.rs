//! # Contract assembler
//!
//! Builds the machine-readable contract (versions, per-resource method
//! signatures, endpoint catalog, relationship summary) and its markdown
//! rendering, both consistent with the emitted code. The `generated`
//! timestamp is the single non-hermetic field and is injected by the
//! driver so tests can pin it.

use serde_json::{json, Value};

use crate::emit::ir::{string_literal, FnDef, Item, RustFile};
use crate::emit::types::type_name;
use crate::graph::naming::Inflector;
use crate::graph::paths::enumerate_paths;
use crate::graph::relations::RelationGraph;
use crate::schema::types::Model;

pub fn build_contract(
    model: &Model,
    graph: &RelationGraph,
    inflector: &dyn Inflector,
    version: &str,
    generated_at: &str,
    include_depth: usize,
) -> Value {
    let mut resources = Vec::new();
    let mut endpoints = Vec::new();
    let mut relationships = Vec::new();

    for (table_name, table) in &model.tables {
        if table.is_junction {
            continue;
        }
        let base = type_name(table_name, inflector);

        let columns: Vec<Value> = table
            .columns
            .values()
            .map(|c| {
                json!({
                    "name": c.name,
                    "type": c.data_type.to_string(),
                    "nullable": c.nullable,
                    "hasDefault": c.has_default,
                })
            })
            .collect();

        let mut methods = vec![
            json!({"name": "create", "signature": format!("create(input: {base}Insert) -> {base}")}),
            json!({"name": "get", "signature": format!("get(pk...) -> Option<{base}>")}),
            json!({"name": "list", "signature": format!("list(options: ListOptions<{base}Include>) -> Page<{base}>")}),
            json!({"name": "update", "signature": format!("update(pk..., patch: {base}Update) -> Option<{base}>")}),
            json!({"name": "delete", "signature": format!("delete(pk...) -> Option<{base}>")}),
        ];
        for path in enumerate_paths(graph, table_name, include_depth) {
            let suffix = path.key_path().replace('.', "_");
            methods.push(json!({
                "name": format!("list_with_{suffix}"),
                "signature": format!("list_with_{suffix}(options: ListOptions<{base}Include>) -> Page<{base}>"),
                "includes": path.key_path(),
            }));
            methods.push(json!({
                "name": format!("get_with_{suffix}"),
                "signature": format!("get_with_{suffix}(pk...) -> Option<{base}>"),
                "includes": path.key_path(),
            }));
        }

        resources.push(json!({
            "table": table_name,
            "type": base,
            "primaryKey": table.primary_key,
            "columns": columns,
            "methods": methods,
        }));

        endpoints.push(json!({"method": "POST", "path": format!("/v1/{table_name}"), "description": format!("Create one {base}")}));
        endpoints.push(json!({"method": "GET", "path": format!("/v1/{table_name}/{{pk}}"), "description": format!("Fetch one {base} by primary key")}));
        endpoints.push(json!({"method": "POST", "path": format!("/v1/{table_name}/list"), "description": "List with filter, ordering, pagination, includes, vector search"}));
        endpoints.push(json!({"method": "PATCH", "path": format!("/v1/{table_name}/{{pk}}"), "description": format!("Update one {base}")}));
        endpoints.push(json!({"method": "DELETE", "path": format!("/v1/{table_name}/{{pk}}"), "description": format!("Delete one {base}")}));

        if let Some(edges) = graph.edges(table_name) {
            for (key, edge) in edges {
                let mut rel = json!({
                    "source": edge.source,
                    "key": key,
                    "target": edge.target,
                    "kind": match edge.kind {
                        pgsdk_runtime::meta::RelationKind::One => "one",
                        pgsdk_runtime::meta::RelationKind::Many => "many",
                    },
                });
                if let Some(jm) = &edge.junction {
                    rel["junction"] = json!(jm.table);
                }
                relationships.push(rel);
            }
        }
    }

    endpoints.push(json!({"method": "GET", "path": "/api/contract", "description": "This document"}));
    endpoints.push(json!({"method": "GET", "path": "/api/contract.json", "description": "This document"}));
    endpoints.push(json!({"method": "GET", "path": "/api/contract.md", "description": "Markdown rendering"}));
    endpoints.push(json!({"method": "GET", "path": "/_psdk/sdk/manifest", "description": "SDK file listing"}));
    endpoints.push(json!({"method": "GET", "path": "/_psdk/sdk/download", "description": "SDK file contents"}));

    json!({
        "name": "pgsdk",
        "version": version,
        "generated": generated_at,
        "schema": model.schema_name,
        "schemaFingerprint": model.fingerprint(),
        "resources": resources,
        "endpoints": endpoints,
        "relationships": relationships,
    })
}

/// Human-readable rendering of the same contract.
pub fn render_contract_md(contract: &Value) -> String {
    let mut out = String::new();
    out.push_str("# API Contract\n\n");
    out.push_str(&format!(
        "- version: `{}`\n- generated: `{}`\n- schema: `{}`\n- fingerprint: `{}`\n\n",
        contract["version"].as_str().unwrap_or_default(),
        contract["generated"].as_str().unwrap_or_default(),
        contract["schema"].as_str().unwrap_or_default(),
        contract["schemaFingerprint"].as_str().unwrap_or_default(),
    ));

    out.push_str("## Resources\n\n");
    for resource in contract["resources"].as_array().into_iter().flatten() {
        out.push_str(&format!(
            "### `{}` ({})\n\n",
            resource["table"].as_str().unwrap_or_default(),
            resource["type"].as_str().unwrap_or_default(),
        ));
        out.push_str("| column | type | nullable | default |\n|---|---|---|---|\n");
        for col in resource["columns"].as_array().into_iter().flatten() {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                col["name"].as_str().unwrap_or_default(),
                col["type"].as_str().unwrap_or_default(),
                col["nullable"],
                col["hasDefault"],
            ));
        }
        out.push_str("\nMethods:\n\n");
        for method in resource["methods"].as_array().into_iter().flatten() {
            out.push_str(&format!(
                "- `{}`\n",
                method["signature"].as_str().unwrap_or_default()
            ));
        }
        out.push('\n');
    }

    out.push_str("## Endpoints\n\n| method | path | description |\n|---|---|---|\n");
    for ep in contract["endpoints"].as_array().into_iter().flatten() {
        out.push_str(&format!(
            "| {} | `{}` | {} |\n",
            ep["method"].as_str().unwrap_or_default(),
            ep["path"].as_str().unwrap_or_default(),
            ep["description"].as_str().unwrap_or_default(),
        ));
    }

    out.push_str("\n## Relationships\n\n| source | key | kind | target | via |\n|---|---|---|---|---|\n");
    for rel in contract["relationships"].as_array().into_iter().flatten() {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            rel["source"].as_str().unwrap_or_default(),
            rel["key"].as_str().unwrap_or_default(),
            rel["kind"].as_str().unwrap_or_default(),
            rel["target"].as_str().unwrap_or_default(),
            rel["junction"].as_str().unwrap_or("—"),
        ));
    }

    out
}

/// `contract.rs` — the contract embedded into the server for the
/// `/api/contract*` endpoints.
pub fn contract_module(contract_json: &str, contract_md: &str) -> RustFile {
    let mut file = RustFile::new().header(&["Embedded API contract."]);
    file.push(Item::Const {
        name: "CONTRACT_JSON".to_string(),
        ty: "&str".to_string(),
        value: string_literal(contract_json),
    });
    file.push(Item::Const {
        name: "CONTRACT_MD".to_string(),
        ty: "&str".to_string(),
        value: string_literal(contract_md),
    });
    file.push(Item::Fn(FnDef {
        doc: Some("The contract as a JSON value.".to_string()),
        signature: "pub fn contract() -> serde_json::Value".to_string(),
        body: vec![
            "serde_json::from_str(CONTRACT_JSON).unwrap_or(serde_json::Value::Null)".to_string(),
        ],
    }));
    file
}
