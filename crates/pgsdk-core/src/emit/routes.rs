//! Per-table HTTP route modules and their aggregator. Each table module
//! mounts static paths over the runtime's table-parameterized handlers, so
//! the route shape is visible in generated code while the behavior stays in
//! the runtime crate.

use crate::emit::ir::{rust_ident, string_literal, FnDef, Item, RustFile};

/// `routes/{table}.rs`
pub fn table_routes_module(table: &str) -> RustFile {
    let lit = string_literal(table);
    let mut file = RustFile::new()
        .header(&[&format!("HTTP routes for `{table}`.")])
        .use_("std::sync::Arc")
        .use_("axum::extract::{Path, State}")
        .use_("axum::http::HeaderMap")
        .use_("axum::response::Response")
        .use_("axum::routing::{get, post}")
        .use_("axum::{Json, Router}")
        .use_("pgsdk_runtime::http::{self, AppState}")
        .use_("serde_json::Value");

    file.push(Item::Fn(FnDef {
        doc: Some(format!(
            "Mount `POST /v1/{table}`, `POST /v1/{table}/list`, and the\nget/patch/delete routes keyed by primary key."
        )),
        signature: "pub fn routes() -> Router<Arc<AppState>>".to_string(),
        body: vec![
            "Router::new()".to_string(),
            format!("    .route(\"/v1/{table}\", post(create))"),
            format!("    .route(\"/v1/{table}/list\", post(list))"),
            format!("    .route("),
            format!("        \"/v1/{table}/*pk\","),
            "        get(get_by_pk).patch(update).delete(remove),".to_string(),
            "    )".to_string(),
        ],
    }));

    file.push(Item::Fn(FnDef {
        doc: None,
        signature: "async fn create(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response".to_string(),
        body: vec![format!("http::create_for(&state, {lit}, &headers, &body).await")],
    }));
    file.push(Item::Fn(FnDef {
        doc: None,
        signature: "async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Option<Json<Value>>) -> Response".to_string(),
        body: vec![format!(
            "http::list_for(&state, {lit}, &headers, body.map(|Json(v)| v)).await"
        )],
    }));
    file.push(Item::Fn(FnDef {
        doc: None,
        signature: "async fn get_by_pk(State(state): State<Arc<AppState>>, Path(pk): Path<String>, headers: HeaderMap) -> Response".to_string(),
        body: vec![format!("http::get_for(&state, {lit}, &pk, &headers).await")],
    }));
    file.push(Item::Fn(FnDef {
        doc: None,
        signature: "async fn update(State(state): State<Arc<AppState>>, Path(pk): Path<String>, headers: HeaderMap, Json(body): Json<Value>) -> Response".to_string(),
        body: vec![format!(
            "http::update_for(&state, {lit}, &pk, &headers, &body).await"
        )],
    }));
    file.push(Item::Fn(FnDef {
        doc: None,
        signature: "async fn remove(State(state): State<Arc<AppState>>, Path(pk): Path<String>, headers: HeaderMap) -> Response".to_string(),
        body: vec![format!("http::delete_for(&state, {lit}, &pk, &headers).await")],
    }));

    file
}

/// `routes/mod.rs` — merges every table router plus the contract and SDK
/// pull endpoints.
pub fn routes_mod(tables: &[String]) -> RustFile {
    let mut file = RustFile::new()
        .header(&["Route aggregator: every table router plus contract and SDK endpoints."])
        .use_("std::sync::Arc")
        .use_("axum::Router")
        .use_("pgsdk_runtime::http::AppState");

    let mut mod_names = Vec::new();
    for table in tables {
        let (ident, _) = rust_ident(table);
        let mod_name = ident.trim_start_matches("r#").to_string();
        file.push(Item::Mod {
            name: mod_name.clone(),
        });
        mod_names.push(mod_name);
    }

    let mut body = vec!["Router::new()".to_string()];
    for name in &mod_names {
        body.push(format!("    .merge({name}::routes())"));
    }
    body.push("    .merge(pgsdk_runtime::http::meta_routes())".to_string());

    file.push(Item::Fn(FnDef {
        doc: Some("The complete API router, ready for `.with_state(...)`.".to_string()),
        signature: "pub fn router() -> Router<Arc<AppState>>".to_string(),
        body,
    }));
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_routes_module() {
        let out = table_routes_module("authors").render();
        assert!(out.contains("pub fn routes() -> Router<Arc<AppState>>"));
        assert!(out.contains(".route(\"/v1/authors\", post(create))"));
        assert!(out.contains(".route(\"/v1/authors/list\", post(list))"));
        assert!(out.contains("\"/v1/authors/*pk\""));
        assert!(out.contains("http::create_for(&state, \"authors\", &headers, &body).await"));
    }

    #[test]
    fn test_routes_mod_merges_everything() {
        let out = routes_mod(&["authors".to_string(), "books".to_string()]).render();
        assert!(out.contains("pub mod authors;"));
        assert!(out.contains("pub mod books;"));
        assert!(out.contains(".merge(authors::routes())"));
        assert!(out.contains(".merge(pgsdk_runtime::http::meta_routes())"));
    }
}
