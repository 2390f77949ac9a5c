//! Client SDK emitters: the shared support module, one client per table
//! (CRUD plus one `list_with_*`/`get_with_*` method per reachable relation
//! chain), and the `Sdk` aggregator.

use crate::emit::ir::{pascal_case, rust_ident, string_literal, Item, RustFile};
use crate::emit::types::{rust_type, type_name, DateType};
use crate::graph::naming::Inflector;
use crate::graph::paths::RelationPath;
use crate::schema::types::{DataType, Table};

/// `support.rs` — config, errors, wire envelopes, and the request helper
/// every generated client shares. Static content.
pub fn support_module() -> String {
    let mut out = String::new();
    out.push_str("//! Shared client plumbing: configuration, errors, envelopes.\n\n");
    out.push_str(crate::emit::ir::GENERATED_BANNER);
    out.push_str("\n\n");
    out.push_str(SUPPORT_BODY);
    out
}

const SUPPORT_BODY: &str = r#"use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SdkConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
}

impl SdkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            api_key_header: "x-api-key".to_string(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Debug)]
pub enum SdkError {
    Http(reqwest::Error),
    Api { status: u16, body: Value },
    Decode(serde_json::Error),
}

impl std::fmt::Display for SdkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdkError::Http(e) => write!(f, "http error: {e}"),
            SdkError::Api { status, body } => write!(f, "api error {status}: {body}"),
            SdkError::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        SdkError::Http(e)
    }
}

/// One page of a list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    #[serde(rename = "includeError", default)]
    pub include_error: Option<Value>,
}

/// Options for a list call; `I` is the table's typed include spec.
#[derive(Debug, Clone, Serialize)]
pub struct ListOptions<I: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<I>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(rename = "orderBy", skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Value>,
}

impl<I: Serialize> Default for ListOptions<I> {
    fn default() -> Self {
        Self {
            include: None,
            filter: None,
            limit: None,
            offset: None,
            order_by: None,
            order: None,
            select: None,
            exclude: None,
            vector: None,
        }
    }
}

/// Per-relation include options; serializes to the wire options object.
/// An all-default value serializes to `{}`, equivalent to `true`.
#[derive(Debug, Clone, Serialize)]
pub struct IncludeRel<N: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Box<N>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(rename = "orderBy", skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl<N: Serialize> Default for IncludeRel<N> {
    fn default() -> Self {
        Self {
            include: None,
            limit: None,
            offset: None,
            order_by: None,
            order: None,
            select: None,
            exclude: None,
            filter: None,
        }
    }
}

/// Issue a JSON request and hand back (status, decoded body).
pub async fn send_json(
    http: &reqwest::Client,
    config: &SdkConfig,
    method: reqwest::Method,
    path: &str,
    body: Option<&Value>,
) -> Result<(u16, Value), SdkError> {
    let url = format!("{}{}", config.base_url.trim_end_matches('/'), path);
    let mut request = http.request(method, url);
    if let Some(key) = &config.api_key {
        request = request.header(config.api_key_header.as_str(), key);
    }
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await?;
    let status = response.status().as_u16();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    Ok((status, value))
}
"#;

/// `clients/{table}.rs`
pub fn client_module(
    table: &Table,
    inflector: &dyn Inflector,
    date_type: DateType,
    paths: &[RelationPath],
) -> RustFile {
    let base = type_name(&table.name, inflector);
    let client_name = format!("{}Client", pascal_case(&table.name));
    let (table_mod, _) = rust_ident(&table.name);
    let table_mod = table_mod.trim_start_matches("r#").to_string();

    let mut file = RustFile::new()
        .header(&[&format!("Typed client for `/v1/{}`.", table.name)])
        .use_("serde_json::{json, Value}")
        .use_("super::super::support::{send_json, ListOptions, Page, SdkConfig, SdkError}")
        .use_(&format!(
            "super::super::types::{table_mod}::{{{base}, {base}Include, {base}Insert, {base}Update}}"
        ));

    file.push(Item::Raw(format!(
        "#[derive(Clone)]\npub struct {client_name} {{\n    http: reqwest::Client,\n    config: SdkConfig,\n}}"
    )));

    let pk_args = pk_arg_list(table, date_type);
    let has_pk = !pk_args.is_empty();
    let pk_sig = pk_args
        .iter()
        .map(|(ident, _, ty)| format!("{ident}: {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    let pk_path = pk_args
        .iter()
        .map(|(ident, _, _)| format!("{{{ident}}}"))
        .collect::<Vec<_>>()
        .join("/");
    let table_path = format!("/v1/{}", table.name);

    let mut methods: Vec<String> = Vec::new();

    methods.push(format!(
        r#"pub fn new(http: reqwest::Client, config: SdkConfig) -> Self {{
    Self {{ http, config }}
}}"#
    ));

    methods.push(format!(
        r#"pub async fn create(&self, input: &{base}Insert) -> Result<{base}, SdkError> {{
    let body = serde_json::to_value(input).map_err(SdkError::Decode)?;
    let (status, value) = send_json(&self.http, &self.config, reqwest::Method::POST, {path}, Some(&body)).await?;
    if status == 201 {{
        serde_json::from_value(value).map_err(SdkError::Decode)
    }} else {{
        Err(SdkError::Api {{ status, body: value }})
    }}
}}"#,
        path = string_literal(&table_path),
    ));

    if has_pk {
        methods.push(format!(
            r#"pub async fn get(&self, {pk_sig}) -> Result<Option<{base}>, SdkError> {{
    let path = format!("{table_path}/{pk_path}");
    let (status, value) = send_json(&self.http, &self.config, reqwest::Method::GET, &path, None).await?;
    match status {{
        200 => serde_json::from_value(value).map(Some).map_err(SdkError::Decode),
        404 => Ok(None),
        _ => Err(SdkError::Api {{ status, body: value }}),
    }}
}}"#
        ));
    }

    methods.push(format!(
        r#"pub async fn list(&self, options: &ListOptions<{base}Include>) -> Result<Page<{base}>, SdkError> {{
    let body = serde_json::to_value(options).map_err(SdkError::Decode)?;
    self.list_raw(body).await
}}"#
    ));

    if has_pk {
        methods.push(format!(
            r#"pub async fn update(&self, {pk_sig}, patch: &{base}Update) -> Result<Option<{base}>, SdkError> {{
    let path = format!("{table_path}/{pk_path}");
    let body = serde_json::to_value(patch).map_err(SdkError::Decode)?;
    let (status, value) = send_json(&self.http, &self.config, reqwest::Method::PATCH, &path, Some(&body)).await?;
    match status {{
        200 => serde_json::from_value(value).map(Some).map_err(SdkError::Decode),
        404 => Ok(None),
        _ => Err(SdkError::Api {{ status, body: value }}),
    }}
}}"#
        ));

        methods.push(format!(
            r#"pub async fn delete(&self, {pk_sig}) -> Result<Option<{base}>, SdkError> {{
    let path = format!("{table_path}/{pk_path}");
    let (status, value) = send_json(&self.http, &self.config, reqwest::Method::DELETE, &path, None).await?;
    match status {{
        200 => serde_json::from_value(value).map(Some).map_err(SdkError::Decode),
        404 => Ok(None),
        _ => Err(SdkError::Api {{ status, body: value }}),
    }}
}}"#
        ));
    }

    methods.push(format!(
        r#"async fn list_raw(&self, body: Value) -> Result<Page<{base}>, SdkError> {{
    let (status, value) = send_json(&self.http, &self.config, reqwest::Method::POST, concat!({path}, "/list"), Some(&body)).await?;
    if status == 200 {{
        serde_json::from_value(value).map_err(SdkError::Decode)
    }} else {{
        Err(SdkError::Api {{ status, body: value }})
    }}
}}"#,
        path = string_literal(&table_path),
    ));

    // One method pair per reachable relation chain.
    for path in paths {
        let method_suffix = path
            .segments
            .iter()
            .map(|(key, _)| rust_ident(key).0.trim_start_matches("r#").to_string())
            .collect::<Vec<_>>()
            .join("_");
        let include_expr = include_json_expr(path);

        methods.push(format!(
            r#"/// `list`, hydrating `{chain}`.
pub async fn list_with_{method_suffix}(&self, options: &ListOptions<{base}Include>) -> Result<Page<{base}>, SdkError> {{
    let mut body = serde_json::to_value(options).map_err(SdkError::Decode)?;
    body["include"] = {include_expr};
    self.list_raw(body).await
}}"#,
            chain = path.key_path(),
        ));

        let pk_filter = pk_args
            .iter()
            .map(|(ident, col, _)| {
                format!(
                    "{}: serde_json::to_value({ident}).map_err(SdkError::Decode)?",
                    string_literal(col)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        if !has_pk {
            continue;
        }
        methods.push(format!(
            r#"/// `get`, hydrating `{chain}`.
pub async fn get_with_{method_suffix}(&self, {pk_sig}) -> Result<Option<{base}>, SdkError> {{
    let body = json!({{
        "where": {{{pk_filter}}},
        "limit": 1,
        "include": {include_expr},
    }});
    let page = self.list_raw(body).await?;
    Ok(page.data.into_iter().next())
}}"#,
            chain = path.key_path(),
        ));
    }

    let impl_block = format!(
        "impl {client_name} {{\n{}\n}}",
        methods
            .iter()
            .map(|m| indent(m, 1))
            .collect::<Vec<_>>()
            .join("\n\n")
    );
    file.push(Item::Raw(impl_block));
    file
}

/// `clients/mod.rs`
pub fn clients_mod(tables: &[String]) -> RustFile {
    let mut file = RustFile::new().header(&["One typed client per resource."]);
    for table in tables {
        let (ident, _) = rust_ident(table);
        file.push(Item::Mod {
            name: ident.trim_start_matches("r#").to_string(),
        });
    }
    file
}

/// `types/mod.rs` (client side)
pub fn types_mod(tables: &[String]) -> RustFile {
    let mut file = RustFile::new().header(&["Record and include types, one module per table."]);
    for table in tables {
        let (ident, _) = rust_ident(table);
        file.push(Item::Mod {
            name: ident.trim_start_matches("r#").to_string(),
        });
    }
    file
}

/// Client root `mod.rs`: the `Sdk` aggregate.
pub fn sdk_mod(tables: &[String]) -> RustFile {
    let mut file = RustFile::new()
        .header(&[
            "Generated SDK entry point. Construct once and share; every",
            "resource client reuses the same connection pool.",
        ])
        .use_("self::support::SdkConfig");
    file.push(Item::Mod {
        name: "clients".to_string(),
    });
    file.push(Item::Mod {
        name: "support".to_string(),
    });
    file.push(Item::Mod {
        name: "types".to_string(),
    });

    let mut fields = Vec::new();
    let mut inits = Vec::new();
    for table in tables {
        let (ident, _) = rust_ident(table);
        let mod_name = ident.trim_start_matches("r#").to_string();
        let client_ty = format!("clients::{mod_name}::{}Client", pascal_case(table));
        fields.push(format!("    pub {ident}: {client_ty},"));
        inits.push(format!(
            "        {ident}: {client_ty}::new(http.clone(), config.clone()),"
        ));
    }

    file.push(Item::Raw(format!(
        "pub struct Sdk {{\n{}\n}}",
        fields.join("\n")
    )));
    file.push(Item::Raw(format!(
        "impl Sdk {{\n    pub fn new(config: SdkConfig) -> Self {{\n        let http = reqwest::Client::new();\n        Self {{\n{}\n        }}\n    }}\n}}",
        inits.join("\n")
    )));
    file
}

/// Primary-key call arguments: (ident, column name, parameter type).
fn pk_arg_list(table: &Table, date_type: DateType) -> Vec<(String, String, String)> {
    table
        .primary_key
        .iter()
        .map(|col_name| {
            let (ident, _) = rust_ident(col_name);
            let ident = ident.trim_start_matches("r#").to_string();
            let ty = match table.columns.get(col_name).map(|c| &c.data_type) {
                Some(dt) => {
                    let t = rust_type(dt, date_type);
                    if t == "String" {
                        "&str".to_string()
                    } else {
                        format!("&{t}")
                    }
                }
                None => "&str".to_string(),
            };
            (ident, col_name.clone(), ty)
        })
        .collect()
}

/// Nested include literal for a relation chain: `books.tags` →
/// `json!({"books": {"include": {"tags": true}}})`.
fn include_json_expr(path: &RelationPath) -> String {
    let mut expr = "true".to_string();
    for (key, _) in path.segments.iter().rev() {
        let key_lit = string_literal(key);
        expr = if expr == "true" {
            format!("{{{key_lit}: true}}")
        } else {
            format!("{{{key_lit}: {{\"include\": {expr}}}}}")
        };
    }
    format!("json!({expr})")
}

fn indent(block: &str, levels: usize) -> String {
    let pad = "    ".repeat(levels);
    block
        .lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{pad}{l}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::naming::TrailingS;
    use crate::schema::types::Column;

    fn authors_table() -> Table {
        let mut t = Table::new("authors".to_string());
        let mut id = Column::new("id".to_string(), DataType::Uuid, "uuid".to_string());
        id.nullable = false;
        t.columns.insert("id".into(), id);
        let mut name = Column::new("name".to_string(), DataType::Text, "text".to_string());
        name.nullable = false;
        t.columns.insert("name".into(), name);
        t.primary_key = vec!["id".into()];
        t
    }

    fn books_path() -> RelationPath {
        RelationPath {
            segments: vec![("books".to_string(), "books".to_string())],
        }
    }

    #[test]
    fn test_client_module_crud_methods() {
        let table = authors_table();
        let out = client_module(&table, &TrailingS, DateType::String, &[books_path()]).render();

        assert!(out.contains("pub struct AuthorsClient {"));
        assert!(out.contains("pub async fn create(&self, input: &AuthorInsert) -> Result<Author, SdkError>"));
        assert!(out.contains("pub async fn get(&self, id: &uuid::Uuid) -> Result<Option<Author>, SdkError>"));
        assert!(out.contains("pub async fn list_with_books"));
        assert!(out.contains("pub async fn get_with_books"));
        assert!(out.contains("\"/v1/authors\""));
    }

    #[test]
    fn test_include_json_expr_nesting() {
        let path = RelationPath {
            segments: vec![
                ("books".to_string(), "books".to_string()),
                ("tags".to_string(), "tags".to_string()),
            ],
        };
        assert_eq!(
            include_json_expr(&path),
            "json!({\"books\": {\"include\": {\"tags\": true}}})"
        );
        assert_eq!(include_json_expr(&books_path()), "json!({\"books\": true})");
    }

    #[test]
    fn test_sdk_mod_aggregates_clients() {
        let out = sdk_mod(&["authors".to_string(), "books".to_string()]).render();
        assert!(out.contains("pub struct Sdk {"));
        assert!(out.contains("pub authors: clients::authors::AuthorsClient,"));
        assert!(out.contains("pub fn new(config: SdkConfig) -> Self"));
    }
}
