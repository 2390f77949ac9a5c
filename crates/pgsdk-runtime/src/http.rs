//! # HTTP surface
//!
//! The axum router a generated server mounts: CRUD + list routes for every
//! registry table, the contract endpoints, and the SDK pull endpoints. The
//! handlers here are thin — auth check, body decode, dispatch into
//! `handlers`, status mapping — so the behavior under test lives in the
//! framework-neutral layer.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::{self, ApiContext};
use crate::query::{ListRequest, ListResult};

/// The embedded SDK bundle served by the pull endpoints.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SdkManifest {
    pub version: String,
    pub generated: String,
    pub files: IndexMap<String, String>,
}

pub struct AppState {
    pub ctx: ApiContext,
    pub contract: Value,
    pub contract_md: String,
    pub manifest: SdkManifest,
}

/// Contract and SDK pull routes, mounted next to the table routes.
pub fn meta_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/contract", get(contract_json_handler))
        .route("/api/contract.json", get(contract_json_handler))
        .route("/api/contract.md", get(contract_md_handler))
        .route("/_psdk/sdk/manifest", get(sdk_manifest_handler))
        .route("/_psdk/sdk/download", get(sdk_download_handler))
}

/// Generic router over every registry table. Generated servers mount their
/// per-table route modules instead; this one backs tests and dev servers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/:table", post(create_handler))
        .route("/v1/:table/list", post(list_handler))
        .route(
            "/v1/:table/*pk",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .merge(meta_routes())
        .with_state(Arc::new(state))
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "generated API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

// ---------------------------------------------------------------------------
// CRUD handlers
// ---------------------------------------------------------------------------

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    create_for(&state, &table, &headers, &body).await
}

/// `POST /v1/{table}` body, shared by the generic router and generated
/// per-table route modules.
pub async fn create_for(
    state: &AppState,
    table: &str,
    headers: &HeaderMap,
    body: &Value,
) -> Response {
    if let Err(err) = check_api_auth(state, headers) {
        return error_response(state, err);
    }
    match handlers::create(&state.ctx, table, body).await {
        Ok(row) => (StatusCode::CREATED, Json(row)).into_response(),
        Err(err) => error_response(state, err),
    }
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path((table, pk)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    get_for(&state, &table, &pk, &headers).await
}

pub async fn get_for(state: &AppState, table: &str, pk_raw: &str, headers: &HeaderMap) -> Response {
    if let Err(err) = check_api_auth(state, headers) {
        return error_response(state, err);
    }
    match handlers::get_by_pk(&state.ctx, table, &split_pk(pk_raw)).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(Value::Null)).into_response(),
        Err(err) => error_response(state, err),
    }
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Response {
    list_for(&state, &table, &headers, body.map(|Json(v)| v)).await
}

pub async fn list_for(
    state: &AppState,
    table: &str,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Response {
    if let Err(err) = check_api_auth(state, headers) {
        return error_response(state, err);
    }
    let raw = body.unwrap_or_else(|| json!({}));
    let req: ListRequest = match serde_json::from_value(raw) {
        Ok(req) => req,
        Err(e) => {
            return error_response(
                state,
                ApiError::invalid("body", format!("invalid list request: {e}")),
            )
        }
    };
    match handlers::list(&state.ctx, table, &req).await {
        Ok(result) => (StatusCode::OK, Json(list_body(result))).into_response(),
        Err(err) => error_response(state, err),
    }
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path((table, pk)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    update_for(&state, &table, &pk, &headers, &body).await
}

pub async fn update_for(
    state: &AppState,
    table: &str,
    pk_raw: &str,
    headers: &HeaderMap,
    body: &Value,
) -> Response {
    if let Err(err) = check_api_auth(state, headers) {
        return error_response(state, err);
    }
    match handlers::update(&state.ctx, table, &split_pk(pk_raw), body).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(Value::Null)).into_response(),
        Err(err) => error_response(state, err),
    }
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path((table, pk)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    delete_for(&state, &table, &pk, &headers).await
}

pub async fn delete_for(state: &AppState, table: &str, pk_raw: &str, headers: &HeaderMap) -> Response {
    if let Err(err) = check_api_auth(state, headers) {
        return error_response(state, err);
    }
    match handlers::delete(&state.ctx, table, &split_pk(pk_raw)).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(Value::Null)).into_response(),
        Err(err) => error_response(state, err),
    }
}

// ---------------------------------------------------------------------------
// Contract and SDK pull endpoints
// ---------------------------------------------------------------------------

async fn contract_json_handler(State(state): State<Arc<AppState>>) -> Response {
    (StatusCode::OK, Json(state.contract.clone())).into_response()
}

async fn contract_md_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        state.contract_md.clone(),
    )
        .into_response()
}

async fn sdk_manifest_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(err) = check_pull_auth(&state, &headers) {
        return error_response(&state, err);
    }
    let files: Vec<&String> = state.manifest.files.keys().collect();
    (
        StatusCode::OK,
        Json(json!({ "version": state.manifest.version, "files": files })),
    )
        .into_response()
}

async fn sdk_download_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(err) = check_pull_auth(&state, &headers) {
        return error_response(&state, err);
    }
    (
        StatusCode::OK,
        Json(json!({
            "version": state.manifest.version,
            "generated": state.manifest.generated,
            "files": state.manifest.files,
        })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Auth and response mapping
// ---------------------------------------------------------------------------

fn check_api_auth(state: &AppState, headers: &HeaderMap) -> crate::error::Result<()> {
    let keys = &state.ctx.options.api_keys;
    if keys.is_empty() {
        return Ok(());
    }
    let header_name = state.ctx.options.api_key_header.as_str();
    let provided = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if keys.iter().any(|k| k == provided) {
        Ok(())
    } else {
        Err(ApiError::Auth {
            message: format!("missing or invalid {header_name}"),
        })
    }
}

fn check_pull_auth(state: &AppState, headers: &HeaderMap) -> crate::error::Result<()> {
    let Some(token) = &state.ctx.options.pull_token else {
        return Ok(());
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    if provided == token {
        Ok(())
    } else {
        Err(ApiError::Auth {
            message: "missing or invalid pull token".to_string(),
        })
    }
}

fn split_pk(raw: &str) -> Vec<String> {
    raw.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn list_body(result: ListResult) -> Value {
    let mut body = json!({
        "data": result.data,
        "total": result.total,
        "limit": result.limit,
        "offset": result.offset,
        "hasMore": result.has_more,
    });
    if !result.include_errors.is_empty() {
        body["includeError"] = json!({ "errors": result.include_errors });
    }
    body
}

fn error_response(state: &AppState, err: ApiError) -> Response {
    let debug = state.ctx.options.debug;
    match err {
        ApiError::Validation { issues } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "validation", "issues": issues })),
        )
            .into_response(),
        ApiError::NotFound => (StatusCode::NOT_FOUND, Json(Value::Null)).into_response(),
        ApiError::Auth { message } => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "message": message })),
        )
            .into_response(),
        ApiError::Database { operation, source } => {
            tracing::error!(%operation, error = %source, "database error");
            let body = if debug {
                json!({ "error": "database", "operation": operation, "detail": source.to_string() })
            } else {
                json!({ "error": "database", "message": "internal database error" })
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        ApiError::IncludeStitch { path, message } => {
            tracing::error!(%path, %message, "include stitch error escalated");
            let body = if debug {
                json!({ "error": "include", "path": path, "detail": message })
            } else {
                json!({ "error": "include", "message": "failed to load included relations" })
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pk_composite() {
        assert_eq!(split_pk("a/b"), vec!["a", "b"]);
        assert_eq!(split_pk("/a/"), vec!["a"]);
        assert_eq!(split_pk("5f8b"), vec!["5f8b"]);
    }

    #[test]
    fn test_list_body_includes_error_key_only_on_failures() {
        let result = ListResult {
            data: vec![],
            total: 0,
            limit: 50,
            offset: 0,
            has_more: false,
            include_errors: vec![],
        };
        let body = list_body(result);
        assert!(body.get("includeError").is_none());
        assert_eq!(body["hasMore"], serde_json::json!(false));
    }
}
