#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::{json, Value};

pub const EDGE_CONFIG_ID: &str = "ecfg_test";
pub const API_TOKEN: &str = "api-token";
pub const READ_TOKEN: &str = "read-token";
pub const SDK_KEY: &str = "sdk-key";

/// Everything the fake edge config and flag APIs hold or have seen.
#[derive(Default)]
pub struct MockState {
    /// Edge config items by key.
    pub items: HashMap<String, Value>,
    /// Bodies of every PATCH received.
    pub patches: Vec<Value>,
    /// One line per request, for asserting on query parameters.
    pub requests: Vec<String>,
    /// Status returned by item fetches instead of the item.
    pub fetch_status: Option<u16>,
    /// Status returned by upserts instead of applying them.
    pub upsert_status: Option<u16>,
    pub splits: Vec<Value>,
    pub splits_till: i64,
    /// Segment name to (added, removed, till).
    pub segments: HashMap<String, (Vec<String>, Vec<String>, i64)>,
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub base: String,
    pub state: Shared,
}

impl MockServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/v1/edge-config/{id}/item/{key}", get(handle_get_item))
            .route("/v1/edge-config/{id}/items", patch(handle_patch_items))
            .route("/read/{id}/item/{key}", get(handle_read_item))
            .route("/api/splitChanges", get(handle_split_changes))
            .route("/api/segmentChanges/{name}", get(handle_segment_changes))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            state,
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}/v1", self.base)
    }

    pub fn read_url(&self) -> String {
        format!("{}/read", self.base)
    }

    pub fn sdk_url(&self) -> String {
        format!("{}/api", self.base)
    }

    pub fn connection_string(&self) -> String {
        format!("{}/{}?token={}", self.read_url(), EDGE_CONFIG_ID, READ_TOKEN)
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn item(&self, key: &str) -> Option<Value> {
        self.with(|s| s.items.get(key).cloned())
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn status(code: u16) -> Response {
    StatusCode::from_u16(code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

async fn handle_get_item(
    State(state): State<Shared>,
    Path((id, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if bearer(&headers) != Some(API_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut s = state.lock().unwrap();
    s.requests.push(format!(
        "GET {}/{} teamId={}",
        id,
        key,
        query.get("teamId").map(String::as_str).unwrap_or("-")
    ));
    if let Some(code) = s.fetch_status {
        return status(code);
    }
    match s.items.get(&key) {
        Some(value) => Json(json!({ "key": key, "value": value })).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn handle_patch_items(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers) != Some(API_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut s = state.lock().unwrap();
    s.requests.push(format!(
        "PATCH {} teamId={}",
        id,
        query.get("teamId").map(String::as_str).unwrap_or("-")
    ));
    s.patches.push(body.clone());
    if let Some(code) = s.upsert_status {
        return status(code);
    }
    for item in body["items"].as_array().cloned().unwrap_or_default() {
        if item["operation"] == "upsert" {
            if let Some(key) = item["key"].as_str() {
                s.items.insert(key.to_string(), item["value"].clone());
            }
        }
    }
    Json(json!({ "status": "ok" })).into_response()
}

async fn handle_read_item(
    State(state): State<Shared>,
    Path((_id, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("token").map(String::as_str) != Some(READ_TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let s = state.lock().unwrap();
    if let Some(code) = s.fetch_status {
        return status(code);
    }
    match s.items.get(&key) {
        Some(value) => Json(value.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn since(query: &HashMap<String, String>) -> i64 {
    query
        .get("since")
        .and_then(|v| v.parse().ok())
        .unwrap_or(-1)
}

async fn handle_split_changes(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if bearer(&headers) != Some(SDK_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let since = since(&query);
    let mut s = state.lock().unwrap();
    s.requests.push(format!("splitChanges since={}", since));
    if since < s.splits_till {
        Json(json!({ "splits": s.splits, "since": since, "till": s.splits_till })).into_response()
    } else {
        Json(json!({ "splits": [], "since": since, "till": since })).into_response()
    }
}

async fn handle_segment_changes(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if bearer(&headers) != Some(SDK_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let since = since(&query);
    let mut s = state.lock().unwrap();
    s.requests.push(format!("segmentChanges/{} since={}", name, since));
    let (added, removed, till) = s.segments.get(&name).cloned().unwrap_or_default();
    if since < till {
        Json(json!({
            "name": name, "added": added, "removed": removed, "since": since, "till": till
        }))
        .into_response()
    } else {
        Json(json!({ "name": name, "added": [], "removed": [], "since": since, "till": since }))
            .into_response()
    }
}
