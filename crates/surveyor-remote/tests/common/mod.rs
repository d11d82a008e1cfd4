//! In-process stand-ins for the inference service, the REST store and the
//! auth endpoint, served by axum on an ephemeral port

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// One multipart field as the fake service received it
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub len: usize,
    pub text: Option<String>,
}

/// A file as the fake storage received it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bucket: String,
    pub name: String,
    pub content_type: Option<String>,
    pub len: usize,
}

#[derive(Default)]
pub struct FakeState {
    pub tables: HashMap<String, Vec<Value>>,
    pub objects: Vec<StoredObject>,
    pub next_id: u32,
    pub fail_deletes: bool,
    pub fail_uploads: bool,
    pub analyze_reply: Option<(StatusCode, Value)>,
    pub refine_reply: Option<Value>,
    pub received: Vec<ReceivedField>,
    pub requests: Vec<String>,
}

impl FakeState {
    pub fn seed(&mut self, table: &str, row: Value) {
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&ReceivedField> {
        self.received.iter().find(|f| f.name == name)
    }
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeServer {
    pub url: String,
    state: Shared,
}

impl FakeServer {
    pub async fn start() -> Self {
        Self::start_with(FakeState::default()).await
    }

    pub async fn start_with(state: FakeState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new()
            .route("/analyze", post(analyze))
            .route("/analyze/refine", post(refine))
            .route(
                "/rest/v1/:table",
                get(select).post(insert).patch(update).delete(remove),
            )
            .route("/storage/v1/object/:bucket/*name", post(store_object))
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/signup", post(signup))
            .route("/auth/v1/logout", post(logout))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

async fn collect_fields(multipart: &mut Multipart) -> Vec<ReceivedField> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap();
        let text = if file_name.is_none() {
            String::from_utf8(bytes.to_vec()).ok()
        } else {
            None
        };
        fields.push(ReceivedField {
            name,
            file_name,
            content_type,
            len: bytes.len(),
            text,
        });
    }
    fields
}

async fn analyze(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let fields = collect_fields(&mut multipart).await;
    let mut state = state.lock().unwrap();
    state.requests.push("POST /analyze".to_string());
    state.received = fields;
    let (status, body) = state.analyze_reply.clone().unwrap_or((
        StatusCode::OK,
        json!({"status": "success", "scan_id": "abc123", "total_estimate": 0, "damages": []}),
    ));
    (status, Json(body)).into_response()
}

/// Replies with the configured verdict and, on success, writes it to the
/// damage row the way the real service does
async fn refine(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let fields = collect_fields(&mut multipart).await;
    let mut state = state.lock().unwrap();
    state.requests.push("POST /analyze/refine".to_string());
    let damage_id = fields
        .iter()
        .find(|f| f.name == "damage_id")
        .and_then(|f| f.text.clone())
        .unwrap_or_default();
    state.received = fields;

    let reply = state.refine_reply.clone().unwrap_or_else(|| {
        json!({
            "status": "success",
            "damage_id": damage_id,
            "severity_scores": [85, 90, 88],
            "final_severity": 88,
            "action": "Part Replacement",
            "cost": 18000,
            "confidence": "high"
        })
    });

    if reply["status"] == "success" {
        if let Some(row) = state
            .tables
            .get_mut("damages")
            .and_then(|rows| rows.iter_mut().find(|r| field_str(&r["id"]) == damage_id))
        {
            for key in ["final_severity", "action", "cost", "confidence", "severity_scores"] {
                row[key] = reply[key].clone();
            }
            row["status"] = json!("verified");
        }
    }
    Json(reply).into_response()
}

fn field_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches_filters(row: &Value, query: &HashMap<String, String>) -> bool {
    query.iter().all(|(column, filter)| match filter.strip_prefix("eq.") {
        Some(expected) => field_str(&row[column.as_str()]) == expected,
        None => true,
    })
}

fn unauthorized(headers: &HeaderMap) -> Option<Response> {
    let has_key = headers.contains_key("apikey");
    let has_bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    (!has_key || !has_bearer).then(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "No API key found in request"})),
        )
            .into_response()
    })
}

async fn select(
    State(state): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(denied) = unauthorized(&headers) {
        return denied;
    }
    let mut state = state.lock().unwrap();
    state.requests.push(format!("GET {table}"));
    let mut rows: Vec<Value> = state
        .rows(&table)
        .into_iter()
        .filter(|row| matches_filters(row, &query))
        .collect();
    if query.get("order").map(String::as_str) == Some("created_at.desc") {
        rows.sort_by_key(|row| std::cmp::Reverse(field_str(&row["created_at"])));
    }
    Json(rows).into_response()
}

async fn insert(
    State(state): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Vec<Value>>,
) -> Response {
    if let Some(denied) = unauthorized(&headers) {
        return denied;
    }
    let mut state = state.lock().unwrap();
    state.requests.push(format!("POST {table}"));
    let mut stored = Vec::new();
    for mut row in body {
        state.next_id += 1;
        row["id"] = json!(format!("{}-{}", table, state.next_id));
        state.seed(&table, row.clone());
        stored.push(row);
    }
    let wants_rows = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("return=representation"));
    if wants_rows {
        (StatusCode::CREATED, Json(stored)).into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}

async fn update(
    State(state): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(patch): Json<Value>,
) -> Response {
    if let Some(denied) = unauthorized(&headers) {
        return denied;
    }
    let mut state = state.lock().unwrap();
    state.requests.push(format!("PATCH {table}"));
    if let (Some(rows), Some(patch)) = (state.tables.get_mut(&table), patch.as_object()) {
        for row in rows.iter_mut().filter(|row| matches_filters(row, &query)) {
            for (key, value) in patch {
                row[key.as_str()] = value.clone();
            }
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn remove(
    State(state): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(denied) = unauthorized(&headers) {
        return denied;
    }
    let mut state = state.lock().unwrap();
    state.requests.push(format!("DELETE {table}"));
    if state.fail_deletes {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "could not delete row"})),
        )
            .into_response();
    }
    if let Some(rows) = state.tables.get_mut(&table) {
        rows.retain(|row| !matches_filters(row, &query));
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn store_object(
    State(state): State<Shared>,
    Path((bucket, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(denied) = unauthorized(&headers) {
        return denied;
    }
    let mut state = state.lock().unwrap();
    state.requests.push(format!("POST storage {bucket}"));
    if state.fail_uploads {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({
                "statusCode": "413",
                "error": "Payload too large",
                "message": "The object exceeded the maximum allowed size"
            })),
        )
            .into_response();
    }
    state.objects.push(StoredObject {
        bucket: bucket.clone(),
        name: name.clone(),
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        len: body.len(),
    });
    Json(json!({"Key": format!("{bucket}/{name}")})).into_response()
}

async fn token(
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let valid = query.get("grant_type").map(String::as_str) == Some("password")
        && body["email"] == "ana@example.com"
        && body["password"] == "secret";
    if !valid {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        )
            .into_response();
    }
    Json(json!({
        "access_token": "jwt-ana",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-ana",
        "user": {"id": "user-ana", "email": "ana@example.com"}
    }))
    .into_response()
}

async fn signup(Json(body): Json<Value>) -> Response {
    Json(json!({
        "id": "user-new",
        "email": body["email"],
        "confirmation_sent_at": "2025-01-01T00:00:00Z"
    }))
    .into_response()
}

async fn logout(headers: HeaderMap) -> Response {
    match headers.get("authorization") {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}
