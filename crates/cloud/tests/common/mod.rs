//! In-process mock of the remote queue service.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

pub const JOB_ID: &str = "mock-job-1";

/// Scripted behaviour and call counters for one mock queue endpoint.
pub struct QueueState {
    /// Body returned by `POST /v2/{endpoint}/run`.
    pub run_response: serde_json::Value,

    /// Status bodies returned per poll; the last entry repeats.
    pub statuses: Vec<serde_json::Value>,
    pub status_hits: AtomicU32,

    /// Body returned by `GET /v2/{endpoint}/output/{id}`.
    pub output: serde_json::Value,

    /// `(status, body)` per `runsync` call; the last entry repeats.
    pub runsync: Vec<(u16, String)>,
    pub runsync_hits: AtomicU32,

    /// Last submission body received on either run route.
    pub submitted: Mutex<Option<serde_json::Value>>,
    /// Authorization header seen on the last submission.
    pub auth_header: Mutex<Option<String>>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            run_response: serde_json::json!({ "id": JOB_ID }),
            statuses: vec![serde_json::json!({ "status": "COMPLETED" })],
            status_hits: AtomicU32::new(0),
            output: serde_json::json!({ "output": { "images": [] } }),
            runsync: vec![(200, serde_json::json!({ "output": { "images": [] } }).to_string())],
            runsync_hits: AtomicU32::new(0),
            submitted: Mutex::new(None),
            auth_header: Mutex::new(None),
        }
    }
}

/// Spawn the mock queue and return its base URL.
pub async fn spawn_queue(state: QueueState) -> (String, Arc<QueueState>) {
    let state = Arc::new(state);

    let app = Router::new()
        .route("/v2/{endpoint}/run", post(run))
        .route("/v2/{endpoint}/runsync", post(run_sync))
        .route("/v2/{endpoint}/status/{id}", get(status))
        .route("/v2/{endpoint}/output/{id}", get(output))
        .route("/v2/{endpoint}/health", get(health))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, state)
}

fn record_submission(state: &QueueState, headers: &HeaderMap, body: serde_json::Value) {
    *state.submitted.lock().unwrap() = Some(body);
    *state.auth_header.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
}

async fn run(
    State(state): State<Arc<QueueState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    record_submission(&state, &headers, body);
    Json(state.run_response.clone())
}

async fn run_sync(
    State(state): State<Arc<QueueState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    record_submission(&state, &headers, body);

    let hit = state.runsync_hits.fetch_add(1, Ordering::SeqCst) as usize;
    let (status, body) = state
        .runsync
        .get(hit)
        .or_else(|| state.runsync.last())
        .cloned()
        .unwrap();

    (StatusCode::from_u16(status).unwrap(), body)
}

async fn status(State(state): State<Arc<QueueState>>) -> impl IntoResponse {
    let hit = state.status_hits.fetch_add(1, Ordering::SeqCst) as usize;
    let body = state
        .statuses
        .get(hit)
        .or_else(|| state.statuses.last())
        .cloned()
        .unwrap();

    Json(body)
}

async fn output(State(state): State<Arc<QueueState>>) -> impl IntoResponse {
    Json(state.output.clone())
}

async fn health(State(_state): State<Arc<QueueState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "workers": { "ready": 1 }, "jobs": { "inQueue": 0 } }))
}
