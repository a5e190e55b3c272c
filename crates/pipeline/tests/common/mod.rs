//! In-process mocks of the local engine and the remote queue service,
//! used to drive the façade end to end over real HTTP.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

pub const PROMPT_ID: &str = "mock-prompt-1";
pub const JOB_ID: &str = "mock-job-1";

async fn bind(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base_url
}

// ---------------------------------------------------------------------------
// Local engine mock
// ---------------------------------------------------------------------------

/// Always-ready engine that completes every prompt on the first history
/// poll and records each submitted graph.
#[derive(Default)]
pub struct EngineState {
    /// `outputs` object returned with the completed history entry.
    pub outputs: serde_json::Value,
    /// Every graph received by `/prompt`, in order.
    pub submissions: Mutex<Vec<serde_json::Value>>,
}

pub async fn spawn_engine(state: EngineState) -> (String, Arc<EngineState>) {
    let state = Arc::new(state);

    let app = Router::new()
        .route("/system_stats", get(|| async { Json(serde_json::json!({})) }))
        .route("/prompt", post(submit_prompt))
        .route("/history/{prompt_id}", get(history))
        .with_state(Arc::clone(&state));

    (bind(app).await, state)
}

async fn submit_prompt(
    State(state): State<Arc<EngineState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state
        .submissions
        .lock()
        .unwrap()
        .push(body["prompt"].clone());
    Json(serde_json::json!({ "prompt_id": PROMPT_ID }))
}

async fn history(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        PROMPT_ID: {
            "status": { "completed": true },
            "outputs": state.outputs,
        }
    }))
}

// ---------------------------------------------------------------------------
// Remote queue mock
// ---------------------------------------------------------------------------

/// Queue endpoint that walks a scripted status sequence and returns a
/// fixed output payload.
pub struct QueueState {
    /// Status bodies returned per poll; the last entry repeats.
    pub statuses: Vec<serde_json::Value>,
    pub status_hits: AtomicU32,
    pub output: serde_json::Value,
    pub submitted: Mutex<Option<serde_json::Value>>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            statuses: vec![serde_json::json!({ "status": "COMPLETED" })],
            status_hits: AtomicU32::new(0),
            output: serde_json::json!({ "output": { "images": [] } }),
            submitted: Mutex::new(None),
        }
    }
}

pub async fn spawn_queue(state: QueueState) -> (String, Arc<QueueState>) {
    let state = Arc::new(state);

    let app = Router::new()
        .route("/v2/{endpoint}/run", post(run))
        .route("/v2/{endpoint}/status/{id}", get(status))
        .route("/v2/{endpoint}/output/{id}", get(output))
        .with_state(Arc::clone(&state));

    (bind(app).await, state)
}

async fn run(
    State(state): State<Arc<QueueState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    *state.submitted.lock().unwrap() = Some(body);
    Json(serde_json::json!({ "id": JOB_ID }))
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
