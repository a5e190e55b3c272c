//! In-process mock of the engine's HTTP API.
//!
//! Binds an axum app to an ephemeral local port so driver tests
//! exercise the real reqwest polling loops end to end.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

/// Scripted behaviour and call counters for one mock engine.
#[derive(Default)]
pub struct EngineState {
    /// Number of initial `/system_stats` probes to fail with 503.
    pub readiness_failures: u32,
    pub readiness_hits: AtomicU32,

    /// When set, `/prompt` answers with this status and body.
    pub reject_submission: Option<(u16, String)>,

    /// History poll count at which the entry reports completion.
    pub complete_after: u32,
    pub history_hits: AtomicU32,

    /// `outputs` object returned once the entry completes, keyed by
    /// node id in the order given here.
    pub outputs: serde_json::Value,

    /// Last graph received by `/prompt`.
    pub submitted: Mutex<Option<serde_json::Value>>,
}

pub const PROMPT_ID: &str = "mock-prompt-1";

/// Spawn the mock engine and return its base URL.
pub async fn spawn_engine(state: EngineState) -> (String, Arc<EngineState>) {
    let state = Arc::new(state);

    let app = Router::new()
        .route("/system_stats", get(system_stats))
        .route("/prompt", post(submit_prompt))
        .route("/history/{prompt_id}", get(history))
        .route("/workflow.json", get(workflow_document))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, state)
}

async fn system_stats(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    let hit = state.readiness_hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= state.readiness_failures {
        (StatusCode::SERVICE_UNAVAILABLE, "starting up").into_response()
    } else {
        Json(serde_json::json!({ "system": { "os": "linux" } })).into_response()
    }
}

async fn submit_prompt(
    State(state): State<Arc<EngineState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    *state.submitted.lock().unwrap() = Some(body["prompt"].clone());

    if let Some((status, body)) = &state.reject_submission {
        return (StatusCode::from_u16(*status).unwrap(), body.clone()).into_response();
    }

    Json(serde_json::json!({ "prompt_id": PROMPT_ID })).into_response()
}

async fn history(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    let hit = state.history_hits.fetch_add(1, Ordering::SeqCst) + 1;
    let completed = state.complete_after > 0 && hit >= state.complete_after;

    let entry = if completed {
        serde_json::json!({
            "status": { "completed": true },
            "outputs": state.outputs,
        })
    } else {
        serde_json::json!({
            "status": { "completed": false },
            "outputs": {},
        })
    };

    Json(serde_json::json!({ PROMPT_ID: entry }))
}

async fn workflow_document() -> impl IntoResponse {
    Json(serde_json::json!({
        "1": { "class_type": "LoadImage", "inputs": { "image": "placeholder.png" } },
        "2": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": "" },
            "_meta": { "title": "Positive Prompt" }
        }
    }))
}
