//! In-process study backend for integration tests
//!
//! Serves one Airport scenario. The sample and feedback fields are sent
//! double-encoded like the real backend does. The first feedback submission
//! gets a fresh sample back, the second ends the interaction with `[DONE]`.
//! A resuming backend answers `import` with the sample the participant left
//! off at, scored, instead of expecting a `sample` call.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct Recorded {
    requests: Vec<(String, Value)>,
    feedback_calls: usize,
    resuming: bool,
}

type Shared = Arc<Mutex<Recorded>>;

/// Mock backend bound to 127.0.0.1 on an ephemeral port
pub struct MockBackend {
    base_url: String,
    recorded: Shared,
}

fn record(state: &Shared, endpoint: &str, body: &Value) {
    state
        .lock()
        .unwrap()
        .requests
        .push((endpoint.to_string(), body.clone()));
}

/// Sample + feedback, each as JSON text inside the JSON response
fn sample_response() -> Value {
    json!({
        "sample": json!({
            "0": {"id": "7", "name": "KJFK", "manager": "Port Authority"},
            "1": {"id": "9", "name": "KLGA", "manager": null}
        })
        .to_string(),
        "feedback": json!([
            {"row": 7, "col": "id", "marked": false},
            {"row": 7, "col": "name", "marked": false},
            {"row": 7, "col": "manager", "marked": false},
            {"row": 9, "col": "id", "marked": false},
            {"row": 9, "col": "name", "marked": false},
            {"row": 9, "col": "manager", "marked": true}
        ])
        .to_string(),
        "msg": "[SUCCESS]",
        "true_pos": "0",
        "false_pos": "0"
    })
}

async fn start(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    record(&state, "start", &body);
    (StatusCode::CREATED, Json(json!({"scenarios": [8]})))
}

async fn post_interaction(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    record(&state, "post-interaction", &body);
    if body["next_scenario_id"] == "0" {
        Json(json!({"header": []}))
    } else {
        Json(json!({"header": ["id", "name", "manager"]}))
    }
}

async fn import(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    record(&state, "import", &body);
    let reply = json!({"project_id": 42, "description": "Airfields and their managers"});
    if !state.lock().unwrap().resuming {
        return Json(reply);
    }
    let mut resumed = sample_response();
    resumed["project_id"] = reply["project_id"].clone();
    resumed["description"] = reply["description"].clone();
    resumed["is_resuming"] = json!(true);
    resumed["true_pos"] = json!("3");
    resumed["false_pos"] = json!("1");
    Json(resumed)
}

async fn sample(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    record(&state, "sample", &body);
    Json(sample_response())
}

async fn feedback(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    record(&state, "feedback", &body);
    let calls = {
        let mut recorded = state.lock().unwrap();
        recorded.feedback_calls += 1;
        recorded.feedback_calls
    };
    if calls >= 2 {
        Json(json!({"msg": "[DONE]"}))
    } else {
        Json(sample_response())
    }
}

async fn done(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    record(&state, "done", &body);
    StatusCode::CREATED
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

impl MockBackend {
    pub async fn start() -> Self {
        Self::serve(Recorded::default()).await
    }

    /// Backend that resumes every imported scenario mid-interaction
    pub async fn resuming() -> Self {
        Self::serve(Recorded {
            resuming: true,
            ..Recorded::default()
        })
        .await
    }

    async fn serve(recorded: Recorded) -> Self {
        let recorded: Shared = Arc::new(Mutex::new(recorded));
        let router = Router::new()
            .route("/duo/api/start", post(start))
            .route("/duo/api/post-interaction", post(post_interaction))
            .route("/duo/api/import", post(import))
            .route("/duo/api/sample", post(sample))
            .route("/duo/api/feedback", post(feedback))
            .route("/duo/api/done", post(done))
            .route("/duo/api/clean", post(broken))
            .with_state(Arc::clone(&recorded));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Mock backend crashed");
        });

        Self {
            base_url: format!("http://{}/duo/api", addr),
            recorded,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bodies received on `endpoint`, in arrival order
    pub fn requests(&self, endpoint: &str) -> Vec<Value> {
        self.recorded
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, body)| body.clone())
            .collect()
    }
}
