//! In-process fake of the CallHook REST backend

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use callhook_dashboard::ApiClient;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const CONVERSATION_ID: Uuid = Uuid::from_u128(0x0c0ffee);
pub const LEAD_ID: Uuid = Uuid::from_u128(0x1ead);
pub const BUSINESS_ID: Uuid = Uuid::from_u128(0xb12);
pub const TIMESTAMP: &str = "2026-03-02T14:30:00Z";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug)]
pub struct FakeState {
    pub conversation_status: String,
    pub messages: Vec<Value>,
    pub fail_handoff: bool,
    pub leads: Vec<Value>,
    pub requests: Vec<Recorded>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            conversation_status: "active".to_string(),
            messages: vec![message("Hi, my AC stopped working", "inbound", "caller")],
            fail_handoff: false,
            leads: vec![
                lead(1, "new"),
                lead(2, "booked"),
                lead(3, "qualified"),
                lead(4, "booked"),
            ],
            requests: Vec::new(),
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeBackend {
    pub url: String,
    pub state: Shared,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));

        let api = Router::new()
            .route("/dashboard/stats", get(stats))
            .route("/leads", get(leads))
            .route("/conversations/:id", get(conversation))
            .route("/conversations/:id/takeover", post(takeover))
            .route("/conversations/:id/return-ai", post(return_ai))
            .route("/conversations/:id/message", post(send_message))
            .route("/appointments", get(unavailable));

        let app = Router::new()
            .nest("/api", api)
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.url, Duration::from_secs(5))
            .unwrap()
            .authenticated("test-token")
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: &str, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(suffix))
            .count()
    }

    pub fn set_fail_handoff(&self, fail: bool) {
        self.state.lock().unwrap().fail_handoff = fail;
    }
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let recorded = Recorded {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        authorization: request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    state.lock().unwrap().requests.push(recorded);
    next.run(request).await
}

pub fn message(body: &str, direction: &str, sender: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "conversation_id": CONVERSATION_ID,
        "direction": direction,
        "sender_type": sender,
        "body": body,
        "status": "delivered",
        "created_at": TIMESTAMP,
    })
}

pub fn lead(n: u128, status: &str) -> Value {
    json!({
        "id": Uuid::from_u128(n),
        "business_id": BUSINESS_ID,
        "phone": format!("+1555000000{}", n),
        "name": format!("Lead {}", n),
        "status": status,
        "source": "missed_call",
        "created_at": TIMESTAMP,
        "updated_at": TIMESTAMP,
    })
}

fn conversation_json(status: &str) -> Value {
    json!({
        "id": CONVERSATION_ID,
        "business_id": BUSINESS_ID,
        "lead_id": LEAD_ID,
        "call_id": null,
        "status": status,
        "follow_up_count": 0,
        "next_follow_up_at": null,
        "created_at": TIMESTAMP,
        "updated_at": TIMESTAMP,
    })
}

async fn stats() -> Json<Value> {
    let period = json!({
        "total_calls": 12,
        "missed_calls": 5,
        "recovered_calls": 3,
        "estimated_revenue": 1234.0,
    });
    Json(json!({ "stats": { "today": period, "this_month": period } }))
}

async fn leads(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let state = state.lock().unwrap();
    let leads: Vec<Value> = state
        .leads
        .iter()
        .filter(|lead| match params.get("status") {
            Some(status) => lead["status"] == json!(status),
            None => true,
        })
        .cloned()
        .collect();
    Json(json!({ "leads": leads }))
}

async fn conversation(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    if id != CONVERSATION_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    let state = state.lock().unwrap();
    Json(json!({
        "conversation": conversation_json(&state.conversation_status),
        "messages": state.messages,
    }))
    .into_response()
}

/// Answers with the bare status
async fn takeover(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let mut state = state.lock().unwrap();
    if state.fail_handoff {
        return StatusCode::CONFLICT.into_response();
    }
    if id != CONVERSATION_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.conversation_status = "human_active".to_string();
    Json(json!({ "status": "human_active" })).into_response()
}

/// Answers with the whole conversation
async fn return_ai(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let mut state = state.lock().unwrap();
    if state.fail_handoff {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if id != CONVERSATION_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.conversation_status = "active".to_string();
    Json(json!({ "conversation": conversation_json("active") })).into_response()
}

async fn send_message(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
    Json(input): Json<Value>,
) -> Response {
    if id != CONVERSATION_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(body) = input["body"].as_str() else {
        return StatusCode::UNPROCESSABLE_ENTITY.into_response();
    };
    let created = message(body, "outbound", "human");
    state.lock().unwrap().messages.push(created.clone());
    Json(json!({ "message": created })).into_response()
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}
