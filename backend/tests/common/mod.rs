#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use chatrelay_backend::config::Config;
use chatrelay_backend::models::User;
use chatrelay_backend::state::AppState;
use chatrelay_backend::store::{ChatStore, MemoryStore};

// ═══════════════════════════════════════════════════════════════════════════
//  Stand-in n8n workflow
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub enum MockReply {
    Json(Value),
    /// `application/x-ndjson` body, one line per entry, `delay` between lines.
    Ndjson { lines: Vec<String>, delay: Duration },
    Status(u16),
    /// Answer only after `Duration`.
    Slow(Duration, Value),
}

/// One webhook call as the workflow saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub webhook_id: String,
    pub business_function: String,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    reply: MockReply,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockN8n {
    pub base_url: String,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl MockN8n {
    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }
}

async fn webhook(
    State(mock): State<MockState>,
    Path((webhook_id, business_function)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    mock.calls.lock().unwrap().push(Recorded {
        webhook_id,
        business_function,
        body,
    });

    match mock.reply {
        MockReply::Json(value) => Json(value).into_response(),
        MockReply::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            "workflow exploded",
        )
            .into_response(),
        MockReply::Slow(delay, value) => {
            tokio::time::sleep(delay).await;
            Json(value).into_response()
        }
        MockReply::Ndjson { lines, delay } => {
            let stream = async_stream::stream! {
                for (i, line) in lines.into_iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(delay).await;
                    }
                    yield Ok::<_, std::convert::Infallible>(Bytes::from(format!("{line}\n")));
                }
            };
            (
                [(header::CONTENT_TYPE, "application/x-ndjson")],
                Body::from_stream(stream),
            )
                .into_response()
        }
    }
}

pub async fn spawn_n8n(reply: MockReply) -> MockN8n {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/webhook/{id}/{bf}", post(webhook))
        .with_state(MockState {
            reply,
            calls: calls.clone(),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockN8n {
        base_url: format!("http://{addr}"),
        calls,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  App under test
// ═══════════════════════════════════════════════════════════════════════════

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub n8n: MockN8n,
}

pub fn test_config(base_url: &str) -> Config {
    Config {
        n8n_base_url: base_url.to_string(),
        n8n_webhook_id: "test-hook".to_string(),
        webhook_timeout: Duration::from_millis(500),
        ..Config::default()
    }
}

impl TestApp {
    pub async fn new(reply: MockReply) -> Self {
        Self::with_config(reply, |_| {}).await
    }

    pub async fn with_config(reply: MockReply, tweak: impl FnOnce(&mut Config)) -> Self {
        let n8n = spawn_n8n(reply).await;
        let mut config = test_config(&n8n.base_url);
        tweak(&mut config);
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config, reqwest::Client::new());
        Self { state, store, n8n }
    }

    pub fn router(&self) -> Router {
        chatrelay_backend::create_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    /// A regular (non-guest) user row.
    pub async fn user(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert_user(User {
                id,
                email: Some(format!("{id}@example.com")),
            })
            .await;
        id
    }

    pub async fn assistant_messages(&self, chat_id: Uuid) -> Vec<String> {
        self.store
            .messages_by_chat(chat_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.role == chatrelay_backend::models::Role::Assistant)
            .map(|m| m.text())
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Requests & bodies
// ═══════════════════════════════════════════════════════════════════════════

pub fn chat_body(chat_id: Uuid, text: &str, business_function: Option<&str>) -> Value {
    let mut body = json!({
        "id": chat_id,
        "message": {
            "id": Uuid::new_v4(),
            "role": "user",
            "parts": [{ "type": "text", "text": text }]
        },
        "selectedVisibilityType": "private"
    });
    if let Some(bf) = business_function {
        body["businessFunction"] = json!(bf);
    }
    body
}

pub fn json_request(method: &str, uri: &str, user: Option<Uuid>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn request(method: &str, uri: &str, user: Option<Uuid>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_chat(user: Uuid, chat_id: Uuid, text: &str) -> Request<Body> {
    json_request("POST", "/api/chat", Some(user), &chat_body(chat_id, text, None))
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

/// SSE `data:` payloads in order; `[DONE]` is returned as the string "[DONE]".
pub fn sse_payloads(text: &str) -> Vec<Value> {
    text.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| {
            if data == "[DONE]" {
                Value::String(data.to_string())
            } else {
                serde_json::from_str(data).unwrap()
            }
        })
        .collect()
}

/// The decoded messages carried by `data-appendMessage` chunks.
pub fn appended_messages(text: &str) -> Vec<Value> {
    sse_payloads(text)
        .into_iter()
        .filter(|p| p["type"] == "data-appendMessage")
        .map(|p| serde_json::from_str(p["data"].as_str().unwrap()).unwrap())
        .collect()
}

pub fn reply(text: &str) -> Value {
    json!([{ "success": true, "response": text }])
}
