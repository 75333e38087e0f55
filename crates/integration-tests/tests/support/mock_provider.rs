use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::llm::OpenAiGatewayConfig;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ProviderReply {
    status: StatusCode,
    body: String,
}

impl ProviderReply {
    /// A streamed completion delivering `deltas` in order, then `[DONE]`.
    pub fn stream(deltas: &[&str]) -> Self {
        let mut body = String::new();
        for delta in deltas {
            let chunk = json!({ "choices": [{ "index": 0, "delta": { "content": delta } }] });
            body.push_str(&format!("data: {chunk}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn error(status: StatusCode, code: &str) -> Self {
        Self {
            status,
            body: json!({ "error": { "code": code, "message": "mock provider error" } })
                .to_string(),
        }
    }
}

#[derive(Clone)]
struct ProviderState {
    replies: Arc<Mutex<VecDeque<ProviderReply>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// OpenAI-compatible chat completions endpoint answering from a queue.
pub struct MockProvider {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockProvider {
    pub async fn start(replies: Vec<ProviderReply>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ProviderState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state);

        let (listener, addr) = super::local_listener().await;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("mock provider should run");
        });

        Self {
            url: format!("http://{addr}/v1/chat/completions"),
            requests,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn gateway_config(&self) -> OpenAiGatewayConfig {
        OpenAiGatewayConfig {
            chat_completions_url: self.url.clone(),
            api_key: "test-openai-key".to_string(),
            timeout_ms: 5_000,
            max_retries: 0,
            retry_base_backoff_ms: 0,
        }
    }

    pub async fn requests(&self) -> Vec<Value> {
        self.requests.lock().await.clone()
    }

    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.expect("mock provider task should join");
        }
    }
}

async fn chat_completions(
    State(state): State<ProviderState>,
    Json(payload): Json<Value>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    state.requests.lock().await.push(payload);

    let reply = state
        .replies
        .lock()
        .await
        .pop_front()
        .unwrap_or_else(|| ProviderReply::error(StatusCode::INTERNAL_SERVER_ERROR, "no_reply"));
    let content_type = if reply.status.is_success() {
        "text/event-stream"
    } else {
        "application/json"
    };
    (reply.status, [(header::CONTENT_TYPE, content_type)], reply.body)
}
