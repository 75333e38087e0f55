use std::collections::VecDeque;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::gateway::{
    ChatCompletionGateway, ChatCompletionRequest, ChatGatewayError, ChatStreamFuture,
    CompletionChunk, CompletionChunkStream,
};
use super::sse::{SseEvent, SseParser};
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_u32_env, parse_u64_env, require_env};

const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 250;
const STREAM_DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct OpenAiGatewayConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
}

impl OpenAiGatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_env("OPENAI_API_KEY")?;
        let chat_completions_url = optional_trimmed_env("OPENAI_CHAT_COMPLETIONS_URL")
            .unwrap_or_else(|| DEFAULT_CHAT_COMPLETIONS_URL.to_string());
        validate_completions_url(&chat_completions_url)?;

        Ok(Self {
            chat_completions_url,
            api_key,
            timeout_ms: parse_u64_env("OPENAI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_u32_env("OPENAI_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_backoff_ms: parse_u64_env(
                "OPENAI_RETRY_BASE_BACKOFF_MS",
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?,
        })
    }
}

fn validate_completions_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|_| {
        ConfigError::InvalidConfiguration(
            "OPENAI_CHAT_COMPLETIONS_URL must be an absolute URL".to_string(),
        )
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidConfiguration(
            "OPENAI_CHAT_COMPLETIONS_URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

/// Streaming chat completions against an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiGateway {
    client: reqwest::Client,
    config: OpenAiGatewayConfig,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiGatewayConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, ChatGatewayError> {
        let mut attempt = 0_u32;

        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if err.retryable && attempt < self.config.max_retries {
                        let backoff_ms =
                            retry_backoff_ms(self.config.retry_base_backoff_ms, attempt);
                        warn!(
                            attempt = attempt + 1,
                            backoff_ms,
                            error = %err.error,
                            "retrying chat completion request"
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }

                    return Err(err.error);
                }
            }
        }
    }

    async fn send_once(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, SendAttemptError> {
        let pending = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send();

        let response = timeout(Duration::from_millis(self.config.timeout_ms), pending)
            .await
            .map_err(|_| SendAttemptError::retryable(ChatGatewayError::Timeout))?
            .map_err(|err| {
                if err.is_timeout() {
                    SendAttemptError::retryable(ChatGatewayError::Timeout)
                } else {
                    SendAttemptError::retryable(ChatGatewayError::ProviderFailure(
                        "request_unavailable".to_string(),
                    ))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let provider_code = parse_provider_error_code(&body);
        Err(SendAttemptError {
            error: ChatGatewayError::ProviderFailure(format!(
                "status={} code={provider_code}",
                status.as_u16()
            )),
            retryable: is_retryable_status(status),
        })
    }
}

impl ChatCompletionGateway for OpenAiGateway {
    fn stream_completion<'a>(&'a self, request: ChatCompletionRequest) -> ChatStreamFuture<'a> {
        Box::pin(async move {
            debug!(
                model = %request.model,
                turns = request.messages.len(),
                temperature = request.temperature,
                "opening chat completion stream"
            );
            let response = self.open_stream(&request).await?;
            Ok(chunk_stream(response))
        })
    }
}

pub(crate) fn retry_backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2_u64.saturating_pow(attempt))
}

#[derive(Debug)]
struct SendAttemptError {
    error: ChatGatewayError,
    retryable: bool,
}

impl SendAttemptError {
    fn retryable(error: ChatGatewayError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }
}

struct ChunkStreamState {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    parser: SseParser,
    pending: VecDeque<Result<CompletionChunk, ChatGatewayError>>,
    finished: bool,
}

impl ChunkStreamState {
    /// Queues parsed events; returns `true` once the provider signalled the end.
    fn queue_events(&mut self, events: Vec<SseEvent>) -> bool {
        for event in events {
            match parse_stream_event(&event) {
                StreamEvent::Chunk(chunk) => self.pending.push_back(Ok(chunk)),
                StreamEvent::Failure(err) => {
                    self.pending.push_back(Err(err));
                    return true;
                }
                StreamEvent::Done => return true,
                StreamEvent::Skip => {}
            }
        }
        false
    }
}

fn chunk_stream(response: reqwest::Response) -> CompletionChunkStream {
    let state = ChunkStreamState {
        body: response
            .bytes_stream()
            .map(|bytes| bytes.map(|bytes| bytes.to_vec()))
            .boxed(),
        parser: SseParser::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.parser.feed(&bytes);
                    state.finished = state.queue_events(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    let error = if err.is_timeout() {
                        ChatGatewayError::Timeout
                    } else {
                        ChatGatewayError::StreamFailure("response_body_read_failed".to_string())
                    };
                    state.pending.push_back(Err(error));
                }
                None => {
                    let trailing = state.parser.finish().into_iter().collect();
                    state.queue_events(trailing);
                    state.finished = true;
                }
            }
        }
    }))
}

enum StreamEvent {
    Chunk(CompletionChunk),
    Failure(ChatGatewayError),
    Done,
    Skip,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<OpenAiStreamDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn parse_stream_event(event: &SseEvent) -> StreamEvent {
    let data = event.data.trim();
    if data == STREAM_DONE_SENTINEL {
        return StreamEvent::Done;
    }

    let parsed = match serde_json::from_str::<OpenAiStreamResponse>(data) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(error = %err, "skipping malformed stream chunk");
            return StreamEvent::Skip;
        }
    };

    if let Some(error) = parsed.error {
        return StreamEvent::Failure(ChatGatewayError::StreamFailure(error_code_from_value(
            &error,
        )));
    }
    if event.event.as_deref() == Some("error") {
        return StreamEvent::Failure(ChatGatewayError::StreamFailure("unknown".to_string()));
    }

    let delta = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);
    StreamEvent::Chunk(CompletionChunk { delta })
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<Value>,
    }

    serde_json::from_str::<ProviderErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .map(|error| error_code_from_value(&error))
        .unwrap_or_else(|| "unknown".to_string())
}

fn error_code_from_value(error: &Value) -> String {
    let code = error.get("code").filter(|code| !code.is_null());
    let code = code.or_else(|| error.get("type"));
    match code {
        Some(Value::String(code)) => code.clone(),
        Some(Value::Number(code)) => code.to_string(),
        _ => "unknown".to_string(),
    }
}
