use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use serde::Serialize;
use thiserror::Error;

use super::turns::ConversationTurn;
use crate::spicyness::Spicyness;

pub type CompletionChunkStream =
    Pin<Box<dyn Stream<Item = Result<CompletionChunk, ChatGatewayError>> + Send>>;

pub type ChatStreamFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionChunkStream, ChatGatewayError>> + Send + 'a>>;

/// Outbound streaming completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ConversationTurn>,
    pub stream: bool,
    pub temperature: f64,
}

/// Builds the provider request for one submission.
///
/// The system turn carrying `context` is placed after the prior history and is
/// never part of the history itself.
pub fn build_completion_request(
    model: &str,
    history: &[ConversationTurn],
    context: &str,
    user_text: &str,
    spicyness: Spicyness,
) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.extend_from_slice(history);
    messages.push(ConversationTurn::system(context));
    messages.push(ConversationTurn::user(user_text));

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        stream: true,
        temperature: spicyness.value(),
    }
}

/// One streamed piece of the completion; `delta` is absent on role-only or
/// finish chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionChunk {
    pub delta: Option<String>,
}

impl CompletionChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
        }
    }

    pub fn empty() -> Self {
        Self { delta: None }
    }

    pub fn text_delta(&self) -> Option<&str> {
        self.delta.as_deref().filter(|delta| !delta.is_empty())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider stream failed: {0}")]
    StreamFailure(String),
}

pub trait ChatCompletionGateway: Send + Sync {
    fn stream_completion<'a>(&'a self, request: ChatCompletionRequest) -> ChatStreamFuture<'a>;
}
