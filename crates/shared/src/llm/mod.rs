pub mod gateway;
pub mod openai;
mod sse;
pub mod turns;

pub use gateway::{
    ChatCompletionGateway, ChatCompletionRequest, ChatGatewayError, ChatStreamFuture,
    CompletionChunk, CompletionChunkStream, build_completion_request,
};
pub use openai::{OpenAiGateway, OpenAiGatewayConfig};
pub use turns::{ConversationTurn, TurnRole};
