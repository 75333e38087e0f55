use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::llm::{
    ChatCompletionGateway, ChatCompletionRequest, CompletionChunk,
    ConversationTurn, build_completion_request,
};
use crate::preferences::Preferences;
use crate::transcript::{ABANDONED_TEXT, ChatMessage, FAILED_TEXT, Transcript};

const STREAM_IDLE_TIMEOUT_REASON: &str = "stream timed out";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming {
        accumulator: String,
    },
    Errored {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing was submitted (empty input) or no turn was streaming.
    Ignored,
    Completed { text: String },
    Failed { reason: String },
    Cancelled { partial: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a conspiracy is already streaming")]
    Busy,
}

/// Owns one chat session: the visible transcript, the provider-facing history
/// and the live preferences new submissions read from.
#[derive(Debug)]
pub struct ConversationController {
    model: String,
    stream_idle_timeout: Duration,
    preferences: Preferences,
    transcript: Transcript,
    history: Vec<ConversationTurn>,
    state: StreamState,
}

impl ConversationController {
    pub fn new(
        model: impl Into<String>,
        stream_idle_timeout: Duration,
        preferences: Preferences,
    ) -> Self {
        Self {
            model: model.into(),
            stream_idle_timeout,
            preferences,
            transcript: Transcript::default(),
            history: Vec::new(),
            state: StreamState::Idle,
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Live preferences; edits apply to the next submission without saving.
    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, StreamState::Streaming { .. })
    }

    /// Records the user's message and the placeholder, and returns the request
    /// to send. `Ok(None)` for empty input.
    pub fn begin_turn(
        &mut self,
        user_text: &str,
    ) -> Result<Option<ChatCompletionRequest>, SubmitError> {
        if user_text.is_empty() {
            return Ok(None);
        }
        if self.is_streaming() {
            return Err(SubmitError::Busy);
        }

        let context = self.preferences.context.as_str();
        let spicyness = self.preferences.spicyness;
        let request =
            build_completion_request(&self.model, &self.history, context, user_text, spicyness);

        self.transcript
            .push(ChatMessage::from_user(user_text, context, spicyness));
        self.history.push(ConversationTurn::user(user_text));
        self.transcript.open_placeholder();
        self.state = StreamState::Streaming {
            accumulator: String::new(),
        };

        info!(
            history_turns = self.history.len(),
            spicyness = spicyness.value(),
            "conspiracy submitted"
        );
        Ok(Some(request))
    }

    /// Merges one streamed chunk into the placeholder. Returns `true` when the
    /// transcript changed.
    pub fn apply_chunk(&mut self, chunk: &CompletionChunk) -> bool {
        let StreamState::Streaming { accumulator } = &mut self.state else {
            return false;
        };
        let Some(delta) = chunk.text_delta() else {
            return false;
        };

        accumulator.push_str(delta);
        self.transcript.replace_placeholder_text(accumulator)
    }

    pub fn finish_turn(&mut self) -> TurnOutcome {
        let Some(accumulator) = self.take_accumulator() else {
            return TurnOutcome::Ignored;
        };

        self.transcript.seal_placeholder();
        self.history.push(ConversationTurn::assistant(accumulator.clone()));
        info!(chars = accumulator.chars().count(), "conspiracy completed");
        TurnOutcome::Completed { text: accumulator }
    }

    pub fn fail_turn(&mut self, reason: impl Into<String>) -> TurnOutcome {
        if !self.is_streaming() {
            return TurnOutcome::Ignored;
        }

        let reason = reason.into();
        warn!(reason = %reason, "conspiracy failed");
        self.transcript.replace_placeholder_text(FAILED_TEXT);
        self.transcript.seal_placeholder();
        self.state = StreamState::Errored {
            reason: reason.clone(),
        };
        TurnOutcome::Failed { reason }
    }

    /// Stops the active turn. Text received so far is kept and recorded as the
    /// assistant turn.
    pub fn cancel_turn(&mut self) -> TurnOutcome {
        let Some(accumulator) = self.take_accumulator() else {
            return TurnOutcome::Ignored;
        };

        if accumulator.is_empty() {
            self.transcript.replace_placeholder_text(ABANDONED_TEXT);
        } else {
            self.history.push(ConversationTurn::assistant(accumulator.clone()));
        }
        self.transcript.seal_placeholder();
        info!(chars = accumulator.chars().count(), "conspiracy cancelled");
        TurnOutcome::Cancelled {
            partial: accumulator,
        }
    }

    /// Runs one full turn: records the user message, streams the completion
    /// into the placeholder and finalizes it.
    ///
    /// `on_update` runs after the placeholder is added, after every chunk that
    /// changes the transcript and once more when the turn ends. The turn is
    /// cancelled as soon as `cancel` resolves.
    pub async fn submit<G, F, C>(
        &mut self,
        gateway: &G,
        user_text: &str,
        mut on_update: F,
        cancel: C,
    ) -> Result<TurnOutcome, SubmitError>
    where
        G: ChatCompletionGateway + ?Sized,
        F: FnMut(&Transcript),
        C: Future<Output = ()>,
    {
        let Some(request) = self.begin_turn(user_text)? else {
            return Ok(TurnOutcome::Ignored);
        };
        on_update(&self.transcript);
        tokio::pin!(cancel);

        // Opening is bounded by the gateway's own per-attempt timeout and
        // retry budget; the idle window only covers the gaps between chunks.
        let idle_timeout = self.stream_idle_timeout;
        let opened = tokio::select! {
            biased;
            () = &mut cancel => None,
            opened = gateway.stream_completion(request) => Some(opened),
        };

        let outcome = match opened {
            None => self.cancel_turn(),
            Some(Err(err)) => self.fail_turn(err.to_string()),
            Some(Ok(mut stream)) => loop {
                let next = tokio::select! {
                    biased;
                    () = &mut cancel => None,
                    next = timeout(idle_timeout, stream.next()) => Some(next),
                };

                match next {
                    None => break self.cancel_turn(),
                    Some(Err(_elapsed)) => break self.fail_turn(STREAM_IDLE_TIMEOUT_REASON),
                    Some(Ok(None)) => break self.finish_turn(),
                    Some(Ok(Some(Err(err)))) => break self.fail_turn(err.to_string()),
                    Some(Ok(Some(Ok(chunk)))) => {
                        if self.apply_chunk(&chunk) {
                            on_update(&self.transcript);
                        } else {
                            debug!("skipping chunk without text");
                        }
                    }
                }
            },
        };

        on_update(&self.transcript);
        Ok(outcome)
    }

    /// Ends the streaming state, leaving `Idle`. `None` when nothing streams.
    fn take_accumulator(&mut self) -> Option<String> {
        if !self.is_streaming() {
            return None;
        }
        match std::mem::take(&mut self.state) {
            StreamState::Streaming { accumulator } => Some(accumulator),
            _ => None,
        }
    }
}
