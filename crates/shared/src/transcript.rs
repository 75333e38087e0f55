use crate::spicyness::Spicyness;

pub const PLACEHOLDER_TEXT: &str = "conspiring...";
pub const FAILED_TEXT: &str = "conspiracy failed";
pub const ABANDONED_TEXT: &str = "conspiracy abandoned";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Assistant => "koala",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    pub context: Option<String>,
    pub spicyness: Option<Spicyness>,
    pub speaker: Speaker,
}

impl ChatMessage {
    pub fn from_user(
        text: impl Into<String>,
        context: impl Into<String>,
        spicyness: Spicyness,
    ) -> Self {
        Self {
            text: text.into(),
            context: Some(context.into()),
            spicyness: Some(spicyness),
            speaker: Speaker::User,
        }
    }

    pub fn from_assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            spicyness: None,
            speaker: Speaker::Assistant,
        }
    }
}

/// Ordered, append-only list of chat bubbles for one session.
///
/// At most one entry, always the last, is an open placeholder whose text may
/// still be replaced while a completion streams in.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    placeholder_open: bool,
}

impl Transcript {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn has_open_placeholder(&self) -> bool {
        self.placeholder_open
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.seal_placeholder();
        self.messages.push(message);
    }

    pub(crate) fn open_placeholder(&mut self) {
        self.push(ChatMessage::from_assistant(PLACEHOLDER_TEXT));
        self.placeholder_open = true;
    }

    /// Replaces the placeholder text. Returns `false` when no placeholder is open.
    pub(crate) fn replace_placeholder_text(&mut self, text: &str) -> bool {
        if !self.placeholder_open {
            return false;
        }
        match self.messages.last_mut() {
            Some(message) => {
                message.text.clear();
                message.text.push_str(text);
                true
            }
            None => false,
        }
    }

    pub(crate) fn seal_placeholder(&mut self) {
        self.placeholder_open = false;
    }
}
