use async_trait::async_trait;
use thiserror::Error;

/// Error text the Bot API returns when the recipient blocked the bot.
pub const BLOCKED_BY_USER: &str = "Forbidden: bot was blocked by the user";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{}", BLOCKED_BY_USER)]
    BlockedByUser,

    #[error("chat api error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("chat transport error: {0}")]
    Transport(String),
}

impl ChatError {
    /// Classify a Bot API failure description.
    pub fn from_api(code: i64, description: impl Into<String>) -> Self {
        let description = description.into();
        if description == BLOCKED_BY_USER {
            ChatError::BlockedByUser
        } else {
            ChatError::Api { code, description }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineButton {
    Url { text: String, url: String },
    Callback { text: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    /// Persistent reply keyboard, one inner vec per row
    Keyboard(Vec<Vec<String>>),
    /// Buttons attached to the message itself
    Inline(Vec<Vec<InlineButton>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

impl OutgoingMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            markup: None,
        }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    Message {
        chat_id: i64,
        text: String,
        first_name: String,
        last_name: String,
        username: String,
    },
    Callback {
        chat_id: i64,
        message_id: i64,
        data: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), ChatError>;
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChatError>;
    /// Long-poll for updates with `update_id >= offset`
    async fn poll_updates(&self, offset: i64) -> Result<Vec<Update>, ChatError>;
}

/// Send and swallow [`ChatError::BlockedByUser`]: a user who blocked the bot
/// is not a delivery failure.
pub async fn deliver(chat: &dyn ChatTransport, message: OutgoingMessage) -> Result<(), ChatError> {
    match chat.send_message(message).await {
        Err(ChatError::BlockedByUser) => Ok(()),
        other => other,
    }
}
