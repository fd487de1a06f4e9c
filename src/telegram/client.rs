use crate::config::TelegramConfig;
use crate::core::chat::{
    ChatError, ChatTransport, InlineButton, OutgoingMessage, ReplyMarkup, Update, UpdateKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// Bot API response wrapper
#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Debug)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
    callback_query: Option<RawCallback>,
}

#[derive(Deserialize, Debug)]
struct RawMessage {
    message_id: i64,
    chat: RawChat,
    #[serde(default)]
    text: String,
    from: Option<RawUser>,
}

#[derive(Deserialize, Debug)]
struct RawChat {
    id: i64,
}

#[derive(Deserialize, Debug, Default)]
struct RawUser {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    username: String,
}

#[derive(Deserialize, Debug)]
struct RawCallback {
    #[serde(default)]
    data: String,
    message: Option<RawMessage>,
}

impl RawUpdate {
    fn into_update(self) -> Option<Update> {
        let kind = if let Some(message) = self.message {
            let from = message.from.unwrap_or_default();
            UpdateKind::Message {
                chat_id: message.chat.id,
                text: message.text,
                first_name: from.first_name,
                last_name: from.last_name,
                username: from.username,
            }
        } else if let Some(callback) = self.callback_query {
            let message = callback.message?;
            UpdateKind::Callback {
                chat_id: message.chat.id,
                message_id: message.message_id,
                data: callback.data,
            }
        } else {
            return None;
        };
        Some(Update {
            update_id: self.update_id,
            kind,
        })
    }
}

fn markup_json(markup: &ReplyMarkup) -> Value {
    match markup {
        ReplyMarkup::Keyboard(rows) => json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|text| json!({ "text": text })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
        }),
        ReplyMarkup::Inline(rows) => json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| match button {
                            InlineButton::Url { text, url } => json!({ "text": text, "url": url }),
                            InlineButton::Callback { text, data } => {
                                json!({ "text": text, "callback_data": data })
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
    }
}

/// Telegram Bot API over HTTPS
pub struct TelegramClient {
    http: Client,
    api_base: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(cfg: &TelegramConfig) -> anyhow::Result<Self> {
        // Long polls hold the connection for poll_timeout_secs
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            http,
            api_base: format!("{}/bot{}", cfg.api_url.trim_end_matches('/'), cfg.token),
            poll_timeout_secs: cfg.poll_timeout_secs,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, ChatError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(format!("{}: {}", method, e)))?;

        // Error responses still carry a JSON body with the description
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| ChatError::Transport(format!("{}: decode: {}", method, e)))?;

        if !parsed.ok {
            return Err(ChatError::from_api(parsed.error_code, parsed.description));
        }
        parsed
            .result
            .ok_or_else(|| ChatError::Transport(format!("{}: empty result", method)))
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), ChatError> {
        let mut body = json!({
            "chat_id": message.chat_id,
            "text": message.text,
            "disable_web_page_preview": true,
        });
        if let Some(markup) = &message.markup {
            body["reply_markup"] = markup_json(markup);
        }
        let _: Value = self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), ChatError> {
        let _: Value = self
            .call(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn poll_updates(&self, offset: i64) -> Result<Vec<Update>, ChatError> {
        let raw: Vec<RawUpdate> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;
        debug!(count = raw.len(), offset, "Polled chat updates");
        Ok(raw.into_iter().filter_map(RawUpdate::into_update).collect())
    }
}
