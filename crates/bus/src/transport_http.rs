// SPDX-License-Identifier: MIT

//! Production [`Transport`] over the Telegram Bot HTTP API (§6): the only concrete wire dialect
//! this crate ships, reachable behind the same trait the fake drives in tests.

use async_trait::async_trait;
use ojb_transport::{Button, CallbackEvent, Keyboard, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::json;

pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    last_update_id: Mutex<Option<i64>>,
}

impl TelegramTransport {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
            last_update_id: Mutex::new(None),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    fn keyboard_markup(keyboard: &Keyboard) -> serde_json::Value {
        let rows: Vec<Vec<serde_json::Value>> = keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b: &Button| json!({"text": b.label, "callback_data": b.callback_token}))
                    .collect()
            })
            .collect();
        json!({"inline_keyboard": rows})
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;

        if response.status().as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(TransportError::RateLimited { retry_after_secs });
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| TransportError::Other(e.to_string()))?;

        if payload.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let description = payload.get("description").and_then(|v| v.as_str()).unwrap_or("unknown error");
            if description.to_ascii_lowercase().contains("message is not modified") {
                return Err(TransportError::ContentNotModified);
            }
            return Err(TransportError::Other(description.to_string()));
        }

        Ok(payload.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, chat_id: &str, text: &str, keyboard: Option<Keyboard>) -> Result<String, TransportError> {
        let mut body = json!({"chat_id": chat_id, "text": text, "parse_mode": "HTML"});
        if let Some(keyboard) = &keyboard {
            body["reply_markup"] = Self::keyboard_markup(keyboard);
        }
        let result = self.call("sendMessage", body).await?;
        let message_id = result.get("message_id").and_then(|v| v.as_i64()).unwrap_or_default();
        Ok(message_id.to_string())
    }

    async fn edit(&self, chat_id: &str, message_id: &str, text: &str) -> Result<(), TransportError> {
        let body = json!({"chat_id": chat_id, "message_id": message_id.parse::<i64>().unwrap_or_default(), "text": text, "parse_mode": "HTML"});
        self.call("editMessageText", body).await.map(|_| ())
    }

    async fn delete(&self, chat_id: &str, message_id: &str) -> Result<(), TransportError> {
        let body = json!({"chat_id": chat_id, "message_id": message_id.parse::<i64>().unwrap_or_default()});
        self.call("deleteMessage", body).await.map(|_| ())
    }

    async fn poll_updates(&self) -> Result<Vec<CallbackEvent>, TransportError> {
        let offset = (*self.last_update_id.lock()).map(|id| id + 1);
        let mut body = json!({"timeout": 0, "allowed_updates": ["callback_query"]});
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let result = self.call("getUpdates", body).await?;
        let updates = result.as_array().cloned().unwrap_or_default();
        let mut events = Vec::new();
        let mut max_update_id = *self.last_update_id.lock();

        for update in updates {
            if let Some(update_id) = update.get("update_id").and_then(|v| v.as_i64()) {
                max_update_id = Some(max_update_id.map_or(update_id, |m| m.max(update_id)));
            }
            let Some(query) = update.get("callback_query") else { continue };
            let (Some(token), Some(message), Some(from)) = (
                query.get("data").and_then(|v| v.as_str()),
                query.get("message"),
                query.get("from"),
            ) else {
                continue;
            };
            let (Some(chat_id), Some(message_id)) = (
                message.get("chat").and_then(|c| c.get("id")).and_then(|v| v.as_i64()),
                message.get("message_id").and_then(|v| v.as_i64()),
            ) else {
                continue;
            };
            let from_user = from.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string()).unwrap_or_default();
            events.push(CallbackEvent {
                callback_token: token.to_string(),
                chat_id: chat_id.to_string(),
                message_id: message_id.to_string(),
                from_user,
            });
        }

        *self.last_update_id.lock() = max_update_id;
        Ok(events)
    }
}
