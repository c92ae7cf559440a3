//! Telegram Bot API transport: outgoing messages and long-polled updates.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Proxy};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::Config;
use crate::error::{describe, AppError, Result};

/// Longest text the Bot API accepts in one message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Delivers rich-text (HTML) messages to chat recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AppError::Transport(format!(
                "{} failed: {}",
                method,
                self.description.unwrap_or_else(|| "unknown error".to_string())
            ))),
        }
    }
}

pub struct TelegramClient {
    client: Client,
    api_base: String,
    timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration, proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = ClientBuilder::new().connect_timeout(Duration::from_secs(10));
        if let Some(proxy_url) = proxy_url {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| AppError::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.telegram_api_url,
            &config.bot_token,
            config.http_timeout,
            config.proxy_url.as_deref(),
        )
    }

    /// Long-polls for updates after `offset`, waiting up to `poll` for one to arrive.
    pub async fn get_updates(&self, offset: i64, poll: Duration) -> Result<Vec<Update>> {
        let response: ApiResponse<Vec<Update>> = self
            .client
            .get(format!("{}/getUpdates", self.api_base))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", poll.as_secs().to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .timeout(poll + self.timeout)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        response.into_result("getUpdates")
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response: ApiResponse<serde_json::Value> = self
            .client
            .post(format!("{}/sendMessage", self.api_base))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        response.into_result("sendMessage")?;
        debug!(chat_id, "Message delivered");
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> AppError {
    AppError::Transport(describe(&err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&server.uri(), "123:abc", Duration::from_secs(5), None).unwrap()
    }

    #[tokio::test]
    async fn sends_html_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": "42",
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
                "disable_web_page_preview": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send_message("42", "<b>hi</b>").await.unwrap();
    }

    #[tokio::test]
    async fn api_refusal_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let err = client(&server).send_message("42", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Transport(ref m) if m.contains("blocked")));
    }

    #[tokio::test]
    async fn polls_updates_from_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getUpdates"))
            .and(query_param("offset", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 7, "message": {"message_id": 1, "chat": {"id": 555, "type": "private"}, "text": "/start"}},
                    {"update_id": 8, "edited_message": {}}
                ]
            })))
            .mount(&server)
            .await;

        let updates = client(&server).get_updates(7, Duration::from_secs(0)).await.unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 555);
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert!(updates[1].message.is_none());
    }
}
