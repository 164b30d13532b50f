use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart;
use serde_json::{Value, json};
use std::sync::Arc;

/// Identity reported by the messaging platform for a bot credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub first_name: String,
    pub username: Option<String>,
}

/// The messaging primitives the dispatcher needs from a bot session.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Lightweight identity call used to verify a session.
    async fn get_me(&self) -> Result<BotIdentity>;

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Send a JPEG with a caption. The caller enforces the caption limit.
    async fn send_photo(&self, chat_id: &str, photo: &[u8], caption: &str) -> Result<()>;
}

/// Builds a fresh [`Messenger`] from a bot credential.
pub trait Connector: Send + Sync {
    fn connect(&self, token: &str) -> Result<Arc<dyn Messenger>>;
}

/// Telegram Bot API session bound to one bot token.
pub struct TelegramBot {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramBot {
    /// Create a new TelegramBot.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Bot API root, e.g. `https://api.telegram.org`
    /// * `token` - Bot token issued by BotFather
    pub fn new(client: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Check the Bot API envelope and return its `result`.
    async fn read_result(method: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() || body["ok"].as_bool() != Some(true) {
            let description = body["description"].as_str().unwrap_or("no description");
            return Err(anyhow::anyhow!(
                "Telegram {} failed: HTTP {}: {}",
                method,
                status,
                description
            ));
        }

        Ok(body["result"].clone())
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn get_me(&self) -> Result<BotIdentity> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        let result = Self::read_result("getMe", response).await?;

        Ok(BotIdentity {
            first_name: result["first_name"].as_str().unwrap_or_default().to_string(),
            username: result["username"].as_str().map(str::to_string),
        })
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await?;

        Self::read_result("sendMessage", response).await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: &str, photo: &[u8], caption: &str) -> Result<()> {
        let filename = format!("alert_{}.jpg", chrono::Utc::now().timestamp());
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(
                "photo",
                multipart::Part::bytes(photo.to_vec())
                    .file_name(filename)
                    .mime_str("image/jpeg")?,
            );

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;

        Self::read_result("sendPhoto", response).await?;
        Ok(())
    }
}

/// Connector producing [`TelegramBot`] sessions that share one HTTP client.
pub struct TelegramConnector {
    client: reqwest::Client,
    api_url: String,
}

impl TelegramConnector {
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }
}

impl Connector for TelegramConnector {
    fn connect(&self, token: &str) -> Result<Arc<dyn Messenger>> {
        if token.trim().is_empty() {
            return Err(anyhow::anyhow!("bot token is empty"));
        }
        Ok(Arc::new(TelegramBot::new(
            self.client.clone(),
            &self.api_url,
            token,
        )))
    }
}
