use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::blocks::MessageTemplate;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack returned HTTP {status}")]
    Status { status: u16 },
    #[error("slack api error: {0}")]
    Api(String),
}

/// Outbound side of the chat integration.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SendError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub user: Option<String>,
    pub team: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    team: Option<String>,
}

/// Web API client. The bot token posts messages; the app-level token is only
/// used to open Socket Mode connections.
#[derive(Clone)]
pub struct SlackWebClient {
    http: Client,
    api_base: String,
    bot_token: SecretString,
    app_token: SecretString,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, app_token: SecretString) -> Result<Self, SendError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| SendError::Transport(error.to_string()))?;
        Ok(Self { http, api_base: SLACK_API_BASE.to_owned(), bot_token, app_token })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Single-use WebSocket URL for a new Socket Mode session.
    pub async fn open_socket_url(&self) -> Result<String, SendError> {
        let response = self.call("apps.connections.open", &self.app_token, json!({})).await?;
        response
            .url
            .ok_or_else(|| SendError::Api("apps.connections.open returned no url".to_owned()))
    }

    pub async fn auth_test(&self) -> Result<BotIdentity, SendError> {
        let response = self.call("auth.test", &self.bot_token, json!({})).await?;
        let user_id = response
            .user_id
            .ok_or_else(|| SendError::Api("auth.test returned no user_id".to_owned()))?;
        Ok(BotIdentity { user_id, user: response.user, team: response.team })
    }

    async fn call(
        &self,
        method: &str,
        token: &SecretString,
        body: Value,
    ) -> Result<ApiResponse, SendError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| SendError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Status { status: status.as_u16() });
        }

        let decoded: ApiResponse =
            response.json().await.map_err(|error| SendError::Transport(error.to_string()))?;
        if !decoded.ok {
            return Err(SendError::Api(decoded.error.unwrap_or_else(|| "unknown_error".to_owned())));
        }
        Ok(decoded)
    }
}

pub fn post_message_body(channel_id: &str, message: &MessageTemplate) -> Value {
    let mut body = json!({
        "channel": channel_id,
        "text": message.fallback_text,
        "unfurl_links": false,
    });
    if !message.blocks.is_empty() {
        body["blocks"] = json!(message.blocks);
    }
    body
}

#[async_trait]
impl MessageSink for SlackWebClient {
    async fn send_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SendError> {
        self.call("chat.postMessage", &self.bot_token, post_message_body(channel_id, message))
            .await
            .map(|_| ())
    }
}
