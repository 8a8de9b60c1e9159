//! Event webhook responder
//!
//! The chat platform re-delivers any event that is not acknowledged with a
//! 200. A failure inside this bot would therefore be retried forever, so
//! every internal error is logged and acknowledged anyway. Only a wrong
//! verification token is answered with 401.

use crate::error::{ChatOpsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_config::{Config, Secret};

/// Tokens the responder needs, read from stack configuration
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub bot_token: Option<Secret<String>>,
    pub verification_token: Option<Secret<String>>,
}

impl WebhookConfig {
    /// Reads `slackToken` and `verificationToken` from the given namespace
    ///
    /// Missing values are not an error here; the responder reports them per
    /// request so a misconfigured bot still acknowledges deliveries.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            bot_token: config.get_secret("slackToken")?,
            verification_token: config.get_secret("verificationToken")?,
        })
    }
}

/// Incoming webhook payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookRequest {
    UrlVerification {
        challenge: String,
    },
    EventCallback(EventCallback),
    #[serde(other)]
    Unknown,
}

/// An `event_callback` delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCallback {
    pub token: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub api_app_id: Option<String>,
    #[serde(default)]
    pub event: Option<ChatEvent>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_time: Option<i64>,
    #[serde(default)]
    pub authed_users: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    Message,
    AppMention,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub kind: ChatEventKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

/// What the bot does with verified events
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_message(&self, _callback: &EventCallback, _event: &ChatEvent) -> Result<()> {
        Ok(())
    }

    async fn on_app_mention(&self, _callback: &EventCallback, _event: &ChatEvent) -> Result<()> {
        Ok(())
    }
}

/// HTTP response to send back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: String::new(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: 401,
            body: "Invalid verification token".to_string(),
        }
    }
}

/// Answer one webhook delivery
pub async fn handle_webhook(
    body: &str,
    config: &WebhookConfig,
    handler: &dyn EventHandler,
) -> WebhookResponse {
    match process(body, config, handler).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Webhook processing failed, acknowledging anyway");
            WebhookResponse::ok()
        }
    }
}

async fn process(
    body: &str,
    config: &WebhookConfig,
    handler: &dyn EventHandler,
) -> Result<WebhookResponse> {
    if config.bot_token.is_none() {
        return Err(ChatOpsError::MissingConfig("slackToken".to_string()));
    }
    let verification_token = config
        .verification_token
        .as_ref()
        .ok_or_else(|| ChatOpsError::MissingConfig("verificationToken".to_string()))?;

    match serde_json::from_str::<WebhookRequest>(body)? {
        WebhookRequest::UrlVerification { challenge } => {
            tracing::info!("Answering URL verification");
            Ok(WebhookResponse {
                status: 200,
                body: serde_json::json!({ "challenge": challenge }).to_string(),
            })
        }
        WebhookRequest::EventCallback(callback) => {
            if callback.token != *verification_token.expose() {
                tracing::warn!("Invalid verification token");
                return Ok(WebhookResponse::unauthorized());
            }
            dispatch(&callback, handler).await?;
            Ok(WebhookResponse::ok())
        }
        WebhookRequest::Unknown => {
            tracing::warn!("Unknown request type");
            Ok(WebhookResponse::ok())
        }
    }
}

async fn dispatch(callback: &EventCallback, handler: &dyn EventHandler) -> Result<()> {
    let Some(event) = &callback.event else {
        tracing::debug!("No event in request");
        return Ok(());
    };

    match event.kind {
        ChatEventKind::Message => handler.on_message(callback, event).await,
        ChatEventKind::AppMention => handler.on_app_mention(callback, event).await,
        ChatEventKind::Other => {
            tracing::debug!("Ignoring unsupported event type");
            Ok(())
        }
    }
}
