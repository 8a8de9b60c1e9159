//! StackFlow chat-ops
//!
//! Webhook responder for chat bots deployed by StackFlow stacks, plus the
//! small text helpers the bots share.

pub mod error;
pub mod webhook;

pub use error::{ChatOpsError, Result};
pub use webhook::{
    ChatEvent, ChatEventKind, EventCallback, EventHandler, WebhookConfig, WebhookRequest,
    WebhookResponse, handle_webhook,
};

/// Unique user ids mentioned as `<@ID>` in `text`, in order of first appearance
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('>') else {
            break;
        };

        let id = &after[..end];
        if !id.is_empty()
            && id.chars().all(|c| c.is_ascii_alphanumeric())
            && !mentions.iter().any(|m| m.eq_ignore_ascii_case(id))
        {
            mentions.push(id.to_string());
        }
        rest = &after[end + 1..];
    }

    mentions
}
