//! Messaging-gateway boundary
//!
//! Inbound: the gateway delivers decoded message and menu-selection events as
//! a JSON envelope; this module filters them (bot authors, channel allow-list)
//! and turns them into typed `Inbound` items keyed by `ConversationKey`.
//! Outbound: `GatewayClient` posts replies and menus back through the
//! gateway's send webhook, and fetches attachment bytes.

use crate::flows::{ConversationKey, MenuPrompt, MenuSelection, Trigger};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Wake word shared by every trigger phrase.
pub const WAKE_WORD: &str = "ぴょんちー";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// An image attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

/// Raw event envelope as delivered by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    Message {
        channel_id: String,
        user_id: String,
        #[serde(default)]
        is_bot: bool,
        content: String,
        #[serde(default)]
        attachments: Vec<Attachment>,
    },
    MenuSelect {
        channel_id: String,
        user_id: String,
        #[serde(default)]
        is_bot: bool,
        custom_id: String,
        value: String,
    },
}

/// A filtered, decoded inbound item ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text {
        content: String,
        attachments: Vec<Attachment>,
    },
    Menu(MenuSelection),
}

/// Filter and decode one gateway event. Returns `None` for events the bot
/// ignores entirely: bot authors, channels outside the allow-list, and menu
/// selections from unknown controls.
pub fn decode(event: GatewayEvent, allowed_channels: &[String]) -> Option<(ConversationKey, Inbound)> {
    let channel_allowed = |channel_id: &str| {
        allowed_channels.is_empty() || allowed_channels.iter().any(|c| c == channel_id)
    };

    match event {
        GatewayEvent::Message {
            channel_id,
            user_id,
            is_bot,
            content,
            attachments,
        } => {
            if is_bot || !channel_allowed(&channel_id) {
                return None;
            }
            Some((
                ConversationKey::new(channel_id, user_id),
                Inbound::Text {
                    content,
                    attachments,
                },
            ))
        }
        GatewayEvent::MenuSelect {
            channel_id,
            user_id,
            is_bot,
            custom_id,
            value,
        } => {
            if is_bot || !channel_allowed(&channel_id) {
                return None;
            }
            let Some(selection) = MenuSelection::from_custom_id(&custom_id, &value) else {
                tracing::debug!(%custom_id, %value, "Dropping unrecognized menu selection");
                return None;
            };
            Some((ConversationKey::new(channel_id, user_id), Inbound::Menu(selection)))
        }
    }
}

/// Exact-match wake phrase check: ASCII space, ideographic space, or no
/// separator between the wake word and the command, after trimming.
fn is_wake_phrase(content: &str, command: &str) -> bool {
    let c = content.trim();
    c == format!("{WAKE_WORD} {command}")
        || c == format!("{WAKE_WORD}\u{3000}{command}")
        || c == format!("{WAKE_WORD}{command}")
}

/// Match a message against the trigger surface. The receipt trigger requires
/// at least one attachment; its first attachment is the one ingested.
pub fn match_trigger(content: &str, attachments: &[Attachment]) -> Option<Trigger> {
    if is_wake_phrase(content, "割り勘") {
        return Some(Trigger::Split);
    }
    if is_wake_phrase(content, "家計簿つけて") {
        return Some(Trigger::Manual);
    }
    if is_wake_phrase(content, "レシート") {
        if let Some(first) = attachments.first() {
            return Some(Trigger::Receipt {
                image_url: first.url.clone(),
                filename: first.filename.clone(),
            });
        }
    }
    None
}

/// Gateway I/O error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway returned status {status}")]
    Status { status: u16 },
}

// Outbound wire format for the send webhook.

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    channel_id: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    menu: Option<MenuBody>,
}

#[derive(Debug, Serialize)]
struct MenuBody {
    custom_id: &'static str,
    placeholder: &'static str,
    options: Vec<MenuOptionBody>,
}

#[derive(Debug, Serialize)]
struct MenuOptionBody {
    label: String,
    value: String,
}

/// HTTP client for the gateway's outbound surface.
pub struct GatewayClient {
    http: Client,
    send_url: String,
    token: Option<String>,
}

impl GatewayClient {
    pub fn new(send_url: String, token: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            send_url,
            token,
        }
    }

    async fn post_message(&self, body: &SendMessageBody<'_>) -> Result<(), GatewayError> {
        let mut request = self.http.post(&self.send_url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl crate::runtime::Messenger for GatewayClient {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), GatewayError> {
        self.post_message(&SendMessageBody {
            channel_id,
            content: text,
            menu: None,
        })
        .await
    }

    async fn send_menu(&self, channel_id: &str, menu: MenuPrompt) -> Result<(), GatewayError> {
        let options = menu
            .options()
            .into_iter()
            .map(|o| MenuOptionBody {
                label: o.label,
                value: o.value,
            })
            .collect();
        self.post_message(&SendMessageBody {
            channel_id,
            content: menu.content(),
            menu: Some(MenuBody {
                custom_id: menu.custom_id(),
                placeholder: menu.placeholder(),
                options,
            }),
        })
        .await
    }

    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
