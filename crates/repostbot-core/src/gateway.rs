//! Boundary between the engine and a messaging platform.
//!
//! Transports convert platform updates into [`InboundMessage`] values and
//! implement [`ChatGateway`] for the outbound side (send, delete, download).

use crate::group::{GroupId, MessageId};
use crate::keys::MessageContent;
use async_trait::async_trait;
use thiserror::Error;

/// Telegram's placeholder user for messages sent by anonymous group admins.
pub const ANONYMOUS_ADMIN_ID: i64 = 1_087_968_824;
/// Telegram's placeholder user for messages sent on behalf of a channel.
pub const CHANNEL_BOT_ID: i64 = 136_817_688;

/// Errors returned by outbound platform calls
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Request failed (network, API error)
    #[error("Request failed: {0}")]
    Request(String),
    /// The bot lacks permission for the action
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// Target message or file no longer exists
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Reply keyboard attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// One-time, selective keyboard offering the given choices in a row
    Choices(Vec<String>),
    /// Remove a previously shown keyboard
    Remove,
}

/// A message the bot wants to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Message text (plain, no markup)
    pub text: String,
    /// Message to reply to, if any
    pub reply_to: Option<MessageId>,
    /// Optional reply keyboard
    pub keyboard: Option<ReplyKeyboard>,
}

impl OutboundMessage {
    /// Message replying to `message_id`.
    #[must_use]
    pub fn reply(text: impl Into<String>, message_id: MessageId) -> Self {
        Self {
            text: text.into(),
            reply_to: Some(message_id),
            keyboard: None,
        }
    }

    /// Attaches a reply keyboard.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Outbound calls the engine needs from a messaging platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Download the bytes of a file by its platform file id
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, GatewayError>;
    /// Send a message to a chat
    async fn send(&self, chat: GroupId, message: OutboundMessage) -> Result<(), GatewayError>;
    /// Show a "typing" indicator in a chat
    async fn send_typing(&self, chat: GroupId) -> Result<(), GatewayError>;
    /// Delete a message from a chat
    async fn delete_message(&self, chat: GroupId, message_id: MessageId)
        -> Result<(), GatewayError>;
    /// Whether `user_id` is an administrator of `chat`
    async fn is_group_admin(&self, chat: GroupId, user_id: i64) -> Result<bool, GatewayError>;
}

/// Kind of chat a message arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-to-one chat with the bot
    Private,
    /// Group or supergroup
    Group,
    /// Channel
    Channel,
}

/// Who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderKind {
    /// Regular user
    User,
    /// Anonymous group administrator
    AnonymousAdmin,
    /// A channel posting on its own behalf
    Channel,
}

/// Message sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// User or chat id used for flood tracking and admin checks
    pub id: i64,
    /// Display name (first name, or chat title for chats)
    pub name: String,
    /// Sender classification
    pub kind: SenderKind,
}

impl Sender {
    /// Regular user sender.
    #[must_use]
    pub fn user(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: SenderKind::User,
        }
    }
}

/// Platform-neutral view of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat the message was posted in
    pub chat_id: GroupId,
    /// Chat classification
    pub chat_kind: ChatKind,
    /// Message id within the chat
    pub message_id: MessageId,
    /// Sender
    pub sender: Sender,
    /// Text (or caption) of the message
    pub text: Option<String>,
    /// Repostable content references
    pub content: MessageContent,
    /// Title of the channel this message was forwarded from, if any
    pub forwarded_from_channel: Option<String>,
    /// Message this one replies to
    pub reply_to: Option<Box<InboundMessage>>,
}

impl InboundMessage {
    /// Whether the message was posted in a private chat.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.chat_kind == ChatKind::Private
    }

    /// Name to address in callouts; channel content uses the channel title.
    #[must_use]
    pub fn callout_name(&self) -> &str {
        self.forwarded_from_channel
            .as_deref()
            .unwrap_or(&self.sender.name)
    }
}
