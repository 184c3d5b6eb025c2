//! Canonical events emitted by platform normalizers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::attachment::Attachment;
use super::{Chat, Conversation, Guild, PlatformKind, User};

/// A received message.
///
/// Constructed once per inbound native message by the platform's event
/// normalizer and immutable thereafter. Not persisted by this layer.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Platform the message arrived from.
    pub platform: PlatformKind,
    /// Arrival time.
    pub timestamp: DateTime<Utc>,
    /// Sending user.
    pub user: Arc<dyn User>,
    /// Chat the message arrived in, absent for private conversations.
    pub chat: Option<Arc<dyn Chat>>,
    /// Canonical attachments, in platform order.
    pub attachments: Vec<Attachment>,
    /// Raw message text. Empty for pure-forward messages.
    pub text: String,
    /// Forwarded messages, ascending by time.
    pub forwarded: Vec<MessageEvent>,
    /// Platform-native message id.
    pub message_id: String,
    /// The message this one replies to.
    pub reply_to: Option<Box<MessageEvent>>,
}

impl MessageEvent {
    /// Resolved destination: the chat when present, else the sender.
    pub fn conversation(&self) -> Arc<dyn Conversation> {
        match &self.chat {
            Some(chat) => chat.clone(),
            None => self.user.clone(),
        }
    }

    /// The reply target if present, else the most recent forwarded message.
    pub fn maybe_forwarded(&self) -> Option<&MessageEvent> {
        if let Some(reply) = &self.reply_to {
            return Some(reply);
        }
        self.forwarded.last()
    }
}

/// Why a user joined a chat or guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReason {
    /// Added by another member.
    Invited,
    /// Joined through an invite link.
    InviteLink,
    /// Rejoined after leaving.
    Returned,
}

/// Why a user left a chat or guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Left on their own.
    Left,
    /// Removed by an admin.
    Kicked,
}

/// What kind of typing activity started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingKind {
    /// Composing a text message.
    Text,
}

/// A user joined a chat or guild.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    /// Platform the event arrived from.
    pub platform: PlatformKind,
    /// The user who joined.
    pub user: Arc<dyn User>,
    /// The member who invited them, when known.
    pub initiator: Option<Arc<dyn User>>,
    /// Join reason.
    pub reason: JoinReason,
    /// The chat joined, when the platform scopes joins to chats.
    pub chat: Option<Arc<dyn Chat>>,
    /// The guild joined, on guild platforms.
    pub guild: Option<Guild>,
}

/// A user left a chat or guild.
#[derive(Debug, Clone)]
pub struct LeaveEvent {
    /// Platform the event arrived from.
    pub platform: PlatformKind,
    /// The user who left.
    pub user: Arc<dyn User>,
    /// The admin who removed them, for kicks.
    pub initiator: Option<Arc<dyn User>>,
    /// Leave reason.
    pub reason: LeaveReason,
    /// The chat left, when the platform scopes leaves to chats.
    pub chat: Option<Arc<dyn Chat>>,
    /// The guild left, on guild platforms.
    pub guild: Option<Guild>,
}

/// A user started typing.
#[derive(Debug, Clone)]
pub struct TypingEvent {
    /// Platform the event arrived from.
    pub platform: PlatformKind,
    /// The typing user.
    pub user: Arc<dyn User>,
    /// Where they are typing, absent for private conversations.
    pub chat: Option<Arc<dyn Chat>>,
    /// Activity kind.
    pub kind: TypingKind,
}

/// The canonical event stream consumed by the bot core.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A message was received.
    Message(MessageEvent),
    /// A user joined a chat or guild.
    UserJoined(JoinEvent),
    /// A user left a chat or guild.
    UserLeft(LeaveEvent),
    /// A user started typing.
    Typing(TypingEvent),
}
