//! Platform adapters — one independent ingestion path per connection.
//!
//! Each adapter owns its identity cache and event loop; canonical events
//! flow to the bot core through an mpsc channel. Inbound events are
//! processed one at a time in arrival order (reply/forward resolution and
//! cache mutation are not safe under concurrent mutation from the same
//! source); outbound operations for a conversation are issued strictly
//! sequentially.

pub mod discord;
pub mod telegram;
pub mod vk;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::attachment::Attachment;
use crate::model::events::ChatEvent;
use crate::model::{Chat, Conversation, PlatformKind, User};
use crate::text::TextNode;

/// Connection lifecycle of an adapter's ingestion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, not trying.
    Disconnected,
    /// Establishing the initial connection.
    Connecting,
    /// Connected, translating native events.
    Listening,
    /// Lost the connection, backing off before retrying.
    Reconnecting,
}

/// Channel end into which adapters emit canonical events.
pub type EventSink = mpsc::Sender<ChatEvent>;

/// Outbound message options.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageOptions {
    /// Suppress platform notification sounds where supported.
    pub silent: bool,
    /// Disable link previews where supported.
    pub no_link_preview: bool,
}

/// The outbound-send and identity-lookup contract every platform adapter
/// implements for the bot core.
#[async_trait]
pub trait Api: Send + Sync {
    /// Which platform this adapter speaks.
    fn platform(&self) -> PlatformKind;

    /// Render, split and deliver a message to `conversation`, issuing the
    /// planned operations strictly in order.
    async fn send(
        &self,
        conversation: &dyn Conversation,
        text: &TextNode,
        attachments: Vec<Attachment>,
        options: MessageOptions,
    ) -> anyhow::Result<()>;

    /// Resolve an opaque user id minted by this adapter. `None` means the
    /// id belongs to another platform or instance ("not mine").
    async fn get_user(&self, uid: &str) -> Option<Arc<dyn User>>;

    /// Resolve an opaque chat id minted by this adapter. `None` means
    /// "not mine".
    async fn get_chat(&self, cid: &str) -> Option<Arc<dyn Chat>>;
}

/// Maximum reply/forward chain depth resolved per inbound message.
/// Exceeding it is a recoverable resolution error, not a crash.
pub(crate) const MAX_RESOLVE_DEPTH: usize = 16;

/// Read a lock, recovering the data from a poisoned writer panic.
pub(crate) fn read_lock<T>(lock: &std::sync::RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Write a lock, recovering the data from a poisoned writer panic.
pub(crate) fn write_lock<T>(lock: &std::sync::RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
