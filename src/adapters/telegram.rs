//! Telegram Bot API adapter — long-polling ingestion plus outbound send.
//!
//! Polls `getUpdates` with exponential backoff on transient failure and a
//! fatal stop on authentication rejection. Each update is normalized into
//! a canonical [`MessageEvent`] — identity-encoding the sender and chat,
//! resolving reply/forward chains depth-capped — and forwarded to the bot
//! core. Outbound messages are rendered as MarkdownV2, split at the
//! platform limit and sent strictly in order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::command::ResolutionError;
use crate::identity::IdentityCodec;
use crate::model::attachment::Attachment;
use crate::model::events::{ChatEvent, MessageEvent};
use crate::model::{
    Chat, Conversation, ConversationKind, Gender, Guild, PlatformKind, User, UserProfile,
};
use crate::split::{plan_send_operations, SendOperation};
use crate::text::render::TextRenderer;
use crate::text::TextNode;

use super::{read_lock, write_lock, Api, ConnectionState, EventSink, MessageOptions, MAX_RESOLVE_DEPTH};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Telegram adapter configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,
    /// Bot username (without `@`).
    pub username: String,
    /// Instance descriptor used in opaque ids.
    pub descriptor: String,
    /// Long-poll timeout for `getUpdates`, in seconds.
    pub poll_timeout_seconds: u32,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Telegram adapter errors.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// The Bot API returned an error response.
    #[error("Telegram API error: {0}")]
    Api(String),
    /// The Bot API rejected our token. Fatal: the adapter stops.
    #[error("Telegram authentication rejected: {0}")]
    Auth(String),
    /// The canonical event channel was closed by the bot core.
    #[error("event channel closed")]
    ChannelClosed,
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// JSON deserialization failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// An attachment kind this platform cannot deliver.
    #[error("unsupported attachment for Telegram: {0}")]
    UnsupportedAttachment(&'static str),
}

// ---------------------------------------------------------------------------
// Bot API wire types (minimal subset)
// ---------------------------------------------------------------------------

/// Generic Bot API response envelope.
#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// `Update` object.
#[derive(Debug, Clone, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

/// `Message` object (subset of fields we use).
#[derive(Debug, Clone, Deserialize)]
struct TgMessage {
    message_id: i64,
    date: Option<i64>,
    from: Option<TgUser>,
    chat: TgChat,
    text: Option<String>,
    caption: Option<String>,
    document: Option<TgDocument>,
    forward_from: Option<TgUser>,
    forward_from_chat: Option<TgChat>,
    forward_from_message_id: Option<i64>,
    reply_to_message: Option<Box<TgMessage>>,
}

/// `User` object.
#[derive(Debug, Clone, Deserialize)]
struct TgUser {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    #[serde(default)]
    is_bot: bool,
}

/// `Chat` object.
#[derive(Debug, Clone, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    chat_type: String,
    title: Option<String>,
}

/// `Document` object.
#[derive(Debug, Clone, Deserialize)]
struct TgDocument {
    file_id: String,
    file_name: Option<String>,
    file_size: Option<u64>,
    mime_type: Option<String>,
}

/// Whether a native chat type denotes a group conversation.
fn is_chat_type(chat_type: &str) -> bool {
    matches!(chat_type, "group" | "supergroup")
}

// ---------------------------------------------------------------------------
// Canonical entities
// ---------------------------------------------------------------------------

/// A Telegram user, cached per adapter and updated in place.
#[derive(Debug)]
pub struct TelegramUser {
    native_id: i64,
    uid: String,
    is_bot: bool,
    profile: RwLock<UserProfile>,
}

impl TelegramUser {
    fn new(api_user: &TgUser, codec: &IdentityCodec) -> Self {
        Self {
            native_id: api_user.id,
            uid: codec.encode_user(api_user.id),
            is_bot: api_user.is_bot,
            profile: RwLock::new(profile_from(api_user)),
        }
    }

    /// Platform-native user id.
    pub fn native_id(&self) -> i64 {
        self.native_id
    }
}

fn profile_from(api_user: &TgUser) -> UserProfile {
    UserProfile {
        nickname: api_user.username.clone(),
        first_name: api_user.first_name.clone(),
        last_name: api_user.last_name.clone(),
        gender: if api_user.is_bot {
            Gender::Bot
        } else {
            Gender::Unspecified
        },
        profile_url: api_user
            .username
            .as_ref()
            .map(|username| format!("https://t.me/{username}"))
            .unwrap_or_default(),
    }
}

impl Conversation for TelegramUser {
    fn target_id(&self) -> String {
        self.native_id.to_string()
    }
    fn kind(&self) -> ConversationKind {
        ConversationKind::User
    }
}

impl User for TelegramUser {
    fn uid(&self) -> String {
        self.uid.clone()
    }
    fn profile(&self) -> UserProfile {
        read_lock(&self.profile).clone()
    }
    fn is_bot(&self) -> bool {
        self.is_bot
    }
}

/// A Telegram group chat, cached per adapter and updated in place.
#[derive(Debug)]
pub struct TelegramChat {
    native_id: i64,
    cid: String,
    title: RwLock<String>,
}

impl TelegramChat {
    fn new(api_chat: &TgChat, codec: &IdentityCodec) -> Self {
        Self {
            native_id: api_chat.id,
            // Native group ids are negative; the opaque form stays positive.
            cid: codec.encode_chat(api_chat.id.saturating_neg()),
            title: RwLock::new(api_chat.title.clone().unwrap_or_default()),
        }
    }

    /// Platform-native chat id.
    pub fn native_id(&self) -> i64 {
        self.native_id
    }
}

impl Conversation for TelegramChat {
    fn target_id(&self) -> String {
        self.native_id.to_string()
    }
    fn kind(&self) -> ConversationKind {
        ConversationKind::Chat
    }
}

impl Chat for TelegramChat {
    fn cid(&self) -> String {
        self.cid.clone()
    }
    fn title(&self) -> String {
        read_lock(&self.title).clone()
    }
    fn members(&self) -> Vec<Arc<dyn User>> {
        Vec::new()
    }
    fn admins(&self) -> Vec<Arc<dyn User>> {
        Vec::new()
    }
    fn guild(&self) -> Option<Guild> {
        None
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// MarkdownV2 metacharacters that must be backslash-escaped in literals.
const MARKDOWN_V2_META: &str = "_*[]()~`>#+-=|{}.!\\";

/// Renders canonical text as Telegram MarkdownV2.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelegramRenderer;

impl TextRenderer for TelegramRenderer {
    fn escape(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if MARKDOWN_V2_META.contains(c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
    fn bold(&self, child: String) -> String {
        format!("*{child}*")
    }
    fn underlined(&self, child: String) -> String {
        format!("__{child}__")
    }
    fn code(&self, child: String) -> String {
        format!("`{child}`")
    }
    fn mention(&self, user: &dyn User) -> String {
        format!(
            "[{}](tg://user?id={})",
            self.escape(&user.display_name()),
            user.target_id()
        )
    }
    fn chat_ref(&self, chat: &dyn Chat) -> String {
        self.escape(&format!("<Chat {}>", chat.title()))
    }
    fn supports_hashtags(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Base URL for the Telegram Bot API.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Maximum outbound message length, in characters.
const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Initial backoff on poll failure, in milliseconds.
const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff on poll failure, in milliseconds.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Extra seconds added to the HTTP timeout beyond the long-poll timeout,
/// so the TCP socket stays open while Telegram holds the request.
const POLL_TIMEOUT_MARGIN_SECS: u64 = 10;

/// Per-adapter identity cache keyed by platform-native id.
///
/// Entities are mutated in place on repeated resolution, never replaced:
/// other components hold long-lived references to them.
#[derive(Debug, Default)]
struct IdentityCache {
    users: RwLock<HashMap<i64, Arc<TelegramUser>>>,
    chats: RwLock<HashMap<i64, Arc<TelegramChat>>>,
}

/// Telegram Bot API adapter.
///
/// Runs as a long-lived tokio task. The ingestion loop long-polls
/// `getUpdates`, normalizes updates into canonical events and forwards
/// them to the bot core via an mpsc channel, one at a time in arrival
/// order. A single unresolvable update is logged and dropped; the stream
/// keeps flowing.
pub struct TelegramAdapter {
    config: TelegramConfig,
    client: reqwest::Client,
    codec: IdentityCodec,
    cache: IdentityCache,
    state: RwLock<ConnectionState>,
}

impl TelegramAdapter {
    /// Create a new Telegram adapter.
    pub fn new(config: TelegramConfig) -> Self {
        let codec = IdentityCodec::new(PlatformKind::Telegram, &config.descriptor);
        Self {
            config,
            client: reqwest::Client::new(),
            codec,
            cache: IdentityCache::default(),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Current connection state of the ingestion loop.
    pub fn state(&self) -> ConnectionState {
        *read_lock(&self.state)
    }

    fn set_state(&self, state: ConnectionState) {
        *write_lock(&self.state) = state;
    }

    /// Run the ingestion loop until the event channel closes or the token
    /// is rejected.
    pub async fn run(self: Arc<Self>, sink: EventSink) -> Result<(), TelegramError> {
        info!(descriptor = %self.config.descriptor, "Telegram adapter starting");
        self.set_state(ConnectionState::Connecting);

        let mut offset: Option<i64> = None;
        let mut backoff_ms: u64 = INITIAL_BACKOFF_MS;

        loop {
            match self.poll_updates(offset).await {
                Ok(updates) => {
                    self.set_state(ConnectionState::Listening);
                    backoff_ms = INITIAL_BACKOFF_MS;

                    for update in updates {
                        // Advance the offset so this update is not re-polled.
                        offset = Some(update.update_id.saturating_add(1));
                        match self.handle_update(update, &sink).await {
                            Ok(()) => {}
                            Err(TelegramError::ChannelClosed) => {
                                info!("event channel closed, stopping Telegram adapter");
                                self.set_state(ConnectionState::Disconnected);
                                return Ok(());
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                Err(TelegramError::Auth(reason)) => {
                    error!(%reason, "authentication rejected, stopping Telegram adapter");
                    self.set_state(ConnectionState::Disconnected);
                    return Err(TelegramError::Auth(reason));
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "Telegram poll error, backing off");
                    self.set_state(ConnectionState::Reconnecting);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Bot API calls
    // ------------------------------------------------------------------

    async fn execute(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, TelegramError> {
        let url = format!(
            "{TELEGRAM_API_BASE}/bot{}/{method}",
            self.config.bot_token
        );
        let mut request = self.client.post(&url).json(&params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let resp = request.send().await?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TelegramError::Auth("bad bot token".to_string()));
        }
        let envelope: TgResponse<serde_json::Value> = resp.json().await?;
        if !envelope.ok {
            return Err(TelegramError::Api(
                envelope
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(envelope.result.unwrap_or(serde_json::Value::Null))
    }

    async fn poll_updates(&self, offset: Option<i64>) -> Result<Vec<TgUpdate>, TelegramError> {
        let mut params = serde_json::json!({
            "timeout": self.config.poll_timeout_seconds,
            "allowed_updates": [],
        });
        if let Some(offset) = offset {
            params["offset"] = serde_json::Value::from(offset);
        }

        let http_timeout = Duration::from_secs(
            u64::from(self.config.poll_timeout_seconds).saturating_add(POLL_TIMEOUT_MARGIN_SECS),
        );
        let result = self
            .execute("getUpdates", params, Some(http_timeout))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    // ------------------------------------------------------------------
    // Identity cache
    // ------------------------------------------------------------------

    /// Insert or refresh a user. Repeated resolution of the same native
    /// id returns the same entity, its profile updated in place.
    fn cache_user(&self, api_user: &TgUser) -> Arc<TelegramUser> {
        let mut users = write_lock(&self.cache.users);
        if let Some(existing) = users.get(&api_user.id) {
            *write_lock(&existing.profile) = profile_from(api_user);
            return existing.clone();
        }
        let user = Arc::new(TelegramUser::new(api_user, &self.codec));
        users.insert(api_user.id, user.clone());
        user
    }

    /// Insert or refresh a chat, keyed by its (negative) native id.
    fn cache_chat(&self, api_chat: &TgChat) -> Arc<TelegramChat> {
        let mut chats = write_lock(&self.cache.chats);
        if let Some(existing) = chats.get(&api_chat.id) {
            if let Some(title) = &api_chat.title {
                *write_lock(&existing.title) = title.clone();
            }
            return existing.clone();
        }
        let chat = Arc::new(TelegramChat::new(api_chat, &self.codec));
        chats.insert(api_chat.id, chat.clone());
        chat
    }

    /// Fetch an unknown user or chat via `getChat` and cache it. Positive
    /// ids are users, negative ids are group chats.
    async fn fetch_user_or_chat(&self, id: i64) -> Result<(), TelegramError> {
        let result = self
            .execute("getChat", serde_json::json!({ "chat_id": id }), None)
            .await?;
        if id > 0 {
            let api_user: TgUser = serde_json::from_value(result)?;
            self.cache_user(&api_user);
        } else {
            let api_chat: TgChat = serde_json::from_value(result)?;
            self.cache_chat(&api_chat);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Event normalization
    // ------------------------------------------------------------------

    async fn handle_update(
        &self,
        update: TgUpdate,
        sink: &EventSink,
    ) -> Result<(), TelegramError> {
        let Some(message) = update.message else {
            return Ok(());
        };
        match self.parse_message(&message, 0) {
            Ok(Some(event)) => {
                debug!(message_id = %event.message_id, "normalized Telegram update");
                if sink.send(ChatEvent::Message(event)).await.is_err() {
                    return Err(TelegramError::ChannelClosed);
                }
            }
            Ok(None) => {
                debug!(update_id = update.update_id, "skipping update without sender");
            }
            Err(e) => {
                // One bad event must not halt the stream.
                warn!(error = %e, update_id = update.update_id, "dropping unresolvable update");
            }
        }
        Ok(())
    }

    /// Normalize a native message, recursing into its reply chain.
    ///
    /// Returns `Ok(None)` for messages without a sender (channel posts).
    fn parse_message(
        &self,
        msg: &TgMessage,
        depth: usize,
    ) -> Result<Option<MessageEvent>, ResolutionError> {
        if depth > MAX_RESOLVE_DEPTH {
            return Err(ResolutionError::DepthExceeded {
                max: MAX_RESOLVE_DEPTH,
            });
        }
        let Some(from) = &msg.from else {
            return Ok(None);
        };
        let user = self.cache_user(from);
        let chat = if is_chat_type(&msg.chat.chat_type) {
            Some(self.cache_chat(&msg.chat))
        } else {
            None
        };

        let forwarded = self.parse_forwarded(msg);
        let reply_to = match &msg.reply_to_message {
            Some(reply) => self
                .parse_message(reply, depth.saturating_add(1))?
                .map(Box::new),
            None => None,
        };

        // A pure forward carries its text inside the forwarded entry.
        let text = if forwarded.is_empty() {
            msg.text
                .clone()
                .or_else(|| msg.caption.clone())
                .unwrap_or_default()
        } else {
            String::new()
        };

        Ok(Some(MessageEvent {
            platform: PlatformKind::Telegram,
            timestamp: message_timestamp(msg),
            user: user as Arc<dyn User>,
            chat: chat.map(|c| c as Arc<dyn Chat>),
            attachments: parse_attachments(msg),
            text,
            forwarded,
            message_id: msg.message_id.to_string(),
            reply_to,
        }))
    }

    /// Wrap a forwarded origin into a single nested event. Telegram
    /// reports at most one forward origin per message.
    fn parse_forwarded(&self, msg: &TgMessage) -> Vec<MessageEvent> {
        let Some(origin) = &msg.forward_from else {
            return Vec::new();
        };
        let user = self.cache_user(origin);
        let chat = msg
            .forward_from_chat
            .as_ref()
            .filter(|c| is_chat_type(&c.chat_type))
            .map(|c| self.cache_chat(c) as Arc<dyn Chat>);
        vec![MessageEvent {
            platform: PlatformKind::Telegram,
            timestamp: message_timestamp(msg),
            user: user as Arc<dyn User>,
            chat,
            attachments: Vec::new(),
            text: msg
                .text
                .clone()
                .or_else(|| msg.caption.clone())
                .unwrap_or_default(),
            forwarded: Vec::new(),
            message_id: msg
                .forward_from_message_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            reply_to: None,
        }]
    }

    // ------------------------------------------------------------------
    // Outbound send
    // ------------------------------------------------------------------

    async fn send_operation(
        &self,
        chat_id: &str,
        op: SendOperation,
        options: MessageOptions,
    ) -> Result<(), TelegramError> {
        match op.attachment {
            None => {
                if let Some(text) = op.text {
                    self.send_text(chat_id, &text, options).await?;
                }
                Ok(())
            }
            Some(Attachment::Location {
                latitude,
                longitude,
            }) => {
                // sendLocation has no caption; any paired text goes first.
                if let Some(text) = op.text {
                    self.send_text(chat_id, &text, options).await?;
                }
                self.execute(
                    "sendLocation",
                    serde_json::json!({
                        "chat_id": chat_id,
                        "latitude": latitude,
                        "longitude": longitude,
                        "disable_notification": options.silent,
                    }),
                    None,
                )
                .await?;
                Ok(())
            }
            Some(attachment) => match attachment.as_file() {
                Some(file) => match &file.data {
                    crate::model::attachment::DataHandle::Url(url) => {
                        let mut params = serde_json::json!({
                            "chat_id": chat_id,
                            "document": url.as_str(),
                            "disable_notification": options.silent,
                        });
                        if let Some(text) = op.text {
                            params["caption"] = serde_json::Value::from(text);
                        }
                        self.execute("sendDocument", params, None).await?;
                        Ok(())
                    }
                    crate::model::attachment::DataHandle::Bytes(_) => {
                        Err(TelegramError::UnsupportedAttachment("inline bytes"))
                    }
                },
                None => {
                    warn!("skipping platform-specific attachment on Telegram");
                    if let Some(text) = op.text {
                        self.send_text(chat_id, &text, options).await?;
                    }
                    Ok(())
                }
            },
        }
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        options: MessageOptions,
    ) -> Result<(), TelegramError> {
        self.execute(
            "sendMessage",
            serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "MarkdownV2",
                "disable_web_page_preview": options.no_link_preview,
                "disable_notification": options.silent,
            }),
            None,
        )
        .await?;
        debug!(chat_id, "sent Telegram message");
        Ok(())
    }
}

fn message_timestamp(msg: &TgMessage) -> DateTime<Utc> {
    msg.date
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

/// Wrap native attachments. Telegram payloads need a further `getFile`
/// round-trip to become fetchable, so they pass through as
/// platform-specific descriptors.
fn parse_attachments(msg: &TgMessage) -> Vec<Attachment> {
    let mut attachments = Vec::new();
    if let Some(document) = &msg.document {
        attachments.push(Attachment::PlatformSpecific(serde_json::json!({
            "kind": "document",
            "file_id": document.file_id,
            "file_name": document.file_name,
            "file_size": document.file_size,
            "mime_type": document.mime_type,
        })));
    }
    attachments
}

#[async_trait]
impl Api for TelegramAdapter {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Telegram
    }

    async fn send(
        &self,
        conversation: &dyn Conversation,
        text: &TextNode,
        attachments: Vec<Attachment>,
        options: MessageOptions,
    ) -> anyhow::Result<()> {
        let rendered = TelegramRenderer.render(text);
        let operations = plan_send_operations(&rendered, attachments, TELEGRAM_MAX_MESSAGE_LEN)?;
        let chat_id = conversation.target_id();
        for op in operations {
            // Strictly sequential: Telegram does not guarantee ordering
            // for concurrent sends.
            self.send_operation(&chat_id, op, options).await?;
        }
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Option<Arc<dyn User>> {
        let native = self.codec.decode_user(uid)?;
        let cached = read_lock(&self.cache.users).get(&native).cloned();
        if let Some(user) = cached {
            return Some(user);
        }
        if let Err(e) = self.fetch_user_or_chat(native).await {
            warn!(error = %e, native, "failed to fetch Telegram user");
            return None;
        }
        let user = read_lock(&self.cache.users).get(&native).cloned()?;
        Some(user)
    }

    async fn get_chat(&self, cid: &str) -> Option<Arc<dyn Chat>> {
        // The opaque form carries the negated (positive) native id.
        let native = self.codec.decode_chat(cid)?.saturating_neg();
        let cached = read_lock(&self.cache.chats).get(&native).cloned();
        if let Some(chat) = cached {
            return Some(chat);
        }
        if let Err(e) = self.fetch_user_or_chat(native).await {
            warn!(error = %e, native, "failed to fetch Telegram chat");
            return None;
        }
        let chat = read_lock(&self.cache.chats).get(&native).cloned()?;
        Some(chat)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
