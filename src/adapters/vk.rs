//! VK adapter — community long-poll normalization, mention parsing and
//! outbound send.
//!
//! VK uses one id space for users (positive) and communities (negative);
//! group chats live at peer ids offset by [`CHAT_PEER_OFFSET`]. The
//! long-poll transport lives behind [`VkClient`]; the adapter polls it in
//! a backoff loop, mirrors resolved identities in a per-adapter cache and
//! emits canonical events in arrival order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::command::{
    ArgumentType, ParseContext, ParseError, ResolutionError, StringReader, Suggestions,
    SuggestionsBuilder,
};
use crate::identity::IdentityCodec;
use crate::model::attachment::{mime_from_name, Attachment, DataHandle, FileData};
use crate::model::events::{
    ChatEvent, JoinEvent, JoinReason, LeaveEvent, LeaveReason, MessageEvent, TypingEvent,
    TypingKind,
};
use crate::model::{
    Chat, Conversation, ConversationKind, Gender, Guild, PlatformKind, User, UserProfile,
};
use crate::split::{plan_send_operations, SendOperation};
use crate::text::render::{prefix_words, TextRenderer};
use crate::text::TextNode;

use super::{read_lock, write_lock, Api, ConnectionState, EventSink, MessageOptions, MAX_RESOLVE_DEPTH};

/// Group-chat peer ids start here; below are direct-message peers.
const CHAT_PEER_OFFSET: i64 = 2_000_000_000;

/// Maximum outbound message length, in characters.
const VK_MAX_MESSAGE_LEN: usize = 4096;

/// First retry delay after a transient poll failure.
const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Retry delay ceiling.
const MAX_BACKOFF_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// Configuration & errors
// ---------------------------------------------------------------------------

/// VK adapter configuration.
#[derive(Debug, Clone)]
pub struct VkConfig {
    /// Instance descriptor used in opaque ids.
    pub descriptor: String,
    /// Community (group) id the bot runs as.
    pub group_id: i64,
}

/// VK adapter errors.
#[derive(Debug, Error)]
pub enum VkError {
    /// The VK API returned an error payload.
    #[error("VK API error {code}: {message}")]
    Api {
        /// Numeric VK error code.
        code: i64,
        /// Error description from the API.
        message: String,
    },
    /// The access token was rejected. Fatal for this adapter.
    #[error("VK authentication rejected: {0}")]
    Auth(String),
    /// The canonical event channel was closed by the bot core.
    #[error("event channel closed")]
    ChannelClosed,
    /// A destination handle that is not a VK peer.
    #[error("bad peer id: {0}")]
    BadPeer(String),
    /// Transport-level failure in the long-poll client.
    #[error("VK transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// Native API types
// ---------------------------------------------------------------------------

/// A native user payload from `users.get`.
#[derive(Debug, Clone, Deserialize)]
pub struct VkApiUser {
    /// Positive native id.
    pub id: i64,
    /// Short address (vk.com/<domain>).
    pub domain: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Sex code: 1 female, 2 male, 0 unspecified.
    pub sex: Option<i64>,
    /// Largest available avatar URL.
    pub photo_max: Option<String>,
}

/// A native community payload from `groups.getById`.
#[derive(Debug, Clone, Deserialize)]
pub struct VkApiGroup {
    /// Positive native id (users see it negated).
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Short address.
    pub screen_name: Option<String>,
}

/// A native conversation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct VkChatInfo {
    /// Local chat id (peer id minus [`CHAT_PEER_OFFSET`]).
    pub id: i64,
    /// Chat title.
    pub title: String,
    /// Member users, when the token can see them.
    #[serde(default)]
    pub members: Vec<VkApiUser>,
}

/// A native message payload.
#[derive(Debug, Clone, Deserialize)]
pub struct VkMessage {
    /// Message id within the peer.
    pub id: i64,
    /// Destination peer.
    pub peer_id: i64,
    /// Author id: positive user, negative community.
    pub from_id: i64,
    /// Unix timestamp.
    pub date: i64,
    /// Raw text.
    #[serde(default)]
    pub text: String,
    /// Raw attachment descriptors.
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    /// Forwarded messages, oldest first.
    #[serde(default)]
    pub fwd_messages: Vec<VkMessage>,
    /// The message this one replies to.
    pub reply_message: Option<Box<VkMessage>>,
}

/// Events delivered by the long-poll transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VkEvent {
    /// A message was posted.
    MessageNew {
        /// The message payload.
        message: VkMessage,
    },
    /// A user joined a group chat.
    ChatUserJoined {
        /// Local chat id.
        chat_id: i64,
        /// The joining user.
        user_id: i64,
        /// Who invited them; absent for invite links.
        invited_by: Option<i64>,
    },
    /// A user left a group chat.
    ChatUserLeft {
        /// Local chat id.
        chat_id: i64,
        /// The leaving user.
        user_id: i64,
        /// Who removed them; absent when they left on their own.
        removed_by: Option<i64>,
    },
    /// A user started typing.
    Typing {
        /// The typing user.
        from_id: i64,
        /// Peer the typing happens in; absent for direct messages.
        peer_id: Option<i64>,
    },
}

/// Long-poll and REST operations consumed by the adapter. The concrete
/// transport (server negotiation, token rotation, uploads) lives outside
/// the core.
#[async_trait]
pub trait VkClient: Send + Sync {
    /// Block until the next batch of events arrives.
    async fn poll(&self) -> Result<Vec<VkEvent>, VkError>;

    /// Fetch a user by positive native id. `Ok(None)` means no such user.
    async fn get_user(&self, id: i64) -> Result<Option<VkApiUser>, VkError>;

    /// Fetch a community by positive native id.
    async fn get_group(&self, id: i64) -> Result<Option<VkApiGroup>, VkError>;

    /// Fetch a group chat by local chat id.
    async fn get_chat(&self, chat_id: i64) -> Result<Option<VkChatInfo>, VkError>;

    /// Deliver one send operation to a peer.
    async fn send_message(
        &self,
        peer_id: i64,
        text: Option<&str>,
        attachment: Option<&Attachment>,
    ) -> Result<(), VkError>;
}

// ---------------------------------------------------------------------------
// Canonical entities
// ---------------------------------------------------------------------------

/// A VK user or community, cached per adapter and updated in place.
///
/// Communities carry the negated native id and the bot flag.
#[derive(Debug)]
pub struct VkUser {
    native_id: i64,
    uid: String,
    is_bot: bool,
    profile: RwLock<UserProfile>,
}

fn user_profile_from(api_user: &VkApiUser) -> UserProfile {
    UserProfile {
        nickname: api_user.domain.clone(),
        first_name: api_user.first_name.clone(),
        last_name: api_user.last_name.clone(),
        gender: match api_user.sex {
            Some(1) => Gender::Woman,
            Some(2) => Gender::Man,
            _ => Gender::Other,
        },
        profile_url: match &api_user.domain {
            Some(domain) => format!("https://vk.com/{domain}"),
            None => format!("https://vk.com/id{}", api_user.id),
        },
    }
}

fn group_profile_from(api_group: &VkApiGroup) -> UserProfile {
    UserProfile {
        nickname: api_group.screen_name.clone(),
        first_name: Some(api_group.name.clone()),
        last_name: None,
        gender: Gender::Bot,
        profile_url: match &api_group.screen_name {
            Some(screen) => format!("https://vk.com/{screen}"),
            None => format!("https://vk.com/club{}", api_group.id),
        },
    }
}

impl VkUser {
    /// Platform-native id: positive user, negative community.
    pub fn native_id(&self) -> i64 {
        self.native_id
    }
}

impl Conversation for VkUser {
    fn target_id(&self) -> String {
        self.native_id.to_string()
    }
    fn kind(&self) -> ConversationKind {
        ConversationKind::User
    }
}

impl User for VkUser {
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

/// A VK group chat, cached per adapter and updated in place.
#[derive(Debug)]
pub struct VkChat {
    native_id: i64,
    cid: String,
    title: RwLock<String>,
    members: RwLock<Vec<Arc<dyn User>>>,
}

impl Conversation for VkChat {
    fn target_id(&self) -> String {
        self.native_id.to_string()
    }
    fn kind(&self) -> ConversationKind {
        ConversationKind::Chat
    }
}

impl Chat for VkChat {
    fn cid(&self) -> String {
        self.cid.clone()
    }
    fn title(&self) -> String {
        read_lock(&self.title).clone()
    }
    fn members(&self) -> Vec<Arc<dyn User>> {
        read_lock(&self.members).clone()
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

/// Renders canonical text for VK, which has no inline formatting: styled
/// nodes render their children bare, mentions use the `[id<N>|name]`
/// link syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct VkRenderer;

impl TextRenderer for VkRenderer {
    fn escape(&self, text: &str) -> String {
        text.to_string()
    }
    fn bold(&self, child: String) -> String {
        child
    }
    fn underlined(&self, child: String) -> String {
        child
    }
    fn code(&self, child: String) -> String {
        child
    }
    fn mention(&self, user: &dyn User) -> String {
        let native = user.target_id();
        match native.strip_prefix('-') {
            Some(club) => format!("[club{club}|{}]", user.display_name()),
            None => format!("[id{native}|{}]", user.display_name()),
        }
    }
    fn chat_ref(&self, chat: &dyn Chat) -> String {
        chat.title()
    }
    fn supports_hashtags(&self) -> bool {
        true
    }
    fn hashtag(&self, child: String, _hide_on_no_support: bool) -> String {
        prefix_words(&child)
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Per-adapter identity cache. Users and communities share the signed
/// native id space; chats are keyed by local chat id.
#[derive(Debug, Default)]
struct IdentityCache {
    users: RwLock<HashMap<i64, Arc<VkUser>>>,
    chats: RwLock<HashMap<i64, Arc<VkChat>>>,
}

/// VK adapter.
///
/// Polls the long-poll transport with exponential backoff on transient
/// failure and a fatal stop on authentication rejection. Inbound events
/// are normalized one at a time in arrival order.
pub struct VkAdapter {
    config: VkConfig,
    client: Arc<dyn VkClient>,
    codec: IdentityCodec,
    cache: IdentityCache,
    state: RwLock<ConnectionState>,
}

impl VkAdapter {
    /// Create a new VK adapter over the given transport.
    pub fn new(config: VkConfig, client: Arc<dyn VkClient>) -> Self {
        let codec = IdentityCodec::new(PlatformKind::Vk, &config.descriptor);
        Self {
            config,
            client,
            codec,
            cache: IdentityCache::default(),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *read_lock(&self.state)
    }

    fn set_state(&self, state: ConnectionState) {
        *write_lock(&self.state) = state;
    }

    /// Run the long-poll loop until the event channel closes or the token
    /// is rejected.
    pub async fn run(self: Arc<Self>, sink: EventSink) -> Result<(), VkError> {
        info!(
            descriptor = %self.config.descriptor,
            group_id = self.config.group_id,
            "VK adapter starting"
        );
        self.set_state(ConnectionState::Connecting);
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match self.client.poll().await {
                Ok(events) => {
                    if self.state() != ConnectionState::Listening {
                        info!("VK long poll established");
                        self.set_state(ConnectionState::Listening);
                    }
                    backoff_ms = INITIAL_BACKOFF_MS;
                    for event in events {
                        match self.handle_event(event, &sink).await {
                            Ok(()) => {}
                            Err(VkError::ChannelClosed) => {
                                info!("event channel closed, stopping VK adapter");
                                self.set_state(ConnectionState::Disconnected);
                                return Ok(());
                            }
                            Err(e) => {
                                // One bad event must not halt the stream.
                                warn!(error = %e, "dropping unresolvable VK event");
                            }
                        }
                    }
                }
                Err(e @ VkError::Auth(_)) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "VK poll failed, backing off");
                    self.set_state(ConnectionState::Reconnecting);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                }
            }
        }
    }

    async fn handle_event(&self, event: VkEvent, sink: &EventSink) -> Result<(), VkError> {
        let canonical = match event {
            VkEvent::MessageNew { message } => match self.normalize_message(&message, 0).await {
                Ok(event) => ChatEvent::Message(event),
                Err(e) => {
                    warn!(error = %e, message_id = message.id, "dropping message");
                    return Ok(());
                }
            },
            VkEvent::ChatUserJoined {
                chat_id,
                user_id,
                invited_by,
            } => {
                let user = self.require_user(user_id).await?;
                let initiator = match invited_by {
                    Some(inviter) if inviter != user_id => Some(self.require_user(inviter).await?),
                    _ => None,
                };
                let reason = match invited_by {
                    Some(inviter) if inviter == user_id => JoinReason::Returned,
                    Some(_) => JoinReason::Invited,
                    None => JoinReason::InviteLink,
                };
                ChatEvent::UserJoined(JoinEvent {
                    platform: PlatformKind::Vk,
                    user,
                    initiator,
                    reason,
                    chat: self.resolve_chat_by_id(chat_id).await?,
                    guild: None,
                })
            }
            VkEvent::ChatUserLeft {
                chat_id,
                user_id,
                removed_by,
            } => {
                let user = self.require_user(user_id).await?;
                let initiator = match removed_by {
                    Some(remover) if remover != user_id => Some(self.require_user(remover).await?),
                    _ => None,
                };
                let reason = if initiator.is_some() {
                    LeaveReason::Kicked
                } else {
                    LeaveReason::Left
                };
                ChatEvent::UserLeft(LeaveEvent {
                    platform: PlatformKind::Vk,
                    user,
                    initiator,
                    reason,
                    chat: self.resolve_chat_by_id(chat_id).await?,
                    guild: None,
                })
            }
            VkEvent::Typing { from_id, peer_id } => {
                let chat = match peer_id {
                    Some(peer) => self.resolve_chat(peer).await?,
                    None => None,
                };
                ChatEvent::Typing(TypingEvent {
                    platform: PlatformKind::Vk,
                    user: self.require_user(from_id).await?,
                    chat,
                    kind: TypingKind::Text,
                })
            }
        };

        if sink.send(canonical).await.is_err() {
            return Err(VkError::ChannelClosed);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identity cache
    // ------------------------------------------------------------------

    /// Insert or refresh a user. Repeated resolution of the same native
    /// id returns the same entity, its profile updated in place.
    fn cache_user(&self, api_user: &VkApiUser) -> Arc<VkUser> {
        let mut users = write_lock(&self.cache.users);
        if let Some(existing) = users.get(&api_user.id) {
            *write_lock(&existing.profile) = user_profile_from(api_user);
            return existing.clone();
        }
        let user = Arc::new(VkUser {
            native_id: api_user.id,
            uid: self.codec.encode_user(api_user.id),
            is_bot: false,
            profile: RwLock::new(user_profile_from(api_user)),
        });
        users.insert(api_user.id, user.clone());
        user
    }

    /// Insert or refresh a community under its negated id.
    fn cache_group(&self, api_group: &VkApiGroup) -> Arc<VkUser> {
        let native = api_group.id.saturating_neg();
        let mut users = write_lock(&self.cache.users);
        if let Some(existing) = users.get(&native) {
            *write_lock(&existing.profile) = group_profile_from(api_group);
            return existing.clone();
        }
        let user = Arc::new(VkUser {
            native_id: native,
            uid: self.codec.encode_user(native),
            is_bot: true,
            profile: RwLock::new(group_profile_from(api_group)),
        });
        users.insert(native, user.clone());
        user
    }

    fn cache_chat(&self, info: &VkChatInfo) -> Arc<VkChat> {
        let members: Vec<Arc<dyn User>> = info
            .members
            .iter()
            .map(|u| self.cache_user(u) as Arc<dyn User>)
            .collect();
        let mut chats = write_lock(&self.cache.chats);
        if let Some(existing) = chats.get(&info.id) {
            *write_lock(&existing.title) = info.title.clone();
            if !members.is_empty() {
                *write_lock(&existing.members) = members;
            }
            return existing.clone();
        }
        let chat = Arc::new(VkChat {
            native_id: info.id,
            cid: self.codec.encode_chat(info.id),
            title: RwLock::new(info.title.clone()),
            members: RwLock::new(members),
        });
        chats.insert(info.id, chat.clone());
        chat
    }

    /// Resolve a signed native id to a user or community entity, fetching
    /// and caching on first sight.
    async fn resolve_user(&self, native: i64) -> Result<Option<Arc<dyn User>>, VkError> {
        let cached = read_lock(&self.cache.users).get(&native).cloned();
        if let Some(user) = cached {
            return Ok(Some(user as Arc<dyn User>));
        }
        if native < 0 {
            let Some(group) = self.client.get_group(native.saturating_neg()).await? else {
                return Ok(None);
            };
            return Ok(Some(self.cache_group(&group) as Arc<dyn User>));
        }
        let Some(api_user) = self.client.get_user(native).await? else {
            return Ok(None);
        };
        Ok(Some(self.cache_user(&api_user) as Arc<dyn User>))
    }

    async fn require_user(&self, native: i64) -> Result<Arc<dyn User>, VkError> {
        self.resolve_user(native)
            .await?
            .ok_or_else(|| VkError::Transport(format!("unresolvable user {native}")))
    }

    /// Resolve a peer id to a canonical chat. Direct-message peers
    /// resolve to `None`.
    async fn resolve_chat(&self, peer_id: i64) -> Result<Option<Arc<dyn Chat>>, VkError> {
        if peer_id < CHAT_PEER_OFFSET {
            return Ok(None);
        }
        self.resolve_chat_by_id(peer_id.saturating_sub(CHAT_PEER_OFFSET))
            .await
    }

    async fn resolve_chat_by_id(&self, chat_id: i64) -> Result<Option<Arc<dyn Chat>>, VkError> {
        let cached = read_lock(&self.cache.chats).get(&chat_id).cloned();
        if let Some(chat) = cached {
            return Ok(Some(chat as Arc<dyn Chat>));
        }
        let Some(info) = self.client.get_chat(chat_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.cache_chat(&info) as Arc<dyn Chat>))
    }

    // ------------------------------------------------------------------
    // Event normalization
    // ------------------------------------------------------------------

    /// Normalize a native message, recursing into its reply and forward
    /// chains.
    async fn normalize_message(
        &self,
        msg: &VkMessage,
        depth: usize,
    ) -> Result<MessageEvent, ResolutionError> {
        if depth > MAX_RESOLVE_DEPTH {
            return Err(ResolutionError::DepthExceeded {
                max: MAX_RESOLVE_DEPTH,
            });
        }
        let transport = |e: VkError| ResolutionError::Transport(e.to_string());
        let user = self.require_user(msg.from_id).await.map_err(transport)?;
        let chat = self.resolve_chat(msg.peer_id).await.map_err(transport)?;

        let mut forwarded = Vec::with_capacity(msg.fwd_messages.len());
        for fwd in &msg.fwd_messages {
            forwarded
                .push(Box::pin(self.normalize_message(fwd, depth.saturating_add(1))).await?);
        }
        let reply_to = match &msg.reply_message {
            Some(reply) => Some(Box::new(
                Box::pin(self.normalize_message(reply, depth.saturating_add(1))).await?,
            )),
            None => None,
        };

        Ok(MessageEvent {
            platform: PlatformKind::Vk,
            timestamp: message_timestamp(msg.date),
            user,
            chat,
            attachments: msg.attachments.iter().map(wrap_attachment).collect(),
            text: msg.text.clone(),
            forwarded,
            message_id: msg.id.to_string(),
            reply_to,
        })
    }

    // ------------------------------------------------------------------
    // Outbound send
    // ------------------------------------------------------------------

    async fn send_operation(&self, peer_id: i64, op: SendOperation) -> Result<(), VkError> {
        self.client
            .send_message(peer_id, op.text.as_deref(), op.attachment.as_ref())
            .await
    }
}

fn message_timestamp(date: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(date, 0).unwrap_or_else(Utc::now)
}

/// Wrap a raw attachment descriptor into the canonical variant.
///
/// Documents with a direct download URL become lazy file handles; every
/// other kind is carried through as the raw descriptor.
fn wrap_attachment(raw: &serde_json::Value) -> Attachment {
    if raw.get("type").and_then(serde_json::Value::as_str) == Some("doc") {
        if let Some(doc) = raw.get("doc") {
            let name = doc
                .get("title")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("document")
                .to_string();
            let url = doc
                .get("url")
                .and_then(serde_json::Value::as_str)
                .and_then(|u| Url::parse(u).ok());
            if let Some(url) = url {
                return Attachment::File(FileData {
                    size: doc.get("size").and_then(serde_json::Value::as_u64).unwrap_or(0),
                    mime: mime_from_name(&name).to_string(),
                    name,
                    data: DataHandle::Url(url),
                });
            }
        }
    }
    Attachment::PlatformSpecific(raw.clone())
}

#[async_trait]
impl Api for VkAdapter {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Vk
    }

    async fn send(
        &self,
        conversation: &dyn Conversation,
        text: &TextNode,
        attachments: Vec<Attachment>,
        _options: MessageOptions,
    ) -> anyhow::Result<()> {
        let target = conversation.target_id();
        let native: i64 = target.parse().map_err(|_| VkError::BadPeer(target.clone()))?;
        let peer_id = if conversation.is_chat() {
            native.saturating_add(CHAT_PEER_OFFSET)
        } else {
            native
        };
        let rendered = VkRenderer.render(text);
        let operations = plan_send_operations(&rendered, attachments, VK_MAX_MESSAGE_LEN)?;
        for op in operations {
            // Strictly sequential: a later operation must not overtake an
            // earlier one.
            self.send_operation(peer_id, op).await?;
        }
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Option<Arc<dyn User>> {
        let native = self.codec.decode_user(uid)?;
        match self.resolve_user(native).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, native, "failed to fetch VK user");
                None
            }
        }
    }

    async fn get_chat(&self, cid: &str) -> Option<Arc<dyn Chat>> {
        let native = self.codec.decode_chat(cid)?;
        match self.resolve_chat_by_id(native).await {
            Ok(chat) => chat,
            Err(e) => {
                warn!(error = %e, native, "failed to fetch VK chat");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mention argument type
// ---------------------------------------------------------------------------

/// Parse-time output of [`VkUserArgumentType`]: enough to resolve the
/// referent later without re-reading the token.
#[derive(Debug, Clone)]
pub struct ParsedVkUser {
    /// Whether the mention names a community rather than a person.
    pub is_bot: bool,
    /// Positive id as spelled in the token.
    pub id: i64,
    /// Reader snapshot at the token start, for diagnostics.
    pub snapshot: StringReader,
}

/// Recognizes VK mention tokens: `[id<N>|name]` for users,
/// `[club<N>|name]` for communities.
pub struct VkUserArgumentType {
    adapter: Arc<VkAdapter>,
}

impl VkUserArgumentType {
    /// Create a mention argument type resolving through `adapter`.
    pub fn new(adapter: Arc<VkAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ArgumentType for VkUserArgumentType {
    type Parsed = ParsedVkUser;
    type Value = Arc<dyn User>;

    fn parse(
        &self,
        _ctx: &ParseContext,
        reader: &mut StringReader,
    ) -> Result<Self::Parsed, ParseError> {
        const KIND: &str = "vk user mention";
        let start = reader.cursor();
        if reader.peek() != Ok('[') {
            return Err(ParseError::expected(KIND, reader, start));
        }
        // Structural mismatches below restore the cursor to `start`.
        if reader.skip().is_err() {
            return Err(ParseError::expected(KIND, reader, start));
        }
        let remaining = reader.remaining();
        let is_bot = if remaining.starts_with("id") {
            false
        } else if remaining.starts_with("club") {
            true
        } else {
            return Err(ParseError::expected(KIND, reader, start));
        };
        let prefix_len = if is_bot { 4 } else { 2 };
        if reader.skip_n(prefix_len).is_err() {
            return Err(ParseError::expected(KIND, reader, start));
        }
        let Ok(id) = reader.read_int() else {
            return Err(ParseError::expected(KIND, reader, start));
        };
        if reader.read() != Ok('|') {
            return Err(ParseError::expected(KIND, reader, start));
        }
        let Some(close) = reader.remaining().find(']') else {
            return Err(ParseError::expected(KIND, reader, start));
        };
        reader.set_cursor(
            reader
                .cursor()
                .saturating_add(close)
                .saturating_add(']'.len_utf8()),
        );

        let mut snapshot = reader.clone();
        snapshot.set_cursor(start);
        Ok(ParsedVkUser {
            is_bot,
            id,
            snapshot,
        })
    }

    async fn load(&self, parsed: Self::Parsed) -> Result<Self::Value, ResolutionError> {
        let native = if parsed.is_bot {
            parsed.id.saturating_neg()
        } else {
            parsed.id
        };
        match self.adapter.resolve_user(native).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ResolutionError::NoSuchUser {
                id: native.to_string(),
                snapshot: parsed.snapshot,
            }),
            Err(e) => Err(ResolutionError::Transport(e.to_string())),
        }
    }

    fn examples(&self, _ctx: &ParseContext) -> Vec<String> {
        vec![
            "[id78591039|Name]".to_string(),
            "[club188280200|@polychat]".to_string(),
        ]
    }

    fn list_suggestions(&self, _ctx: &ParseContext, builder: SuggestionsBuilder) -> Suggestions {
        let mut builder = builder;
        let users = read_lock(&self.adapter.cache.users);
        for user in users.values() {
            let spelling = VkRenderer.mention(user.as_ref());
            if spelling.starts_with(builder.partial()) {
                builder.suggest(spelling);
            }
        }
        drop(users);
        builder.build()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
