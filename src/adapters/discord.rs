//! Discord adapter — gateway-event normalization plus outbound send.
//!
//! Discord pushes events over a persistent gateway connection; the
//! transport itself lives behind [`DiscordClient`], and native events
//! arrive on an mpsc channel. Each event is normalized 1:1 into a
//! canonical [`ChatEvent`] in arrival order. Outbound messages are split
//! at the platform limit, with the trailing text chunk riding on the
//! first attachment upload.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::command::ResolutionError;
use crate::identity::IdentityCodec;
use crate::model::attachment::{mime_from_name, Attachment, DataHandle, FetchError, FileData};
use crate::model::events::{
    ChatEvent, JoinEvent, JoinReason, LeaveEvent, LeaveReason, MessageEvent, TypingEvent,
    TypingKind,
};
use crate::model::{
    Chat, Conversation, ConversationKind, Gender, Guild, PlatformKind, User, UserProfile,
};
use crate::split::{plan_send_operations, SendOperation};
use crate::text::render::TextRenderer;
use crate::text::TextNode;

use super::{read_lock, write_lock, Api, ConnectionState, EventSink, MessageOptions, MAX_RESOLVE_DEPTH};

/// Maximum outbound message length, in characters.
const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

// ---------------------------------------------------------------------------
// Configuration & errors
// ---------------------------------------------------------------------------

/// Discord adapter configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Instance descriptor used in opaque ids.
    pub descriptor: String,
}

/// Discord adapter errors.
#[derive(Debug, Error)]
pub enum DiscordError {
    /// The Discord API returned an error response.
    #[error("Discord API error: {0}")]
    Api(String),
    /// The token was rejected. Fatal for the connection.
    #[error("Discord authentication rejected: {0}")]
    Auth(String),
    /// The canonical event channel was closed by the bot core.
    #[error("event channel closed")]
    ChannelClosed,
    /// A destination handle that is not a channel id.
    #[error("bad channel id: {0}")]
    BadChannel(String),
    /// Attachment payload fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// An attachment kind this platform cannot deliver.
    #[error("unsupported attachment for Discord: {0}")]
    UnsupportedAttachment(&'static str),
}

// ---------------------------------------------------------------------------
// Native gateway/REST types
// ---------------------------------------------------------------------------

/// A native user payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DsUser {
    /// Snowflake id.
    pub id: i64,
    /// Account name.
    pub username: Option<String>,
    /// Whether the account is a bot.
    #[serde(default)]
    pub bot: bool,
}

/// A native message payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DsMessage {
    /// Snowflake id.
    pub id: i64,
    /// Channel the message was posted in.
    pub channel_id: i64,
    /// Message author.
    pub author: DsUser,
    /// Raw text content.
    pub content: String,
    /// Uploaded attachments.
    #[serde(default)]
    pub attachments: Vec<DsAttachment>,
    /// The message this one replies to.
    pub referenced_message: Option<Box<DsMessage>>,
}

/// A native attachment payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DsAttachment {
    /// File name.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Download URL.
    pub url: String,
    /// MIME type, when Discord reports one.
    pub content_type: Option<String>,
}

/// A native channel payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DsChannel {
    /// Snowflake id.
    pub id: i64,
    /// Channel kind: `"dm"` or `"text"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Channel name, absent for DMs.
    pub name: Option<String>,
    /// Owning guild, absent for DMs.
    pub guild_id: Option<i64>,
    /// DM recipients.
    #[serde(default)]
    pub recipients: Vec<DsUser>,
}

/// Native events pushed by the gateway transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The gateway session is established.
    Ready,
    /// A message was posted.
    MessageCreate {
        /// The message payload.
        message: DsMessage,
    },
    /// A member joined a guild.
    GuildMemberAdd {
        /// Guild snowflake.
        guild_id: i64,
        /// The joining user.
        user: DsUser,
    },
    /// A member left a guild.
    GuildMemberRemove {
        /// Guild snowflake.
        guild_id: i64,
        /// The leaving user.
        user: DsUser,
    },
    /// A user started typing.
    TypingStart {
        /// Channel snowflake.
        channel_id: i64,
        /// The typing user.
        user: DsUser,
    },
    /// The gateway connection dropped; the transport is reconnecting.
    Closed {
        /// Human-readable reason, if available.
        reason: Option<String>,
    },
}

/// An attachment payload ready for upload.
#[derive(Debug, Clone)]
pub struct OutgoingFile {
    /// File name shown to recipients.
    pub name: String,
    /// Payload bytes.
    pub bytes: Vec<u8>,
}

/// REST operations consumed by the adapter. The concrete transport
/// (gateway socket, REST client, auth) lives outside the core.
#[async_trait]
pub trait DiscordClient: Send + Sync {
    /// Fetch a user by snowflake. `Ok(None)` means no such user.
    async fn fetch_user(&self, id: i64) -> Result<Option<DsUser>, DiscordError>;

    /// Fetch a channel by snowflake. `Ok(None)` means no such channel.
    async fn fetch_channel(&self, id: i64) -> Result<Option<DsChannel>, DiscordError>;

    /// Post a message to a channel, optionally uploading one file.
    async fn create_message(
        &self,
        channel_id: i64,
        text: Option<&str>,
        file: Option<OutgoingFile>,
    ) -> Result<(), DiscordError>;
}

// ---------------------------------------------------------------------------
// Canonical entities
// ---------------------------------------------------------------------------

/// A Discord user, cached per adapter and updated in place.
#[derive(Debug)]
pub struct DiscordUser {
    native_id: i64,
    uid: String,
    is_bot: bool,
    profile: RwLock<UserProfile>,
}

fn profile_from(api_user: &DsUser) -> UserProfile {
    UserProfile {
        nickname: api_user.username.clone(),
        first_name: None,
        last_name: None,
        gender: if api_user.bot {
            Gender::Bot
        } else {
            Gender::Unspecified
        },
        profile_url: format!("https://discord.com/users/{}", api_user.id),
    }
}

impl DiscordUser {
    fn new(api_user: &DsUser, codec: &IdentityCodec) -> Self {
        Self {
            native_id: api_user.id,
            uid: codec.encode_user(api_user.id),
            is_bot: api_user.bot,
            profile: RwLock::new(profile_from(api_user)),
        }
    }

    /// Platform-native snowflake.
    pub fn native_id(&self) -> i64 {
        self.native_id
    }
}

impl Conversation for DiscordUser {
    fn target_id(&self) -> String {
        self.native_id.to_string()
    }
    fn kind(&self) -> ConversationKind {
        ConversationKind::User
    }
}

impl User for DiscordUser {
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

/// A Discord channel, cached per adapter and updated in place.
#[derive(Debug)]
pub struct DiscordChat {
    native_id: i64,
    cid: String,
    title: RwLock<String>,
    members: RwLock<Vec<Arc<dyn User>>>,
    guild: Option<Guild>,
}

impl Conversation for DiscordChat {
    fn target_id(&self) -> String {
        self.native_id.to_string()
    }
    fn kind(&self) -> ConversationKind {
        ConversationKind::Chat
    }
}

impl Chat for DiscordChat {
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
        self.guild.clone()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Renders canonical text as Discord markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscordRenderer;

impl TextRenderer for DiscordRenderer {
    fn escape(&self, text: &str) -> String {
        text.replace('`', "\\`").replace('_', "\\_")
    }
    fn bold(&self, child: String) -> String {
        format!("**{child}**")
    }
    fn underlined(&self, child: String) -> String {
        format!("__{child}__")
    }
    fn code(&self, child: String) -> String {
        format!("`{child}`")
    }
    fn mention(&self, user: &dyn User) -> String {
        format!("<@{}>", user.target_id())
    }
    fn chat_ref(&self, chat: &dyn Chat) -> String {
        format!("<#{}>", chat.target_id())
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Per-adapter identity cache keyed by platform-native snowflake.
#[derive(Debug, Default)]
struct IdentityCache {
    users: RwLock<HashMap<i64, Arc<DiscordUser>>>,
    chats: RwLock<HashMap<i64, Arc<DiscordChat>>>,
}

/// Discord adapter.
///
/// Consumes native gateway events from an mpsc channel (single consumer,
/// arrival order preserved) and emits canonical events. A single
/// unresolvable event is logged and dropped; the stream keeps flowing.
pub struct DiscordAdapter {
    config: DiscordConfig,
    client: Arc<dyn DiscordClient>,
    http: reqwest::Client,
    codec: IdentityCodec,
    cache: IdentityCache,
    state: RwLock<ConnectionState>,
}

impl DiscordAdapter {
    /// Create a new Discord adapter over the given transport.
    pub fn new(config: DiscordConfig, client: Arc<dyn DiscordClient>) -> Self {
        let codec = IdentityCodec::new(PlatformKind::Discord, &config.descriptor);
        Self {
            config,
            client,
            http: reqwest::Client::new(),
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

    /// Run the normalization loop until the gateway channel or the event
    /// channel closes.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<GatewayEvent>,
        sink: EventSink,
    ) -> Result<(), DiscordError> {
        info!(descriptor = %self.config.descriptor, "Discord adapter starting");
        self.set_state(ConnectionState::Connecting);

        while let Some(event) = events.recv().await {
            match self.handle_event(event, &sink).await {
                Ok(()) => {}
                Err(DiscordError::ChannelClosed) => {
                    info!("event channel closed, stopping Discord adapter");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(e) => {
                    // One bad event must not halt the stream.
                    warn!(error = %e, "dropping unresolvable Discord event");
                }
            }
        }

        info!("gateway channel closed, stopping Discord adapter");
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn handle_event(
        &self,
        event: GatewayEvent,
        sink: &EventSink,
    ) -> Result<(), DiscordError> {
        let canonical = match event {
            GatewayEvent::Ready => {
                self.set_state(ConnectionState::Listening);
                debug!("Discord gateway ready");
                return Ok(());
            }
            GatewayEvent::Closed { reason } => {
                warn!(reason = reason.as_deref().unwrap_or("unknown"), "Discord gateway dropped");
                self.set_state(ConnectionState::Reconnecting);
                return Ok(());
            }
            GatewayEvent::MessageCreate { message } => {
                match self.normalize_message(&message, 0).await {
                    Ok(event) => ChatEvent::Message(event),
                    Err(e) => {
                        warn!(error = %e, message_id = message.id, "dropping message");
                        return Ok(());
                    }
                }
            }
            GatewayEvent::GuildMemberAdd { guild_id, user } => {
                ChatEvent::UserJoined(JoinEvent {
                    platform: PlatformKind::Discord,
                    user: self.cache_user(&user),
                    initiator: None,
                    reason: JoinReason::InviteLink,
                    chat: None,
                    guild: Some(self.wrap_guild(guild_id)),
                })
            }
            GatewayEvent::GuildMemberRemove { guild_id, user } => {
                ChatEvent::UserLeft(LeaveEvent {
                    platform: PlatformKind::Discord,
                    user: self.cache_user(&user),
                    initiator: None,
                    reason: LeaveReason::Left,
                    chat: None,
                    guild: Some(self.wrap_guild(guild_id)),
                })
            }
            GatewayEvent::TypingStart { channel_id, user } => {
                let chat = self.resolve_chat(channel_id).await.ok().flatten();
                ChatEvent::Typing(TypingEvent {
                    platform: PlatformKind::Discord,
                    user: self.cache_user(&user),
                    chat,
                    kind: TypingKind::Text,
                })
            }
        };

        if sink.send(canonical).await.is_err() {
            return Err(DiscordError::ChannelClosed);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identity cache
    // ------------------------------------------------------------------

    fn cache_user(&self, api_user: &DsUser) -> Arc<dyn User> {
        self.cache_user_concrete(api_user)
    }

    /// Insert or refresh a user. Repeated resolution of the same native
    /// id returns the same entity, its profile updated in place.
    fn cache_user_concrete(&self, api_user: &DsUser) -> Arc<DiscordUser> {
        let mut users = write_lock(&self.cache.users);
        if let Some(existing) = users.get(&api_user.id) {
            *write_lock(&existing.profile) = profile_from(api_user);
            return existing.clone();
        }
        let user = Arc::new(DiscordUser::new(api_user, &self.codec));
        users.insert(api_user.id, user.clone());
        user
    }

    fn cache_channel(&self, channel: &DsChannel) -> Arc<DiscordChat> {
        let members: Vec<Arc<dyn User>> = channel
            .recipients
            .iter()
            .map(|u| self.cache_user(u))
            .collect();
        let mut chats = write_lock(&self.cache.chats);
        if let Some(existing) = chats.get(&channel.id) {
            if let Some(name) = &channel.name {
                *write_lock(&existing.title) = name.clone();
            }
            if !members.is_empty() {
                *write_lock(&existing.members) = members;
            }
            return existing.clone();
        }
        let chat = Arc::new(DiscordChat {
            native_id: channel.id,
            cid: self.codec.encode_chat(channel.id),
            title: RwLock::new(channel.name.clone().unwrap_or_default()),
            members: RwLock::new(members),
            guild: channel.guild_id.map(|gid| self.wrap_guild(gid)),
        });
        chats.insert(channel.id, chat.clone());
        chat
    }

    fn wrap_guild(&self, guild_id: i64) -> Guild {
        Guild {
            gid: self.codec.encode_guild(guild_id),
            native_id: guild_id.to_string(),
        }
    }

    /// Resolve a channel id to a canonical chat, fetching and caching it
    /// on first sight. DM channels resolve to `None`.
    async fn resolve_chat(&self, channel_id: i64) -> Result<Option<Arc<dyn Chat>>, DiscordError> {
        let cached = read_lock(&self.cache.chats).get(&channel_id).cloned();
        if let Some(chat) = cached {
            return Ok(Some(chat as Arc<dyn Chat>));
        }
        let Some(channel) = self.client.fetch_channel(channel_id).await? else {
            return Ok(None);
        };
        if channel.kind == "dm" {
            return Ok(None);
        }
        Ok(Some(self.cache_channel(&channel) as Arc<dyn Chat>))
    }

    // ------------------------------------------------------------------
    // Event normalization
    // ------------------------------------------------------------------

    /// Normalize a native message, recursing into its reply chain.
    async fn normalize_message(
        &self,
        msg: &DsMessage,
        depth: usize,
    ) -> Result<MessageEvent, ResolutionError> {
        if depth > MAX_RESOLVE_DEPTH {
            return Err(ResolutionError::DepthExceeded {
                max: MAX_RESOLVE_DEPTH,
            });
        }
        let user = self.cache_user(&msg.author);
        let chat = self
            .resolve_chat(msg.channel_id)
            .await
            .map_err(|e| ResolutionError::Transport(e.to_string()))?;

        let reply_to = match &msg.referenced_message {
            Some(reply) => Some(Box::new(
                Box::pin(self.normalize_message(reply, depth.saturating_add(1))).await?,
            )),
            None => None,
        };

        Ok(MessageEvent {
            platform: PlatformKind::Discord,
            timestamp: chrono::Utc::now(),
            user,
            chat,
            attachments: msg.attachments.iter().map(wrap_attachment).collect(),
            text: msg.content.clone(),
            forwarded: Vec::new(),
            message_id: msg.id.to_string(),
            reply_to,
        })
    }

    // ------------------------------------------------------------------
    // Outbound send
    // ------------------------------------------------------------------

    async fn send_operation(
        &self,
        channel_id: i64,
        op: SendOperation,
    ) -> Result<(), DiscordError> {
        let file = match op.attachment {
            None => None,
            Some(attachment) => match attachment.as_file() {
                Some(data) => {
                    // Attachment bytes are materialized only here, at
                    // send time.
                    let bytes = data.data.fetch(&self.http).await?;
                    Some(OutgoingFile {
                        name: data.name.clone(),
                        bytes,
                    })
                }
                None => {
                    return Err(DiscordError::UnsupportedAttachment(
                        "location/platform-specific",
                    ))
                }
            },
        };
        self.client
            .create_message(channel_id, op.text.as_deref(), file)
            .await
    }
}

/// Wrap a native attachment into the canonical variant.
fn wrap_attachment(attachment: &DsAttachment) -> Attachment {
    let mime = attachment
        .content_type
        .clone()
        .unwrap_or_else(|| mime_from_name(&attachment.filename).to_string());
    match Url::parse(&attachment.url) {
        Ok(url) => Attachment::File(FileData {
            name: attachment.filename.clone(),
            size: attachment.size,
            mime,
            data: DataHandle::Url(url),
        }),
        Err(_) => Attachment::PlatformSpecific(serde_json::json!({
            "filename": attachment.filename,
            "url": attachment.url,
        })),
    }
}

#[async_trait]
impl Api for DiscordAdapter {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Discord
    }

    async fn send(
        &self,
        conversation: &dyn Conversation,
        text: &TextNode,
        attachments: Vec<Attachment>,
        _options: MessageOptions,
    ) -> anyhow::Result<()> {
        let target = conversation.target_id();
        let channel_id: i64 = target
            .parse()
            .map_err(|_| DiscordError::BadChannel(target.clone()))?;
        let rendered = DiscordRenderer.render(text);
        let operations = plan_send_operations(&rendered, attachments, DISCORD_MAX_MESSAGE_LEN)?;
        for op in operations {
            // Strictly sequential: a later operation must not overtake an
            // earlier one.
            self.send_operation(channel_id, op).await?;
        }
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Option<Arc<dyn User>> {
        let native = self.codec.decode_user(uid)?;
        let cached = read_lock(&self.cache.users).get(&native).cloned();
        if let Some(user) = cached {
            return Some(user);
        }
        match self.client.fetch_user(native).await {
            Ok(Some(api_user)) => Some(self.cache_user(&api_user)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, native, "failed to fetch Discord user");
                None
            }
        }
    }

    async fn get_chat(&self, cid: &str) -> Option<Arc<dyn Chat>> {
        let native = self.codec.decode_chat(cid)?;
        match self.resolve_chat(native).await {
            Ok(chat) => chat,
            Err(e) => {
                warn!(error = %e, native, "failed to fetch Discord channel");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records create_message calls; serves canned users/channels.
    #[derive(Default)]
    struct MockClient {
        channels: HashMap<i64, DsChannel>,
        users: HashMap<i64, DsUser>,
        sent: Mutex<Vec<(i64, Option<String>, Option<String>)>>,
    }

    #[async_trait]
    impl DiscordClient for MockClient {
        async fn fetch_user(&self, id: i64) -> Result<Option<DsUser>, DiscordError> {
            Ok(self.users.get(&id).cloned())
        }
        async fn fetch_channel(&self, id: i64) -> Result<Option<DsChannel>, DiscordError> {
            Ok(self.channels.get(&id).cloned())
        }
        async fn create_message(
            &self,
            channel_id: i64,
            text: Option<&str>,
            file: Option<OutgoingFile>,
        ) -> Result<(), DiscordError> {
            self.sent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((channel_id, text.map(str::to_string), file.map(|f| f.name)));
            Ok(())
        }
    }

    fn ds_user(id: i64, username: &str) -> DsUser {
        DsUser {
            id,
            username: Some(username.to_string()),
            bot: false,
        }
    }

    fn text_channel(id: i64, name: &str, guild_id: i64) -> DsChannel {
        DsChannel {
            id,
            kind: "text".to_string(),
            name: Some(name.to_string()),
            guild_id: Some(guild_id),
            recipients: Vec::new(),
        }
    }

    fn dm_channel(id: i64) -> DsChannel {
        DsChannel {
            id,
            kind: "dm".to_string(),
            name: None,
            guild_id: None,
            recipients: vec![ds_user(7, "alice")],
        }
    }

    fn adapter_with(client: MockClient) -> Arc<DiscordAdapter> {
        Arc::new(DiscordAdapter::new(
            DiscordConfig {
                descriptor: "main".to_string(),
            },
            Arc::new(client),
        ))
    }

    fn message(id: i64, channel_id: i64, author: DsUser, content: &str) -> DsMessage {
        DsMessage {
            id,
            channel_id,
            author,
            content: content.to_string(),
            attachments: Vec::new(),
            referenced_message: None,
        }
    }

    // -- normalization --

    #[tokio::test]
    async fn normalize_guild_message() {
        let mut client = MockClient::default();
        client.channels.insert(10, text_channel(10, "general", 99));
        let adapter = adapter_with(client);

        let event = adapter
            .normalize_message(&message(1, 10, ds_user(7, "alice"), "hello"), 0)
            .await
            .expect("resolvable");
        assert_eq!(event.platform, PlatformKind::Discord);
        assert_eq!(event.text, "hello");
        assert_eq!(event.user.uid(), "DSU:main:7");
        let chat = event.chat.as_ref().expect("guild channel");
        assert_eq!(chat.cid(), "DSC:main:10");
        assert_eq!(chat.title(), "general");
        assert_eq!(
            chat.guild().expect("guild").gid,
            "DSG:main:99"
        );
    }

    #[tokio::test]
    async fn normalize_dm_has_no_chat() {
        let mut client = MockClient::default();
        client.channels.insert(11, dm_channel(11));
        let adapter = adapter_with(client);

        let event = adapter
            .normalize_message(&message(1, 11, ds_user(7, "alice"), "psst"), 0)
            .await
            .expect("resolvable");
        assert!(event.chat.is_none());
        assert_eq!(event.conversation().target_id(), "7");
    }

    #[tokio::test]
    async fn reply_chain_deeper_than_cap_fails_recoverably() {
        let mut client = MockClient::default();
        client.channels.insert(10, text_channel(10, "general", 99));
        let adapter = adapter_with(client);

        let mut msg = message(0, 10, ds_user(7, "alice"), "leaf");
        for id in 1..40_i64 {
            let mut outer = message(id, 10, ds_user(7, "alice"), "lvl");
            outer.referenced_message = Some(Box::new(msg));
            msg = outer;
        }
        assert!(matches!(
            adapter.normalize_message(&msg, 0).await,
            Err(ResolutionError::DepthExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn attachments_wrap_as_files_with_guessed_mime() {
        let mut client = MockClient::default();
        client.channels.insert(10, text_channel(10, "general", 99));
        let adapter = adapter_with(client);

        let mut msg = message(1, 10, ds_user(7, "alice"), "");
        msg.attachments.push(DsAttachment {
            filename: "photo.png".to_string(),
            size: 123,
            url: "https://cdn.example.com/photo.png".to_string(),
            content_type: None,
        });
        let event = adapter.normalize_message(&msg, 0).await.expect("resolvable");
        let file = event.attachments[0].as_file().expect("file attachment");
        assert_eq!(file.name, "photo.png");
        assert_eq!(file.size, 123);
        assert_eq!(file.mime, "image/png");
    }

    // -- event loop --

    #[tokio::test]
    async fn gateway_events_drive_the_state_machine() {
        let adapter = adapter_with(MockClient::default());
        let (sink, mut events_out) = mpsc::channel(8);

        adapter
            .handle_event(GatewayEvent::Ready, &sink)
            .await
            .expect("ready");
        assert_eq!(adapter.state(), ConnectionState::Listening);

        adapter
            .handle_event(
                GatewayEvent::GuildMemberAdd {
                    guild_id: 99,
                    user: ds_user(7, "alice"),
                },
                &sink,
            )
            .await
            .expect("join");
        match events_out.recv().await.expect("event emitted") {
            ChatEvent::UserJoined(join) => {
                assert_eq!(join.user.uid(), "DSU:main:7");
                assert_eq!(join.reason, JoinReason::InviteLink);
                assert_eq!(join.guild.expect("guild").gid, "DSG:main:99");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        adapter
            .handle_event(GatewayEvent::Closed { reason: None }, &sink)
            .await
            .expect("closed");
        assert_eq!(adapter.state(), ConnectionState::Reconnecting);
    }

    #[tokio::test]
    async fn member_remove_emits_user_left() {
        let adapter = adapter_with(MockClient::default());
        let (sink, mut events_out) = mpsc::channel(8);
        adapter
            .handle_event(
                GatewayEvent::GuildMemberRemove {
                    guild_id: 99,
                    user: ds_user(7, "alice"),
                },
                &sink,
            )
            .await
            .expect("leave");
        match events_out.recv().await.expect("event emitted") {
            ChatEvent::UserLeft(leave) => {
                assert_eq!(leave.reason, LeaveReason::Left);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // -- outbound send --

    #[tokio::test]
    async fn send_records_operations_in_order() {
        let client = Arc::new(MockClient::default());
        let adapter = Arc::new(DiscordAdapter::new(
            DiscordConfig {
                descriptor: "main".to_string(),
            },
            client.clone(),
        ));
        let chat = DiscordChat {
            native_id: 10,
            cid: "DSC:main:10".to_string(),
            title: RwLock::new("general".to_string()),
            members: RwLock::new(Vec::new()),
            guild: None,
        };
        let file = |name: &str| {
            Attachment::File(FileData {
                name: name.to_string(),
                size: 1,
                mime: String::new(),
                data: DataHandle::Bytes(vec![1]),
            })
        };

        adapter
            .send(
                &chat,
                &TextNode::literal("0123456789"),
                vec![file("a.bin"), file("b.bin")],
                MessageOptions::default(),
            )
            .await
            .expect("send");

        let sent = client
            .sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        assert_eq!(sent.len(), 2, "one operation per attachment");
        assert_eq!(sent[0].0, 10);
        assert_eq!(sent[0].1.as_deref(), Some("0123456789"));
        assert_eq!(sent[0].2.as_deref(), Some("a.bin"));
        assert!(sent[1].1.is_none(), "second operation carries no text");
        assert_eq!(sent[1].2.as_deref(), Some("b.bin"));
    }

    #[tokio::test]
    async fn location_attachment_is_rejected() {
        let client = Arc::new(MockClient::default());
        let adapter = Arc::new(DiscordAdapter::new(
            DiscordConfig {
                descriptor: "main".to_string(),
            },
            client,
        ));
        let user_conv = DiscordUser::new(&ds_user(7, "alice"), &adapter.codec);
        let result = adapter
            .send(
                &user_conv,
                &TextNode::literal("here"),
                vec![Attachment::Location {
                    latitude: 1.0,
                    longitude: 2.0,
                }],
                MessageOptions::default(),
            )
            .await;
        assert!(result.is_err());
    }

    // -- rendering --

    #[test]
    fn renderer_escapes_backtick_and_underscore() {
        assert_eq!(
            DiscordRenderer.render(&TextNode::literal("a_b`c")),
            "a\\_b\\`c"
        );
    }

    #[test]
    fn renderer_mention_and_chat_ref() {
        let codec = IdentityCodec::new(PlatformKind::Discord, "main");
        let user = DiscordUser::new(&ds_user(42, "alice"), &codec);
        assert_eq!(
            DiscordRenderer.render(&TextNode::mention(Arc::new(user))),
            "<@42>"
        );
        let chat = DiscordChat {
            native_id: 10,
            cid: "DSC:main:10".to_string(),
            title: RwLock::new("general".to_string()),
            members: RwLock::new(Vec::new()),
            guild: None,
        };
        assert_eq!(
            DiscordRenderer.render(&TextNode::chat_ref(Arc::new(chat))),
            "<#10>"
        );
    }

    #[test]
    fn renderer_hides_unsupported_hashtags() {
        let tree = TextNode::hashtag(TextNode::literal("news"), true);
        assert_eq!(DiscordRenderer.render(&tree), "");
        let visible = TextNode::hashtag(TextNode::literal("news"), false);
        assert_eq!(DiscordRenderer.render(&visible), "news");
    }

    // -- identity lookups --

    #[tokio::test]
    async fn get_user_fetches_and_caches() {
        let mut client = MockClient::default();
        client.users.insert(7, ds_user(7, "alice"));
        let adapter = adapter_with(client);

        let user = adapter.get_user("DSU:main:7").await.expect("fetched");
        assert_eq!(user.display_name(), "alice");
        // Second lookup hits the cache and returns the same entity.
        let again = adapter.get_user("DSU:main:7").await.expect("cached");
        assert_eq!(again.uid(), user.uid());
    }

    #[tokio::test]
    async fn get_user_foreign_uid_is_not_mine() {
        let adapter = adapter_with(MockClient::default());
        assert!(adapter.get_user("TGU:main:7").await.is_none());
        assert!(adapter.get_user("DSU:other:7").await.is_none());
    }
}
