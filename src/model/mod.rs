//! Canonical entity model shared by every platform adapter.
//!
//! Per-platform concrete types (e.g. the Telegram user) implement the
//! [`Conversation`]/[`User`]/[`Chat`] traits over a shared [`UserProfile`]
//! payload, so downstream logic is polymorphic over platforms without
//! inheritance chains.

pub mod attachment;
pub mod events;

use std::fmt;
use std::sync::Arc;

/// Supported chat platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    /// VK community bot.
    Vk,
    /// Telegram bot.
    Telegram,
    /// Discord bot.
    Discord,
}

impl PlatformKind {
    /// Two-letter platform code used in opaque id prefixes.
    pub fn code(self) -> &'static str {
        match self {
            Self::Vk => "VK",
            Self::Telegram => "TG",
            Self::Discord => "DS",
        }
    }
}

/// What kind of destination a conversation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    /// Direct conversation with a user.
    User,
    /// Group chat.
    Chat,
    /// Anything else (channels, system destinations).
    Other,
}

/// A sendable destination on some platform.
///
/// A conversation owns nothing; it is a capability to address a
/// platform-native handle.
pub trait Conversation: Send + Sync + fmt::Debug {
    /// Platform-native destination handle.
    fn target_id(&self) -> String;

    /// Destination kind.
    fn kind(&self) -> ConversationKind;

    /// Whether this destination is a single user.
    fn is_user(&self) -> bool {
        self.kind() == ConversationKind::User
    }

    /// Whether this destination is a group chat.
    fn is_chat(&self) -> bool {
        self.kind() == ConversationKind::Chat
    }
}

/// Gender as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    /// Male.
    Man,
    /// Female.
    Woman,
    /// Platform reported something else.
    Other,
    /// Platform reported nothing.
    Unspecified,
    /// Explicitly androgynous.
    Androgynous,
    /// Bot account.
    Bot,
}

/// Mutable user attributes, updated in place when the platform reports
/// changed fields. Shared by all platform user types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Platform nickname / username.
    pub nickname: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Reported gender.
    pub gender: Gender,
    /// Public profile URL.
    pub profile_url: String,
}

fn unknown_name(uid: &str) -> String {
    format!("<Unknown {uid}>")
}

/// A user on some platform.
pub trait User: Conversation {
    /// Opaque global id.
    fn uid(&self) -> String;

    /// Snapshot of the current profile.
    fn profile(&self) -> UserProfile;

    /// Whether this is a bot account.
    fn is_bot(&self) -> bool;

    /// Display name: nickname, else first name, else `<Unknown {uid}>`.
    fn display_name(&self) -> String {
        let profile = self.profile();
        if let Some(nick) = profile.nickname {
            nick
        } else if let Some(first) = profile.first_name {
            first
        } else {
            unknown_name(&self.uid())
        }
    }

    /// Full name: first and last names with the nickname in parentheses,
    /// degrading to whatever fields are present.
    fn full_name(&self) -> String {
        let profile = self.profile();
        if let (Some(nick), None, None) = (
            profile.nickname.as_ref(),
            profile.first_name.as_ref(),
            profile.last_name.as_ref(),
        ) {
            return nick.clone();
        }
        let mut name = String::new();
        if let Some(first) = &profile.first_name {
            name.push_str(first);
            name.push(' ');
        }
        if let Some(last) = &profile.last_name {
            name.push_str(last);
            name.push(' ');
        }
        if let Some(nick) = &profile.nickname {
            name.push_str(&format!("({nick}) "));
        }
        let name = name.trim();
        if name.is_empty() {
            unknown_name(&self.uid())
        } else {
            name.to_string()
        }
    }
}

/// A guild (server) grouping chats on platforms that have them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    /// Opaque global id.
    pub gid: String,
    /// Platform-native handle.
    pub native_id: String,
}

/// A group chat on some platform.
pub trait Chat: Conversation {
    /// Opaque global id.
    fn cid(&self) -> String;

    /// Chat title.
    fn title(&self) -> String;

    /// Known members. Order is not significant.
    fn members(&self) -> Vec<Arc<dyn User>>;

    /// Subset of members with admin rights.
    fn admins(&self) -> Vec<Arc<dyn User>>;

    /// Owning guild, on platforms that group chats into guilds.
    fn guild(&self) -> Option<Guild>;
}
