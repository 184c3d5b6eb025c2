//! Opaque identity encoding, scoped per platform instance.
//!
//! Downstream logic addresses users/chats/guilds only by opaque id. The
//! codec makes encoding a bijection within one platform+instance scope and
//! makes decoding fail closed: an id minted by another platform or bot
//! instance decodes to `None` ("not mine"), which multi-platform dispatch
//! uses to try the next adapter.

use crate::model::PlatformKind;

/// Encodes platform-native ids into opaque global ids and back.
///
/// Format: `<code><U|C|G>:<descriptor>:<native id>`, e.g. `TGU:main:42`
/// for a user of the `main` Telegram instance.
#[derive(Debug, Clone)]
pub struct IdentityCodec {
    user_prefix: String,
    chat_prefix: String,
    guild_prefix: String,
}

impl IdentityCodec {
    /// Build a codec for one platform instance; `descriptor` names the bot
    /// instance and becomes part of every id.
    pub fn new(platform: PlatformKind, descriptor: &str) -> Self {
        let code = platform.code();
        Self {
            user_prefix: format!("{code}U:{descriptor}:"),
            chat_prefix: format!("{code}C:{descriptor}:"),
            guild_prefix: format!("{code}G:{descriptor}:"),
        }
    }

    /// Opaque id for a native user id.
    pub fn encode_user(&self, native: i64) -> String {
        format!("{}{native}", self.user_prefix)
    }

    /// Native user id for an opaque id, or `None` when the id was minted
    /// by a different platform/instance or is malformed.
    pub fn decode_user(&self, uid: &str) -> Option<i64> {
        uid.strip_prefix(&self.user_prefix)?.parse().ok()
    }

    /// Opaque id for a native chat id.
    pub fn encode_chat(&self, native: i64) -> String {
        format!("{}{native}", self.chat_prefix)
    }

    /// Native chat id for an opaque id, or `None` when not ours.
    pub fn decode_chat(&self, cid: &str) -> Option<i64> {
        cid.strip_prefix(&self.chat_prefix)?.parse().ok()
    }

    /// Opaque id for a native guild id.
    pub fn encode_guild(&self, native: i64) -> String {
        format!("{}{native}", self.guild_prefix)
    }

    /// Native guild id for an opaque id, or `None` when not ours.
    pub fn decode_guild(&self, gid: &str) -> Option<i64> {
        gid.strip_prefix(&self.guild_prefix)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> IdentityCodec {
        IdentityCodec::new(PlatformKind::Telegram, "main")
    }

    #[test]
    fn encode_format() {
        assert_eq!(codec().encode_user(42), "TGU:main:42");
        assert_eq!(codec().encode_chat(-7), "TGC:main:-7");
        assert_eq!(codec().encode_guild(9), "TGG:main:9");
    }

    #[test]
    fn user_roundtrip_is_bijective() {
        let c = codec();
        for native in [1, 42, -5, i64::MAX, i64::MIN] {
            assert_eq!(c.decode_user(&c.encode_user(native)), Some(native));
        }
    }

    #[test]
    fn chat_and_guild_roundtrip() {
        let c = codec();
        assert_eq!(c.decode_chat(&c.encode_chat(-100)), Some(-100));
        assert_eq!(c.decode_guild(&c.encode_guild(3)), Some(3));
    }

    #[test]
    fn foreign_platform_is_not_mine() {
        let tg = codec();
        let ds = IdentityCodec::new(PlatformKind::Discord, "main");
        assert_eq!(tg.decode_user(&ds.encode_user(42)), None);
    }

    #[test]
    fn foreign_instance_is_not_mine() {
        let main = codec();
        let other = IdentityCodec::new(PlatformKind::Telegram, "backup");
        assert_eq!(main.decode_user(&other.encode_user(42)), None);
    }

    #[test]
    fn wrong_entity_kind_is_not_mine() {
        let c = codec();
        assert_eq!(c.decode_chat(&c.encode_user(42)), None);
    }

    #[test]
    fn garbage_is_not_mine() {
        let c = codec();
        assert_eq!(c.decode_user("not an id"), None);
        assert_eq!(c.decode_user("TGU:main:notanumber"), None);
        assert_eq!(c.decode_user(""), None);
    }
}
