//! Multi-platform dispatch: each adapter claims only its own opaque ids.

use std::sync::Arc;

use async_trait::async_trait;
use polychat::adapters::discord::{
    DiscordAdapter, DiscordClient, DiscordConfig, DiscordError, DsChannel, DsUser, OutgoingFile,
};
use polychat::adapters::vk::{
    VkAdapter, VkApiGroup, VkApiUser, VkChatInfo, VkClient, VkConfig, VkError, VkEvent,
};
use polychat::adapters::Api;
use polychat::model::attachment::Attachment;

struct EmptyDiscord;

#[async_trait]
impl DiscordClient for EmptyDiscord {
    async fn fetch_user(&self, id: i64) -> Result<Option<DsUser>, DiscordError> {
        Ok(Some(DsUser {
            id,
            username: Some("someone".to_string()),
            bot: false,
        }))
    }
    async fn fetch_channel(&self, _id: i64) -> Result<Option<DsChannel>, DiscordError> {
        Ok(None)
    }
    async fn create_message(
        &self,
        _channel_id: i64,
        _text: Option<&str>,
        _file: Option<OutgoingFile>,
    ) -> Result<(), DiscordError> {
        Ok(())
    }
}

struct EmptyVk;

#[async_trait]
impl VkClient for EmptyVk {
    async fn poll(&self) -> Result<Vec<VkEvent>, VkError> {
        Ok(Vec::new())
    }
    async fn get_user(&self, id: i64) -> Result<Option<VkApiUser>, VkError> {
        Ok(Some(VkApiUser {
            id,
            domain: None,
            first_name: Some("Someone".to_string()),
            last_name: None,
            sex: None,
            photo_max: None,
        }))
    }
    async fn get_group(&self, _id: i64) -> Result<Option<VkApiGroup>, VkError> {
        Ok(None)
    }
    async fn get_chat(&self, _chat_id: i64) -> Result<Option<VkChatInfo>, VkError> {
        Ok(None)
    }
    async fn send_message(
        &self,
        _peer_id: i64,
        _text: Option<&str>,
        _attachment: Option<&Attachment>,
    ) -> Result<(), VkError> {
        Ok(())
    }
}

#[tokio::test]
async fn each_adapter_resolves_only_its_own_ids() {
    let discord = DiscordAdapter::new(
        DiscordConfig {
            descriptor: "main".to_string(),
        },
        Arc::new(EmptyDiscord),
    );
    let vk = VkAdapter::new(
        VkConfig {
            descriptor: "main".to_string(),
            group_id: 1,
        },
        Arc::new(EmptyVk),
    );
    let adapters: [&dyn Api; 2] = [&discord, &vk];

    // Exactly one adapter claims each uid; the rest answer "not mine".
    for (uid, expected_hits) in [
        ("DSU:main:42", 1_usize),
        ("VKU:main:42", 1),
        ("TGU:main:42", 0),
    ] {
        let mut hits = 0_usize;
        for adapter in adapters {
            if adapter.get_user(uid).await.is_some() {
                hits = hits.saturating_add(1);
            }
        }
        assert_eq!(hits, expected_hits, "uid {uid}");
    }
}

#[tokio::test]
async fn instance_descriptor_scopes_the_claim() {
    let discord = DiscordAdapter::new(
        DiscordConfig {
            descriptor: "main".to_string(),
        },
        Arc::new(EmptyDiscord),
    );
    assert!(discord.get_user("DSU:main:42").await.is_some());
    assert!(discord.get_user("DSU:backup:42").await.is_none());
}
