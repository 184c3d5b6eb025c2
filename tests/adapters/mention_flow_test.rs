//! End-to-end mention flow: free text → parse → load → canonical user.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use polychat::adapters::vk::{
    VkAdapter, VkApiGroup, VkApiUser, VkChatInfo, VkClient, VkConfig, VkError, VkEvent,
    VkUserArgumentType,
};
use polychat::command::{ArgumentType, ParseContext, ResolutionError, StringReader};
use polychat::model::attachment::Attachment;
use polychat::model::{PlatformKind, User};

#[derive(Default)]
struct StubClient {
    users: HashMap<i64, VkApiUser>,
}

#[async_trait]
impl VkClient for StubClient {
    async fn poll(&self) -> Result<Vec<VkEvent>, VkError> {
        Ok(Vec::new())
    }
    async fn get_user(&self, id: i64) -> Result<Option<VkApiUser>, VkError> {
        Ok(self.users.get(&id).cloned())
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

fn fixture() -> (VkUserArgumentType, ParseContext) {
    let mut users = HashMap::new();
    users.insert(
        78_591_039,
        VkApiUser {
            id: 78_591_039,
            domain: Some("ann".to_string()),
            first_name: Some("Ann".to_string()),
            last_name: None,
            sex: Some(1),
            photo_max: None,
        },
    );
    let adapter = Arc::new(VkAdapter::new(
        VkConfig {
            descriptor: "main".to_string(),
            group_id: 1,
        },
        Arc::new(StubClient { users }),
    ));
    let ctx = ParseContext {
        platform: PlatformKind::Vk,
        in_chat: true,
    };
    (VkUserArgumentType::new(adapter), ctx)
}

#[tokio::test]
async fn mention_token_resolves_to_canonical_user() {
    let (arg, ctx) = fixture();
    let mut reader = StringReader::new("[id78591039|Ann] how are you");
    let parsed = arg.parse(&ctx, &mut reader).expect("well-formed mention");
    assert_eq!(reader.remaining(), " how are you");

    let user = arg.load(parsed).await.expect("known user");
    assert_eq!(user.uid(), "VKU:main:78591039");
    assert_eq!(user.display_name(), "ann");
}

#[tokio::test]
async fn malformed_token_leaves_reader_reusable() {
    let (arg, ctx) = fixture();
    let mut reader = StringReader::new("[clubX|Name] tail");
    assert!(arg.parse(&ctx, &mut reader).is_err());
    // The caller can fall through to another argument type on the same
    // input.
    assert_eq!(reader.cursor(), 0);
    assert_eq!(reader.remaining(), "[clubX|Name] tail");
}

#[tokio::test]
async fn unknown_referent_is_a_resolution_error() {
    let (arg, ctx) = fixture();
    let mut reader = StringReader::new("[id1|ghost]");
    let parsed = arg.parse(&ctx, &mut reader).expect("well-formed mention");
    match arg.load(parsed).await {
        Err(ResolutionError::NoSuchUser { id, .. }) => assert_eq!(id, "1"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}
