//! Cross-platform rendering tests: one canonical tree, every renderer.

use std::sync::Arc;

use polychat::adapters::discord::DiscordRenderer;
use polychat::adapters::telegram::TelegramRenderer;
use polychat::adapters::vk::VkRenderer;
use polychat::model::{Conversation, ConversationKind, Gender, User, UserProfile};
use polychat::text::render::TextRenderer;
use polychat::text::TextNode;

#[derive(Debug)]
struct FakeUser {
    native_id: i64,
    name: &'static str,
}

impl Conversation for FakeUser {
    fn target_id(&self) -> String {
        self.native_id.to_string()
    }
    fn kind(&self) -> ConversationKind {
        ConversationKind::User
    }
}

impl User for FakeUser {
    fn uid(&self) -> String {
        format!("XXU:test:{}", self.native_id)
    }
    fn profile(&self) -> UserProfile {
        UserProfile {
            nickname: Some(self.name.to_string()),
            first_name: None,
            last_name: None,
            gender: Gender::Unspecified,
            profile_url: String::new(),
        }
    }
    fn is_bot(&self) -> bool {
        false
    }
}

fn sample_tree() -> TextNode {
    TextNode::seq(vec![
        TextNode::bold(TextNode::literal("release")),
        TextNode::literal(" "),
        TextNode::code(TextNode::literal("v1.0")),
        TextNode::literal(" "),
        TextNode::mention(Arc::new(FakeUser {
            native_id: 42,
            name: "ann",
        })),
    ])
}

#[test]
fn every_platform_renders_the_same_tree() {
    let tree = sample_tree();
    // MarkdownV2 escapes '.' even inside literals.
    assert_eq!(
        TelegramRenderer.render(&tree),
        "*release* `v1\\.0` [ann](tg://user?id=42)"
    );
    assert_eq!(DiscordRenderer.render(&tree), "**release** `v1.0` <@42>");
    assert_eq!(VkRenderer.render(&tree), "release v1.0 [id42|ann]");
}

#[test]
fn hashtag_support_diverges_per_platform() {
    let tree = TextNode::hashtag(TextNode::literal("big news"), true);
    // Telegram and VK have native hashtags; Discord hides the node.
    assert_eq!(TelegramRenderer.render(&tree), "#big #news");
    assert_eq!(VkRenderer.render(&tree), "#big #news");
    assert_eq!(DiscordRenderer.render(&tree), "");
}

#[test]
fn whitespace_preservation_survives_all_renderers() {
    let tree = TextNode::preserving_whitespace(TextNode::literal(" col1  col2"));
    for rendered in [
        TelegramRenderer.render(&tree),
        DiscordRenderer.render(&tree),
        VkRenderer.render(&tree),
    ] {
        assert!(rendered.starts_with('\u{2002}'), "leading space hardened");
        assert!(rendered.contains("\u{2002}\u{2002}"), "double run hardened");
    }
}
