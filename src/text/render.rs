//! Structural fold from [`TextNode`] to a platform wire string.

use crate::model::{Chat, User};

use super::TextNode;

/// Non-collapsing space used to defeat platform whitespace collapsing.
const EN_SPACE: char = '\u{2002}';

/// Per-platform rendering hooks plus the shared fold.
///
/// [`TextRenderer::render`] matches exhaustively over the closed
/// [`TextNode`] enum, so a node tag without a rendering rule on some
/// platform is a compile error, never a runtime fallback.
pub trait TextRenderer {
    /// Escape markup metacharacters in literal text.
    fn escape(&self, text: &str) -> String;

    /// Wrap a rendered child in the platform's bold delimiters.
    fn bold(&self, child: String) -> String;

    /// Wrap a rendered child in the platform's underline delimiters.
    fn underlined(&self, child: String) -> String;

    /// Wrap a rendered child in the platform's monospace delimiters.
    fn code(&self, child: String) -> String;

    /// Mention syntax referencing the user's platform-native id.
    fn mention(&self, user: &dyn User) -> String;

    /// Chat/channel reference syntax.
    fn chat_ref(&self, chat: &dyn Chat) -> String;

    /// Whether the platform has native hashtag support.
    fn supports_hashtags(&self) -> bool {
        false
    }

    /// Render hashtag content. With native support every word is prefixed
    /// with `#`; without it the content renders bare, or empty when the
    /// node asks to be hidden.
    fn hashtag(&self, child: String, hide_on_no_support: bool) -> String {
        if self.supports_hashtags() {
            prefix_words(&child)
        } else if hide_on_no_support {
            String::new()
        } else {
            child
        }
    }

    /// Fold a tree into this platform's wire string.
    fn render(&self, node: &TextNode) -> String {
        match node {
            TextNode::Literal(text) => self.escape(text),
            TextNode::Sequence(children) => {
                children.iter().map(|child| self.render(child)).collect()
            }
            TextNode::Bold(child) => {
                let rendered = self.render(child);
                self.bold(rendered)
            }
            TextNode::Underlined(child) => {
                let rendered = self.render(child);
                self.underlined(rendered)
            }
            TextNode::Code(child) => {
                let rendered = self.render(child);
                self.code(rendered)
            }
            TextNode::PreservingWhitespace(child) => harden_whitespace(&self.render(child)),
            TextNode::Hashtag {
                child,
                hide_on_no_support,
            } => {
                let rendered = self.render(child);
                self.hashtag(rendered, *hide_on_no_support)
            }
            TextNode::Mention(user) => self.mention(user.as_ref()),
            TextNode::ChatRef(chat) => self.chat_ref(chat.as_ref()),
        }
    }
}

/// Prefix every non-empty space-separated word with `#`.
pub(crate) fn prefix_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            if word.is_empty() {
                word.to_string()
            } else {
                format!("#{word}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replace a single leading space and each double-space run with
/// non-collapsing spaces, leaving lone interior spaces untouched.
pub(crate) fn harden_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut at_start = true;
    while let Some(c) = chars.next() {
        if c == ' ' {
            if at_start {
                out.push(EN_SPACE);
            } else if chars.peek() == Some(&' ') {
                chars.next();
                out.push(EN_SPACE);
                out.push(EN_SPACE);
            } else {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
        at_start = false;
    }
    out
}
