//! The canonical rich-text tree.
//!
//! A [`TextNode`] is the single representation of formatted message content
//! inside the core: platform-agnostic, acyclic and finite. Rendering into a
//! platform wire string is a pure fold (see [`render::TextRenderer`]); no
//! platform state ever leaks into the tree.

pub mod render;

use std::sync::Arc;

use crate::model::{Chat, User};

/// A node of the canonical rich-text tree.
#[derive(Debug, Clone)]
pub enum TextNode {
    /// Plain text; renderers apply platform escaping.
    Literal(String),
    /// Ordered concatenation of children.
    Sequence(Vec<TextNode>),
    /// Bold child.
    Bold(Box<TextNode>),
    /// Underlined child.
    Underlined(Box<TextNode>),
    /// Monospace child.
    Code(Box<TextNode>),
    /// Child rendered with non-collapsing spaces so platform whitespace
    /// collapsing cannot mangle it.
    PreservingWhitespace(Box<TextNode>),
    /// Hashtag content.
    Hashtag {
        /// Tag text.
        child: Box<TextNode>,
        /// Render as empty on platforms without hashtag support.
        hide_on_no_support: bool,
    },
    /// Back-reference to a user; the tree never owns the user.
    Mention(Arc<dyn User>),
    /// Back-reference to a chat; the tree never owns the chat.
    ChatRef(Arc<dyn Chat>),
}

impl TextNode {
    /// Plain text node.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Ordered concatenation.
    pub fn seq(children: impl Into<Vec<TextNode>>) -> Self {
        Self::Sequence(children.into())
    }

    /// Bold wrapper.
    pub fn bold(child: TextNode) -> Self {
        Self::Bold(Box::new(child))
    }

    /// Underline wrapper.
    pub fn underlined(child: TextNode) -> Self {
        Self::Underlined(Box::new(child))
    }

    /// Monospace wrapper.
    pub fn code(child: TextNode) -> Self {
        Self::Code(Box::new(child))
    }

    /// Whitespace-preserving wrapper.
    pub fn preserving_whitespace(child: TextNode) -> Self {
        Self::PreservingWhitespace(Box::new(child))
    }

    /// Hashtag node.
    pub fn hashtag(child: TextNode, hide_on_no_support: bool) -> Self {
        Self::Hashtag {
            child: Box::new(child),
            hide_on_no_support,
        }
    }

    /// Mention of a user.
    pub fn mention(user: Arc<dyn User>) -> Self {
        Self::Mention(user)
    }

    /// Reference to a chat.
    pub fn chat_ref(chat: Arc<dyn Chat>) -> Self {
        Self::ChatRef(chat)
    }
}

impl From<&str> for TextNode {
    fn from(text: &str) -> Self {
        Self::Literal(text.to_string())
    }
}

impl From<String> for TextNode {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}
