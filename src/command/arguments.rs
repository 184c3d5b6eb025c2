//! The argument type protocol: pluggable token recognizers/resolvers.
//!
//! `parse` is synchronous and cursor-precise so validation and completion
//! never touch the network; `load` performs the (possibly slow) platform
//! lookup only when the token is actually consumed.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::PlatformKind;

use super::reader::StringReader;
use super::suggestions::{Suggestions, SuggestionsBuilder};

/// Ambient data available to the offline hooks of an [`ArgumentType`].
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Platform the command arrived from.
    pub platform: PlatformKind,
    /// Whether the command was issued inside a group chat.
    pub in_chat: bool,
}

/// A malformed token.
///
/// By contract the reader cursor has been restored to its pre-parse
/// position before this error is returned; `snapshot` is an independent
/// reader positioned where the token started, for caret-style display.
#[derive(Debug, Error, Clone)]
#[error("expected {expected} at offset {}", snapshot.cursor())]
pub struct ParseError {
    /// Human-readable token kind, e.g. `"vk user mention"`.
    pub expected: &'static str,
    /// Reader clone capturing the error position.
    pub snapshot: StringReader,
}

impl ParseError {
    /// Build an error from the live reader, restoring its cursor to
    /// `start` and capturing the snapshot at the same position.
    pub fn expected(kind: &'static str, reader: &mut StringReader, start: usize) -> Self {
        reader.set_cursor(start);
        let snapshot = reader.clone();
        Self {
            expected: kind,
            snapshot,
        }
    }

    /// Source text with a caret marker at the error position.
    pub fn caret(&self) -> String {
        self.snapshot.with_cursor_marker('|')
    }
}

/// A well-formed token whose referent could not be resolved.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No user exists with the parsed id.
    #[error("user not found: {id}")]
    NoSuchUser {
        /// Platform-native id that failed to resolve.
        id: String,
        /// Parse-time reader snapshot for diagnostics.
        snapshot: StringReader,
    },
    /// No chat exists with the parsed id.
    #[error("chat not found: {id}")]
    NoSuchChat {
        /// Platform-native id that failed to resolve.
        id: String,
        /// Parse-time reader snapshot for diagnostics.
        snapshot: StringReader,
    },
    /// A reply/forward chain exceeded the resolution depth cap.
    #[error("reply/forward chain deeper than {max} levels")]
    DepthExceeded {
        /// The configured cap.
        max: usize,
    },
    /// The platform request backing the lookup failed.
    #[error("platform lookup failed: {0}")]
    Transport(String),
}

/// A pluggable token kind: recognize it in free text, resolve it to a
/// value, and describe it for help/completion.
#[async_trait]
pub trait ArgumentType: Send + Sync {
    /// Parse-time output: cheap, offline, carries everything `load` needs.
    type Parsed: Send;
    /// Resolution output.
    type Value: Send;

    /// Consume one token from `reader`.
    ///
    /// On failure the implementation must restore the cursor to its
    /// pre-call position — never leave it partially advanced — and return
    /// a typed error carrying a reader snapshot.
    fn parse(&self, ctx: &ParseContext, reader: &mut StringReader)
        -> Result<Self::Parsed, ParseError>;

    /// Resolve a parsed token, possibly via a platform lookup.
    async fn load(&self, parsed: Self::Parsed) -> Result<Self::Value, ResolutionError>;

    /// Example token spellings for help output. Side-effect free.
    fn examples(&self, ctx: &ParseContext) -> Vec<String>;

    /// Ranked completions for a partially typed token. Side-effect free;
    /// the default offers nothing.
    fn list_suggestions(&self, _ctx: &ParseContext, builder: SuggestionsBuilder) -> Suggestions {
        builder.build()
    }
}
