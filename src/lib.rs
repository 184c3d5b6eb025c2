//! Polychat — the normalization core of a multi-platform chat bot.
//!
//! Native events from VK, Telegram and Discord are folded into one canonical
//! representation (entities, rich-text tree, attachments); canonical rich
//! text is rendered back into each platform's wire format. Downstream
//! command/plugin logic only ever sees the canonical types plus the
//! argument-parsing substrate exposed by [`command`].
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod command;
pub mod identity;
pub mod model;
pub mod split;
pub mod text;

pub mod adapters;
