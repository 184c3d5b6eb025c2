//! Outbound message splitting and send-operation planning.
//!
//! Platforms cap message length and accept at most one attachment per send
//! call, so an outbound (text, attachments) pair becomes an ordered
//! sequence of [`SendOperation`]s. Adapters issue the sequence strictly in
//! order; text that would remain unscheduled is a planner bug and fails
//! loudly instead of being truncated.

use std::collections::VecDeque;

use thiserror::Error;

use crate::model::attachment::Attachment;

/// Splitter invariant violations. These indicate implementation bugs, not
/// recoverable conditions.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Text chunks remained unscheduled after planning.
    #[error("{remaining} text chunk(s) left unscheduled")]
    TextLeftUnscheduled {
        /// Number of orphaned chunks.
        remaining: usize,
    },
    /// The platform length limit was zero.
    #[error("message length limit must be positive")]
    ZeroLimit,
}

/// One platform send call: optional text body plus at most one attachment.
#[derive(Debug, Clone)]
pub struct SendOperation {
    /// Text body for this call.
    pub text: Option<String>,
    /// Attachment uploaded with this call.
    pub attachment: Option<Attachment>,
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// Cuts never land inside a character. When a boundary would fall
/// mid-word, the cut backs up to just after the last whitespace in the
/// window; a single word longer than the limit is cut hard. Concatenating
/// the chunks in order reproduces `text` exactly.
pub fn split_text(text: &str, max_len: usize) -> Result<Vec<String>, SplitError> {
    if max_len == 0 {
        return Err(SplitError::ZeroLimit);
    }
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let window_end = byte_index_of_char(rest, max_len);
        let cut = if window_end == rest.len() {
            window_end
        } else {
            match rest[..window_end].rfind(char::is_whitespace) {
                Some(ws) => {
                    let ws_len = rest[ws..].chars().next().map_or(1, char::len_utf8);
                    ws.saturating_add(ws_len)
                }
                None => window_end,
            }
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    Ok(chunks)
}

/// Byte offset just past the `n`-th character, clamped to the string end.
fn byte_index_of_char(text: &str, n: usize) -> usize {
    let mut count = 0usize;
    for (idx, _) in text.char_indices() {
        if count == n {
            return idx;
        }
        count = count.saturating_add(1);
    }
    text.len()
}

/// Plan the ordered send operations for a rendered message.
///
/// Text-only operations go first; the final text chunk rides with the
/// first attachment; remaining attachments are sent without text, in their
/// original order. More attachments than text chunks simply yields extra
/// text-less operations.
pub fn plan_send_operations(
    text: &str,
    attachments: Vec<Attachment>,
    max_len: usize,
) -> Result<Vec<SendOperation>, SplitError> {
    let mut chunks: VecDeque<String> = split_text(text, max_len)?.into();
    let mut operations = Vec::new();

    let held_back = usize::from(!attachments.is_empty());
    while chunks.len() > held_back {
        let Some(chunk) = chunks.pop_front() else {
            break;
        };
        operations.push(SendOperation {
            text: Some(chunk),
            attachment: None,
        });
    }

    for (index, attachment) in attachments.into_iter().enumerate() {
        let text = if index == 0 { chunks.pop_front() } else { None };
        operations.push(SendOperation {
            text,
            attachment: Some(attachment),
        });
    }

    if !chunks.is_empty() {
        return Err(SplitError::TextLeftUnscheduled {
            remaining: chunks.len(),
        });
    }
    Ok(operations)
}
