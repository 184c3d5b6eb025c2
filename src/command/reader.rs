//! Cursor-based reader over an immutable source string.
//!
//! The reader is the substrate of all token parsing. Speculative parses
//! snapshot the cursor with [`StringReader::cursor`] and restore it with
//! [`StringReader::set_cursor`] on failure; cloning yields an independent
//! cursor over the same source, used to capture error positions without
//! disturbing the live reader.

use std::sync::Arc;

use thiserror::Error;

/// Errors produced by [`StringReader`] primitives.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// The cursor reached the end of the source.
    #[error("unexpected end of input")]
    EndOfInput,
    /// No integer lexeme at the cursor position.
    #[error("expected an integer")]
    NotANumber,
}

/// A mutable scan position over an immutable source string.
///
/// The cursor is a byte offset and always sits on a `char` boundary. The
/// cursor is the only mutable state; the source text itself never changes
/// and is shared between clones.
#[derive(Debug, Clone)]
pub struct StringReader {
    source: Arc<str>,
    cursor: usize,
}

impl StringReader {
    /// Create a reader positioned at the start of `source`.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            cursor: 0,
        }
    }

    /// The full source string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current cursor position (byte offset, always on a char boundary).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Restore a position previously obtained from [`Self::cursor`].
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    /// Whether any input remains.
    pub fn can_read(&self) -> bool {
        self.cursor < self.source.len()
    }

    /// The unconsumed tail of the source.
    pub fn remaining(&self) -> &str {
        &self.source[self.cursor..]
    }

    /// Next character without consuming it.
    pub fn peek(&self) -> Result<char, ReadError> {
        self.remaining().chars().next().ok_or(ReadError::EndOfInput)
    }

    /// Consume and return the next character.
    pub fn read(&mut self) -> Result<char, ReadError> {
        let c = self.peek()?;
        self.cursor = self.cursor.saturating_add(c.len_utf8());
        Ok(c)
    }

    /// Consume one character, discarding it.
    pub fn skip(&mut self) -> Result<(), ReadError> {
        self.read().map(|_| ())
    }

    /// Consume `n` characters.
    pub fn skip_n(&mut self, n: usize) -> Result<(), ReadError> {
        for _ in 0..n {
            self.skip()?;
        }
        Ok(())
    }

    /// Consume a maximal signed decimal integer lexeme.
    ///
    /// The cursor only advances on success; callers running a speculative
    /// parse should still snapshot and restore around this call, since the
    /// position after a failed composite parse is theirs to manage.
    pub fn read_int(&mut self) -> Result<i64, ReadError> {
        let rest = self.remaining();
        let mut len = 0usize;
        for (idx, c) in rest.char_indices() {
            let part_of_lexeme = c.is_ascii_digit() || (idx == 0 && c == '-');
            if !part_of_lexeme {
                break;
            }
            len = idx.saturating_add(c.len_utf8());
        }
        let value: i64 = rest[..len].parse().map_err(|_| ReadError::NotANumber)?;
        self.cursor = self.cursor.saturating_add(len);
        Ok(value)
    }

    /// Render the source with `marker` inserted at the cursor, for
    /// caret-style diagnostics.
    pub fn with_cursor_marker(&self, marker: char) -> String {
        let mut out = String::with_capacity(self.source.len().saturating_add(marker.len_utf8()));
        out.push_str(&self.source[..self.cursor]);
        out.push(marker);
        out.push_str(&self.source[self.cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_advance() {
        let reader = StringReader::new("ab");
        assert_eq!(reader.peek(), Ok('a'));
        assert_eq!(reader.peek(), Ok('a'));
        assert_eq!(reader.cursor(), 0);
    }

    #[test]
    fn read_consumes_in_order() {
        let mut reader = StringReader::new("ab");
        assert_eq!(reader.read(), Ok('a'));
        assert_eq!(reader.read(), Ok('b'));
        assert_eq!(reader.read(), Err(ReadError::EndOfInput));
    }

    #[test]
    fn peek_at_end_fails() {
        let reader = StringReader::new("");
        assert_eq!(reader.peek(), Err(ReadError::EndOfInput));
    }

    #[test]
    fn remaining_tracks_cursor() {
        let mut reader = StringReader::new("hello");
        reader.skip_n(2).expect("two chars available");
        assert_eq!(reader.remaining(), "llo");
    }

    #[test]
    fn multibyte_chars_advance_whole_glyphs() {
        let mut reader = StringReader::new("héllo");
        assert_eq!(reader.read(), Ok('h'));
        assert_eq!(reader.read(), Ok('é'));
        assert_eq!(reader.remaining(), "llo");
    }

    #[test]
    fn read_int_maximal_lexeme() {
        let mut reader = StringReader::new("78591039|rest");
        assert_eq!(reader.read_int(), Ok(78_591_039));
        assert_eq!(reader.remaining(), "|rest");
    }

    #[test]
    fn read_int_negative() {
        let mut reader = StringReader::new("-42x");
        assert_eq!(reader.read_int(), Ok(-42));
        assert_eq!(reader.remaining(), "x");
    }

    #[test]
    fn read_int_non_numeric_fails() {
        let mut reader = StringReader::new("clubX");
        assert_eq!(reader.read_int(), Err(ReadError::NotANumber));
    }

    #[test]
    fn snapshot_restore_backtracks() {
        let mut reader = StringReader::new("abc");
        let snapshot = reader.cursor();
        reader.skip_n(2).expect("two chars available");
        reader.set_cursor(snapshot);
        assert_eq!(reader.remaining(), "abc");
    }

    #[test]
    fn clone_is_independent() {
        let mut reader = StringReader::new("abc");
        let mut clone = reader.clone();
        clone.skip().expect("char available");
        assert_eq!(reader.cursor(), 0);
        reader.skip_n(2).expect("two chars available");
        assert_eq!(clone.cursor(), 1);
        assert_eq!(clone.source(), reader.source());
    }

    #[test]
    fn cursor_marker_rendering() {
        let mut reader = StringReader::new("abcd");
        reader.skip_n(2).expect("two chars available");
        assert_eq!(reader.with_cursor_marker('|'), "ab|cd");
    }
}
