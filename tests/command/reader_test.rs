//! Reader and parse-error contract tests through the public API.

use polychat::command::{ParseError, StringReader};

#[test]
fn failed_parse_leaves_no_net_cursor_movement() {
    let mut reader = StringReader::new("not a mention");
    let before = reader.cursor();
    reader.skip_n(5).expect("chars available");
    let err = ParseError::expected("vk user mention", &mut reader, before);
    assert_eq!(reader.cursor(), before);
    assert_eq!(err.snapshot.cursor(), before);
}

#[test]
fn caret_marks_the_error_position() {
    let mut reader = StringReader::new("abc def");
    reader.skip_n(4).expect("chars available");
    let start = reader.cursor();
    let err = ParseError::expected("integer", &mut reader, start);
    assert_eq!(err.caret(), "abc |def");
}

#[test]
fn speculative_int_parse_backtracks_cleanly() {
    let mut reader = StringReader::new("id42|rest");
    let snapshot = reader.cursor();
    reader.skip_n(2).expect("prefix available");
    let id = reader.read_int().expect("numeric lexeme");
    assert_eq!(id, 42);
    reader.set_cursor(snapshot);
    assert_eq!(reader.remaining(), "id42|rest");
}
