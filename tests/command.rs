//! Integration tests for `src/command/`.

#[path = "command/reader_test.rs"]
mod reader_test;
