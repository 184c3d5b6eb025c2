//! Splitter contract tests through the public API.

use polychat::model::attachment::{Attachment, DataHandle, FileData};
use polychat::split::{plan_send_operations, split_text, SplitError};

fn file(name: &str) -> Attachment {
    Attachment::File(FileData {
        name: name.to_string(),
        size: 1,
        mime: String::new(),
        data: DataHandle::Bytes(vec![0]),
    })
}

#[test]
fn long_text_without_attachments_splits_into_bounded_chunks() {
    let text = "word ".repeat(1000);
    let chunks = split_text(&text, 2000).expect("positive limit");
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 2000);
    }
    assert_eq!(chunks.concat(), text, "no text dropped or duplicated");
}

#[test]
fn short_text_with_two_attachments_pairs_text_with_first() {
    let ops =
        plan_send_operations("0123456789", vec![file("a.bin"), file("b.bin")], 2000)
            .expect("schedulable");
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].text.as_deref(), Some("0123456789"));
    assert!(ops[0].attachment.is_some());
    assert!(ops[1].text.is_none());
    assert!(ops[1].attachment.is_some());
}

#[test]
fn surplus_chunks_go_out_before_attachment_pairs() {
    let text = "a".repeat(25);
    let ops = plan_send_operations(&text, vec![file("a.bin")], 10).expect("schedulable");
    assert_eq!(ops.len(), 3);
    assert!(ops[0].attachment.is_none());
    assert!(ops[1].attachment.is_none());
    assert!(ops[2].attachment.is_some(), "last chunk rides the attachment");
    let reassembled: String = ops
        .iter()
        .filter_map(|op| op.text.as_deref())
        .collect();
    assert_eq!(reassembled, text);
}

#[test]
fn multibyte_text_never_splits_inside_a_glyph() {
    let text = "ы".repeat(50);
    let chunks = split_text(&text, 7).expect("positive limit");
    assert_eq!(chunks.concat(), text);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 7);
    }
}

#[test]
fn zero_limit_is_rejected() {
    assert!(matches!(split_text("x", 0), Err(SplitError::ZeroLimit)));
}
