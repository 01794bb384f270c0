mod common;

use common::Editor;
use core_document::Document;
use pretty_assertions::assert_eq;

#[test]
fn adjacent_keystrokes_form_one_transaction() {
    let mut ed = Editor::new("");
    ed.type_chars("abc");
    assert_eq!(ed.undo.undo_depth(), 1);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "");
    assert!(!ed.undo.can_undo());
}

#[test]
fn keystrokes_in_per_key_transactions_still_coalesce() {
    let mut ed = Editor::new("");
    for c in "abc".chars() {
        ed.undo.begin_transaction();
        ed.type_str(&c.to_string());
        ed.undo.end_transaction();
    }
    assert_eq!(ed.undo.undo_depth(), 1);
}

#[test]
fn space_joins_word_but_next_word_starts_fresh() {
    let mut ed = Editor::new("");
    ed.type_chars("foo bar");
    assert_eq!(ed.undo.undo_depth(), 2);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "foo ");
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "");
}

#[test]
fn consecutive_spaces_keep_merging() {
    let mut ed = Editor::new("");
    ed.type_chars("a   ");
    assert_eq!(ed.undo.undo_depth(), 1);
}

#[test]
fn multi_char_batch_never_merges_into_a_run() {
    let mut ed = Editor::new("");
    ed.type_chars("ab");
    ed.type_str("cd");
    assert_eq!(ed.undo.undo_depth(), 2);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "ab");
}

#[test]
fn batched_words_split_after_the_space() {
    let mut ed = Editor::new("");
    ed.type_str("foo");
    ed.type_str(" ");
    ed.type_str("bar");
    assert_eq!(ed.undo.undo_depth(), 2);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "foo ");
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "");
}

#[test]
fn batch_with_newline_is_closed() {
    let mut ed = Editor::new("");
    ed.type_str("line\n");
    ed.type_chars("x");
    assert_eq!(ed.undo.undo_depth(), 2);
}

#[test]
fn explicit_transaction_groups_batches() {
    let mut ed = Editor::new("");
    ed.undo.begin_transaction();
    ed.type_str("foo");
    ed.type_str(" ");
    ed.type_str("bar");
    ed.undo.end_transaction();
    assert_eq!(ed.undo.undo_depth(), 1);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "");
}

#[test]
fn cursor_jump_breaks_insert_run() {
    let mut ed = Editor::new("");
    ed.type_chars("ab");
    ed.move_cursor(0);
    ed.type_chars("x");
    assert_eq!(ed.doc.content(), "xab");
    assert_eq!(ed.undo.undo_depth(), 2);
}

#[test]
fn backspace_run_merges_and_restores_cursor() {
    let mut ed = Editor::new("hello");
    for _ in 0..3 {
        ed.backspace();
    }
    assert_eq!(ed.doc.content(), "he");
    assert_eq!(ed.undo.undo_depth(), 1);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "hello");
    assert_eq!(ed.doc.cursor(), 5);
}

#[test]
fn forward_delete_run_merges_and_restores_cursor() {
    let mut ed = Editor::new("abcdef");
    ed.doc.place_cursor(1);
    for _ in 0..3 {
        ed.delete_forward();
    }
    assert_eq!(ed.doc.content(), "aef");
    assert_eq!(ed.undo.undo_depth(), 1);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "abcdef");
    assert_eq!(ed.doc.cursor(), 1);
}

#[test]
fn forward_delete_run_restores_formatting_exactly() {
    let mut ed = Editor::new("abcdef");
    let bold = ed.seed_tag("bold", 1..6);
    let before = ed.state();
    ed.doc.place_cursor(1);
    for _ in 0..3 {
        ed.delete_forward();
    }
    assert_eq!(ed.undo.undo_depth(), 1);
    assert_eq!(ed.doc.spans(bold), vec![1..3]);
    assert!(ed.undo());
    assert_eq!(ed.state(), before);
}

#[test]
fn delete_run_stops_at_tag_boundary() {
    let mut ed = Editor::new("abcdef");
    let bold = ed.seed_tag("bold", 0..3);
    // f, e and d merge; the run closes at the bold edge.
    for _ in 0..4 {
        ed.backspace();
    }
    assert_eq!(ed.doc.content(), "ab");
    assert_eq!(ed.undo.undo_depth(), 2);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "abc");
    assert_eq!(ed.doc.spans(bold), vec![0..3]);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "abcdef");
    assert_eq!(ed.doc.spans(bold), vec![0..3]);
}

#[test]
fn direction_change_starts_new_delete() {
    let mut ed = Editor::new("abcdef");
    ed.doc.place_cursor(3);
    ed.backspace();
    ed.delete_forward();
    assert_eq!(ed.doc.content(), "abef");
    assert_eq!(ed.undo.undo_depth(), 2);
}

#[test]
fn backspace_over_word_stops_after_space() {
    let mut ed = Editor::new("ab cd");
    for _ in 0..4 {
        ed.backspace();
    }
    // "d", "c" and " " merge; "b" after the space starts a new run.
    assert_eq!(ed.doc.content(), "a");
    assert_eq!(ed.undo.undo_depth(), 2);
    assert!(ed.undo());
    assert_eq!(ed.doc.content(), "ab");
}

#[test]
fn newline_delete_is_its_own_step() {
    let mut ed = Editor::new("a\nb");
    ed.backspace();
    ed.backspace();
    ed.backspace();
    assert_eq!(ed.doc.content(), "");
    assert_eq!(ed.undo.undo_depth(), 3);
}

#[test]
fn selection_growth_replaces_pending_selection() {
    let mut ed = Editor::new("hello world");
    ed.undo.record_selection(0..2);
    ed.undo.record_selection(0..5);
    ed.doc.set_selection(0, 5);
    assert_eq!(ed.undo.undo_depth(), 1);
    assert!(ed.undo());
    // The recorded selection was still active; it collapses to its end.
    assert_eq!(ed.doc.selection(), (5, 5));
}
