//! Persisted cursor-state save/restore.

use cursor_core::{
    CollectingEventSink, CursorConfig, CursorController, CursorIntent, IdentityView, Position,
    RopeBuffer, Selection, SerializedCursorState,
};

fn controller(text: &str) -> CursorController {
    CursorController::new(
        Box::new(RopeBuffer::from_text(text)),
        Box::new(IdentityView),
        CursorConfig::default(),
    )
}

#[test]
fn restore_with_only_a_line_number_defaults_the_rest() {
    let mut engine = controller("one\ntwo\nthree\nfour\n");
    let mut sink = CollectingEventSink::default();

    engine
        .restore_state_json(&mut sink, r#"[{"position":{"lineNumber":3}}]"#, "session")
        .unwrap();

    assert_eq!(
        engine.primary_selection(),
        Selection::cursor(Position::new(3, 1))
    );
}

#[test]
fn restore_with_no_fields_defaults_to_buffer_start() {
    let mut engine = controller("one\ntwo\n");
    let mut sink = CollectingEventSink::default();

    engine.restore_state(&mut sink, &[SerializedCursorState::default()], "session");

    assert_eq!(
        engine.primary_selection(),
        Selection::cursor(Position::new(1, 1))
    );
}

#[test]
fn restore_with_an_empty_list_resets_to_one_caret() {
    let mut engine = controller("one\ntwo\n");
    let mut sink = CollectingEventSink::default();
    engine.dispatch(&mut sink, CursorIntent::AddCursorBelow, "test");
    assert_eq!(engine.cursor_count(), 2);

    engine.restore_state(&mut sink, &[], "session");

    assert_eq!(engine.cursor_count(), 1);
    assert_eq!(
        engine.primary_selection(),
        Selection::cursor(Position::new(1, 1))
    );
}

#[test]
fn save_and_restore_round_trips_the_cursor_set() {
    let mut engine = controller("alpha beta\ngamma delta\nepsilon\n");
    let mut sink = CollectingEventSink::default();

    engine.dispatch(
        &mut sink,
        CursorIntent::SetSelections {
            selections: vec![
                Selection::new(Position::new(1, 3), Position::new(1, 7)),
                Selection::new(Position::new(3, 4), Position::new(3, 2)),
            ],
        },
        "test",
    );
    let saved = engine.save_state_json();

    let mut restored = controller("alpha beta\ngamma delta\nepsilon\n");
    restored
        .restore_state_json(&mut sink, &saved, "session")
        .unwrap();

    assert_eq!(restored.selections(), engine.selections());
}

#[test]
fn restore_clamps_out_of_range_positions() {
    let mut engine = controller("short\n");
    let mut sink = CollectingEventSink::default();

    engine
        .restore_state_json(
            &mut sink,
            r#"[{"selectionStart":{"lineNumber":40,"column":10},"position":{"lineNumber":41,"column":12}}]"#,
            "session",
        )
        .unwrap();

    assert_eq!(
        engine.primary_selection(),
        Selection::cursor(Position::new(2, 1))
    );
}
