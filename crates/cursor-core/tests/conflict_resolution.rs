//! Command execution engine: conflict resolution, abandonment, atomicity.

use cursor_core::{
    AbandonReason, CommandError, CursorComputeData, DeleteCommand, EditCommand,
    EditOperationBuilder, ExecuteOutcome, Position, ReplaceCommand, RopeBuffer, Selection,
    TextBuffer, TextRange, execute_commands,
};

fn pos(line: usize, column: usize) -> Position {
    Position::new(line, column)
}

fn range(l1: usize, c1: usize, l2: usize, c2: usize) -> TextRange {
    TextRange::new(pos(l1, c1), pos(l2, c2))
}

fn caret(line: usize, column: usize) -> Selection {
    Selection::cursor(pos(line, column))
}

fn boxed(command: impl EditCommand + 'static) -> Option<Box<dyn EditCommand>> {
    Some(Box::new(command))
}

#[test]
fn adjacent_backward_deletions_collapse_into_one() {
    // Two carets at (1,5) and (1,6) both delete one character backward.
    let mut buffer = RopeBuffer::from_text("hello");
    let selections = vec![caret(1, 5), caret(1, 6)];
    let commands = vec![
        boxed(DeleteCommand::new(range(1, 4, 1, 5))),
        boxed(DeleteCommand::new(range(1, 5, 1, 6))),
    ];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(buffer.text(), "hel");
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            selections: vec![caret(1, 4)],
        }
    );
}

#[test]
fn non_adjacent_deletions_stay_separate() {
    let mut buffer = RopeBuffer::from_text("abcdefgh");
    let selections = vec![caret(1, 2), caret(1, 6)];
    let commands = vec![
        boxed(DeleteCommand::new(range(1, 1, 1, 2))),
        boxed(DeleteCommand::new(range(1, 5, 1, 6))),
    ];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(buffer.text(), "bcdfgh");
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            selections: vec![caret(1, 1), caret(1, 4)],
        }
    );
}

#[test]
fn overlapping_inserts_drop_the_higher_major() {
    // Cursor A (major 0) replaces [1,1..1,10]; cursor B (major 1) replaces
    // the overlapping [1,5..1,15]. B loses, its slot disappears.
    let mut buffer = RopeBuffer::from_text("abcdefghijklmnop");
    let selections = vec![
        Selection::new(pos(1, 1), pos(1, 10)),
        Selection::new(pos(1, 5), pos(1, 15)),
    ];
    let commands = vec![
        boxed(ReplaceCommand::new(range(1, 1, 1, 10), "AAA")),
        boxed(ReplaceCommand::new(range(1, 5, 1, 15), "BBB")),
    ];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(buffer.text(), "AAAjklmnop");
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            selections: vec![caret(1, 4)],
        }
    );
}

#[test]
fn surviving_operations_never_overlap() {
    // Three mutually overlapping edits: only the primary's applies.
    let mut buffer = RopeBuffer::from_text("0123456789");
    let selections = vec![caret(1, 1), caret(1, 3), caret(1, 5)];
    let commands = vec![
        boxed(ReplaceCommand::new(range(1, 1, 1, 6), "x")),
        boxed(ReplaceCommand::new(range(1, 4, 1, 9), "y")),
        boxed(ReplaceCommand::new(range(1, 2, 1, 8), "z")),
    ];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(buffer.text(), "x56789");
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            selections: vec![caret(1, 2)],
        }
    );
}

/// A command whose own operations overlap each other: the only way the
/// primary cursor can lose conflict resolution.
struct SelfConflictingCommand;

impl EditCommand for SelfConflictingCommand {
    fn get_edit_operations(
        &self,
        _buffer: &dyn TextBuffer,
        builder: &mut dyn EditOperationBuilder,
    ) -> Result<(), CommandError> {
        builder.track_selection(Selection::new(pos(1, 1), pos(1, 4)), None);
        builder.add_edit_operation(range(1, 1, 1, 6), "x");
        builder.add_edit_operation(range(1, 3, 1, 8), "y");
        Ok(())
    }

    fn compute_cursor_state(
        &self,
        _buffer: &dyn TextBuffer,
        _data: &CursorComputeData<'_>,
    ) -> Option<Selection> {
        None
    }
}

#[test]
fn primary_cursor_loss_abandons_the_whole_batch() {
    let mut buffer = RopeBuffer::from_text("0123456789");
    let selections = vec![caret(1, 1), caret(1, 9)];
    let commands = vec![
        boxed(SelfConflictingCommand),
        boxed(ReplaceCommand::new(range(1, 9, 1, 10), "z")),
    ];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    // Whole batch abandoned: no mutation at all, not even cursor B's edit.
    assert_eq!(
        outcome,
        ExecuteOutcome::Abandoned(AbandonReason::PrimaryCursorConflict)
    );
    assert_eq!(buffer.text(), "0123456789");
    // Tracking markers were created for the batch and all released.
    assert_eq!(buffer.marker_count(), 0);
}

#[test]
fn out_of_editable_range_abandons_without_mutation() {
    let mut buffer = RopeBuffer::from_text("aaa\nbbb\nccc");
    buffer.set_editable_range(Some(range(2, 1, 2, 4)));

    let selections = vec![caret(2, 1), caret(1, 1)];
    let commands = vec![
        boxed(ReplaceCommand::new(range(2, 1, 2, 1), "ok ")),
        boxed(ReplaceCommand::new(range(1, 1, 1, 1), "nope ")),
    ];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(
        outcome,
        ExecuteOutcome::Abandoned(AbandonReason::OutsideEditableRange)
    );
    assert_eq!(buffer.text(), "aaa\nbbb\nccc");
    assert_eq!(buffer.marker_count(), 0);
}

#[test]
fn read_only_buffer_executes_nothing() {
    let mut buffer = RopeBuffer::from_text("abc");
    buffer.set_read_only(true);

    let selections = vec![caret(1, 1)];
    let commands = vec![boxed(ReplaceCommand::new(range(1, 1, 1, 1), "x"))];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(outcome, ExecuteOutcome::Abandoned(AbandonReason::ReadOnly));
    assert_eq!(buffer.text(), "abc");
}

/// Fails while producing operations; must degrade to a zero-op contribution.
struct FailingCommand;

impl EditCommand for FailingCommand {
    fn get_edit_operations(
        &self,
        _buffer: &dyn TextBuffer,
        builder: &mut dyn EditOperationBuilder,
    ) -> Result<(), CommandError> {
        // Operations queued before the failure must be rolled back too.
        builder.add_edit_operation(range(2, 1, 2, 1), "junk");
        Err(CommandError::Failed("simulated".to_string()))
    }

    fn compute_cursor_state(
        &self,
        _buffer: &dyn TextBuffer,
        _data: &CursorComputeData<'_>,
    ) -> Option<Selection> {
        None
    }
}

#[test]
fn failing_command_contributes_nothing_but_batch_continues() {
    let mut buffer = RopeBuffer::from_text("one\ntwo\n");
    let selections = vec![caret(1, 1), caret(2, 1)];
    let commands = vec![
        boxed(ReplaceCommand::new(range(1, 1, 1, 1), "X")),
        boxed(FailingCommand),
    ];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(buffer.text(), "Xone\ntwo\n");
    // The failing cursor keeps its pre-edit selection.
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            selections: vec![caret(1, 2), caret(2, 1)],
        }
    );
}

#[test]
fn empty_batch_executes_nothing() {
    let mut buffer = RopeBuffer::from_text("abc");
    let selections = vec![caret(1, 1), caret(1, 2)];
    let outcome = execute_commands(&mut buffer, &selections, vec![None, None]);
    assert_eq!(outcome, ExecuteOutcome::NothingExecuted);
    assert_eq!(buffer.text(), "abc");
}

#[test]
fn pure_noop_operations_are_dropped() {
    let mut buffer = RopeBuffer::from_text("abc");
    let selections = vec![caret(1, 1)];
    let commands = vec![boxed(ReplaceCommand::new(range(1, 1, 1, 1), ""))];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(outcome, ExecuteOutcome::NothingExecuted);
    assert_eq!(buffer.text(), "abc");
}

#[test]
fn command_without_operations_keeps_its_selection() {
    let mut buffer = RopeBuffer::from_text("abcdef\nsecond");
    let selections = vec![caret(1, 3), caret(2, 2)];
    // Only the second cursor edits.
    let commands = vec![None, boxed(ReplaceCommand::new(range(2, 2, 2, 2), "++"))];

    let outcome = execute_commands(&mut buffer, &selections, commands);

    assert_eq!(buffer.text(), "abcdef\ns++econd");
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            selections: vec![caret(1, 3), caret(2, 4)],
        }
    );
}
