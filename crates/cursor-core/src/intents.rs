//! Intent vocabulary and resolvers.
//!
//! # Overview
//!
//! Every externally triggered gesture is one variant of [`CursorIntent`], a
//! closed tagged union dispatched with a total `match` (no runtime handler
//! table). Per-cursor intents resolve through [`resolve`]: a pure function
//! from (context, cursor state, intent) to either a new cursor state or an
//! [`EditOutcome`] carrying an edit command plus transaction metadata.
//!
//! Set-level intents (multi-cursor creation, paste distribution, undo,
//! reveal, scroll) are interpreted by the transaction orchestrator and
//! return `None` here.

use crate::buffer::TextBuffer;
use crate::command::{DeleteCommand, EditCommand, ReplaceCommand, ShiftLinesCommand};
use crate::selection::{Position, Selection, TextRange};
use unicode_segmentation::UnicodeSegmentation;

/// The fixed gesture vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorIntent {
    /// Move one character left.
    MoveLeft {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move one character right.
    MoveRight {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move one line up.
    MoveUp {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move one line down.
    MoveDown {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move to the start of the previous word.
    MoveWordLeft {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move to the end of the next word.
    MoveWordRight {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move to column 1.
    MoveToLineStart {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move past the last character of the line.
    MoveToLineEnd {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move to the buffer start.
    MoveToBufferStart {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move to the buffer end.
    MoveToBufferEnd {
        /// Extend the selection instead of collapsing it.
        select: bool,
    },
    /// Move the primary cursor to a position, dropping secondary cursors.
    MoveTo {
        /// Target buffer position.
        position: Position,
        /// Extend the primary selection instead of collapsing it.
        select: bool,
    },
    /// Add a cursor one line above the last-added cursor.
    AddCursorAbove,
    /// Add a cursor one line below the last-added cursor.
    AddCursorBelow,
    /// Add a secondary cursor at a position.
    AddCursorAt {
        /// Buffer position for the new cursor.
        position: Position,
    },
    /// Column (box) selection: one selection per line between two corners.
    ColumnSelect {
        /// Fixed corner.
        anchor: Position,
        /// Moving corner.
        active: Position,
    },
    /// Select the word under each cursor.
    SelectWord,
    /// Select the full line(s) under each cursor.
    SelectLine,
    /// Select the whole buffer.
    SelectAll,
    /// Replace all cursors with the given selections.
    SetSelections {
        /// New selections; the first becomes primary.
        selections: Vec<Selection>,
    },
    /// Drop all secondary cursors.
    KillSecondaryCursors,
    /// Type text at each cursor (replacing non-empty selections).
    Type {
        /// The typed text.
        text: String,
    },
    /// Insert one indent unit (or indent the selection's lines).
    Tab,
    /// Delete the selection, or one character left of each caret.
    DeleteLeft,
    /// Delete the selection, or one character right of each caret.
    DeleteRight,
    /// Delete the selection (or whole line for carets). The shell reads the
    /// removed text before dispatching if it wants clipboard content.
    Cut,
    /// Paste text. When the text has exactly one line per cursor it is
    /// distributed, one line each, in buffer-position order.
    Paste {
        /// The pasted text.
        text: String,
    },
    /// Indent the lines of each selection.
    Indent,
    /// Outdent the lines of each selection.
    Outdent,
    /// Text undo (buffer history).
    Undo,
    /// Text redo (buffer history).
    Redo,
    /// Restore the previous cursor positions (selection-only undo).
    CursorUndo,
    /// Ask the view to reveal a line.
    RevealLine {
        /// One-based line number.
        line: usize,
    },
    /// Ask the view to scroll by a line delta.
    Scroll {
        /// Lines to scroll; positive scrolls down.
        lines: isize,
    },
}

/// An edit command plus the transaction metadata the orchestrator consumes.
pub struct EditOutcome {
    /// The command to execute for this cursor.
    pub command: Box<dyn EditCommand>,
    /// Open a new undo coalescing boundary before executing.
    pub should_push_stack_element_before: bool,
    /// Close the undo coalescing boundary after executing.
    pub should_push_stack_element_after: bool,
    /// This edit is automatic whitespace: it never opens or closes undo
    /// boundaries, so it coalesces with the surrounding edits.
    pub is_auto_whitespace_edit: bool,
    /// Whether horizontal auto-reveal should run after the edit.
    pub should_reveal_horizontal: bool,
}

impl EditOutcome {
    fn new(command: Box<dyn EditCommand>) -> Self {
        Self {
            command,
            should_push_stack_element_before: false,
            should_push_stack_element_after: false,
            is_auto_whitespace_edit: false,
            should_reveal_horizontal: true,
        }
    }

    fn with_boundaries(mut self, before: bool, after: bool) -> Self {
        self.should_push_stack_element_before = before;
        self.should_push_stack_element_after = after;
        self
    }
}

/// What a per-cursor intent resolved to.
pub enum ResolvedIntent {
    /// A pure cursor-state update; no edit.
    NewState(Selection),
    /// An edit command with metadata.
    Edit(EditOutcome),
}

/// Read-only context handed to the resolvers.
pub struct ResolveContext<'a> {
    /// The buffer collaborator.
    pub buffer: &'a dyn TextBuffer,
    /// Indent unit used by Tab/Indent/Outdent.
    pub indent_unit: &'a str,
}

/// Resolve a per-cursor intent. Set-level intents return `None`; the
/// orchestrator interprets those itself.
pub fn resolve(
    ctx: &ResolveContext<'_>,
    selection: Selection,
    intent: &CursorIntent,
) -> Option<ResolvedIntent> {
    use CursorIntent::*;
    let buffer = ctx.buffer;

    match intent {
        MoveLeft { select } => Some(ResolvedIntent::NewState(move_left(buffer, selection, *select))),
        MoveRight { select } => {
            Some(ResolvedIntent::NewState(move_right(buffer, selection, *select)))
        }
        MoveUp { select } => Some(ResolvedIntent::NewState(move_vertical(
            buffer, selection, -1, *select,
        ))),
        MoveDown { select } => Some(ResolvedIntent::NewState(move_vertical(
            buffer, selection, 1, *select,
        ))),
        MoveWordLeft { select } => {
            Some(ResolvedIntent::NewState(move_word_left(buffer, selection, *select)))
        }
        MoveWordRight { select } => {
            Some(ResolvedIntent::NewState(move_word_right(buffer, selection, *select)))
        }
        MoveToLineStart { select } => {
            let target = Position::new(selection.active.line, 1);
            Some(ResolvedIntent::NewState(apply_move(selection, target, *select)))
        }
        MoveToLineEnd { select } => {
            let line = selection.active.line;
            let target = Position::new(line, buffer.line_max_column(line));
            Some(ResolvedIntent::NewState(apply_move(selection, target, *select)))
        }
        MoveToBufferStart { select } => {
            Some(ResolvedIntent::NewState(apply_move(selection, Position::MIN, *select)))
        }
        MoveToBufferEnd { select } => {
            let line = buffer.line_count();
            let target = Position::new(line, buffer.line_max_column(line));
            Some(ResolvedIntent::NewState(apply_move(selection, target, *select)))
        }
        SelectWord => Some(ResolvedIntent::NewState(select_word(buffer, selection))),
        SelectLine => Some(ResolvedIntent::NewState(select_line(buffer, selection))),
        Type { text } => Some(ResolvedIntent::Edit(type_outcome(selection, text))),
        Tab => Some(ResolvedIntent::Edit(tab_outcome(buffer, selection, ctx.indent_unit))),
        DeleteLeft => delete_left(buffer, selection).map(ResolvedIntent::Edit),
        DeleteRight => delete_right(buffer, selection).map(ResolvedIntent::Edit),
        Cut => Some(ResolvedIntent::Edit(cut_outcome(buffer, selection))),
        Indent => Some(ResolvedIntent::Edit(
            EditOutcome::new(Box::new(ShiftLinesCommand::indent(selection, ctx.indent_unit)))
                .with_boundaries(true, true),
        )),
        Outdent => Some(ResolvedIntent::Edit(
            EditOutcome::new(Box::new(ShiftLinesCommand::outdent(selection, ctx.indent_unit)))
                .with_boundaries(true, true),
        )),

        // Set-level intents: interpreted by the orchestrator.
        MoveTo { .. } | AddCursorAbove | AddCursorBelow | AddCursorAt { .. }
        | ColumnSelect { .. } | SelectAll | SetSelections { .. } | KillSecondaryCursors
        | Paste { .. } | Undo | Redo | CursorUndo | RevealLine { .. } | Scroll { .. } => None,
    }
}

/// Build the edit outcome for pasting `text` at one cursor.
pub fn paste_outcome(selection: Selection, text: &str) -> EditOutcome {
    EditOutcome::new(Box::new(ReplaceCommand::new(selection.to_range(), text)))
        .with_boundaries(true, true)
}

fn apply_move(selection: Selection, target: Position, select: bool) -> Selection {
    if select {
        selection.with_active(target)
    } else {
        Selection::cursor(target)
    }
}

fn move_left(buffer: &dyn TextBuffer, selection: Selection, select: bool) -> Selection {
    if !select && !selection.is_empty() {
        return Selection::cursor(selection.start());
    }
    let pos = selection.active;
    let target = previous_position(buffer, pos);
    apply_move(selection, target, select)
}

fn move_right(buffer: &dyn TextBuffer, selection: Selection, select: bool) -> Selection {
    if !select && !selection.is_empty() {
        return Selection::cursor(selection.end());
    }
    let pos = selection.active;
    let target = next_position(buffer, pos);
    apply_move(selection, target, select)
}

fn previous_position(buffer: &dyn TextBuffer, pos: Position) -> Position {
    if pos.column > 1 {
        Position::new(pos.line, pos.column - 1)
    } else if pos.line > 1 {
        Position::new(pos.line - 1, buffer.line_max_column(pos.line - 1))
    } else {
        pos
    }
}

fn next_position(buffer: &dyn TextBuffer, pos: Position) -> Position {
    if pos.column < buffer.line_max_column(pos.line) {
        Position::new(pos.line, pos.column + 1)
    } else if pos.line < buffer.line_count() {
        Position::new(pos.line + 1, 1)
    } else {
        pos
    }
}

fn move_vertical(
    buffer: &dyn TextBuffer,
    selection: Selection,
    delta: isize,
    select: bool,
) -> Selection {
    let pos = selection.active;
    let target = if delta < 0 {
        if pos.line > 1 {
            clamp_to_line(buffer, pos.line - 1, pos.column)
        } else {
            Position::MIN
        }
    } else if pos.line < buffer.line_count() {
        clamp_to_line(buffer, pos.line + 1, pos.column)
    } else {
        Position::new(pos.line, buffer.line_max_column(pos.line))
    };
    apply_move(selection, target, select)
}

fn clamp_to_line(buffer: &dyn TextBuffer, line: usize, column: usize) -> Position {
    Position::new(line, column.min(buffer.line_max_column(line)))
}

/// Char-index ranges of the non-whitespace word segments of a line.
fn word_segments(line_text: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut char_index = 0;
    for word in line_text.split_word_bounds() {
        let len = word.chars().count();
        if !word.trim().is_empty() {
            segments.push((char_index, char_index + len));
        }
        char_index += len;
    }
    segments
}

fn move_word_left(buffer: &dyn TextBuffer, selection: Selection, select: bool) -> Selection {
    let pos = selection.active;
    let col0 = pos.column - 1;
    let target = word_segments(&buffer.line_text(pos.line))
        .iter()
        .rev()
        .find(|&&(start, _)| start < col0)
        .map(|&(start, _)| Position::new(pos.line, start + 1))
        .unwrap_or_else(|| {
            if pos.line > 1 {
                Position::new(pos.line - 1, buffer.line_max_column(pos.line - 1))
            } else {
                Position::new(pos.line, 1)
            }
        });
    apply_move(selection, target, select)
}

fn move_word_right(buffer: &dyn TextBuffer, selection: Selection, select: bool) -> Selection {
    let pos = selection.active;
    let col0 = pos.column - 1;
    let target = word_segments(&buffer.line_text(pos.line))
        .iter()
        .find(|&&(_, end)| end > col0)
        .map(|&(_, end)| Position::new(pos.line, end + 1))
        .unwrap_or_else(|| {
            if pos.line < buffer.line_count() {
                Position::new(pos.line + 1, 1)
            } else {
                Position::new(pos.line, buffer.line_max_column(pos.line))
            }
        });
    apply_move(selection, target, select)
}

fn select_word(buffer: &dyn TextBuffer, selection: Selection) -> Selection {
    let pos = selection.active;
    let segments = word_segments(&buffer.line_text(pos.line));
    let col0 = pos.column - 1;

    let segment = segments
        .iter()
        .find(|&&(start, end)| start <= col0 && col0 < end)
        .or_else(|| segments.iter().find(|&&(start, _)| start >= col0))
        .or_else(|| segments.last());

    match segment {
        Some(&(start, end)) => Selection::new(
            Position::new(pos.line, start + 1),
            Position::new(pos.line, end + 1),
        ),
        None => Selection::cursor(pos),
    }
}

fn select_line(buffer: &dyn TextBuffer, selection: Selection) -> Selection {
    let range = selection.to_range();
    let start = Position::new(range.start.line, 1);
    let end = if range.end.line < buffer.line_count() {
        Position::new(range.end.line + 1, 1)
    } else {
        Position::new(range.end.line, buffer.line_max_column(range.end.line))
    };
    Selection::new(start, end)
}

fn type_outcome(selection: Selection, text: &str) -> EditOutcome {
    EditOutcome::new(Box::new(ReplaceCommand::new(selection.to_range(), text)))
        .with_boundaries(!selection.is_empty(), false)
}

fn tab_outcome(buffer: &dyn TextBuffer, selection: Selection, indent_unit: &str) -> EditOutcome {
    if selection.is_empty() {
        let pos = selection.active;
        let line_text = buffer.line_text(pos.line);
        let leading: String = line_text.chars().take(pos.column - 1).collect();
        let in_leading_whitespace = leading.chars().all(|c| c == ' ' || c == '\t');

        let mut outcome =
            EditOutcome::new(Box::new(ReplaceCommand::new(selection.to_range(), indent_unit)));
        outcome.is_auto_whitespace_edit = in_leading_whitespace;
        outcome
    } else {
        EditOutcome::new(Box::new(ShiftLinesCommand::indent(selection, indent_unit)))
            .with_boundaries(true, true)
    }
}

fn delete_left(buffer: &dyn TextBuffer, selection: Selection) -> Option<EditOutcome> {
    if !selection.is_empty() {
        return Some(
            EditOutcome::new(Box::new(DeleteCommand::new(selection.to_range())))
                .with_boundaries(true, false),
        );
    }
    let pos = selection.active;
    if pos == Position::MIN {
        return None;
    }
    let from = previous_position(buffer, pos);
    Some(EditOutcome::new(Box::new(DeleteCommand::new(
        TextRange::new(from, pos),
    ))))
}

fn delete_right(buffer: &dyn TextBuffer, selection: Selection) -> Option<EditOutcome> {
    if !selection.is_empty() {
        return Some(
            EditOutcome::new(Box::new(DeleteCommand::new(selection.to_range())))
                .with_boundaries(true, false),
        );
    }
    let pos = selection.active;
    let to = next_position(buffer, pos);
    if to == pos {
        return None;
    }
    Some(EditOutcome::new(Box::new(DeleteCommand::new(
        TextRange::new(pos, to),
    ))))
}

fn cut_outcome(buffer: &dyn TextBuffer, selection: Selection) -> EditOutcome {
    let range = if selection.is_empty() {
        // Cutting with a caret removes the whole line.
        let line = selection.active.line;
        if line < buffer.line_count() {
            TextRange::new(Position::new(line, 1), Position::new(line + 1, 1))
        } else {
            TextRange::new(
                Position::new(line, 1),
                Position::new(line, buffer.line_max_column(line)),
            )
        }
    } else {
        selection.to_range()
    };
    EditOutcome::new(Box::new(DeleteCommand::new(range))).with_boundaries(true, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RopeBuffer;

    fn ctx(buffer: &RopeBuffer) -> ResolveContext<'_> {
        ResolveContext {
            buffer,
            indent_unit: "    ",
        }
    }

    fn caret(line: usize, column: usize) -> Selection {
        Selection::cursor(Position::new(line, column))
    }

    fn resolve_state(buffer: &RopeBuffer, sel: Selection, intent: CursorIntent) -> Selection {
        match resolve(&ctx(buffer), sel, &intent) {
            Some(ResolvedIntent::NewState(s)) => s,
            _ => panic!("expected a state update"),
        }
    }

    #[test]
    fn move_left_wraps_to_previous_line_end() {
        let buffer = RopeBuffer::from_text("abc\ndef");
        let moved = resolve_state(&buffer, caret(2, 1), CursorIntent::MoveLeft { select: false });
        assert_eq!(moved, caret(1, 4));
    }

    #[test]
    fn move_left_collapses_selection_to_start() {
        let buffer = RopeBuffer::from_text("abcdef");
        let sel = Selection::new(Position::new(1, 2), Position::new(1, 5));
        let moved = resolve_state(&buffer, sel, CursorIntent::MoveLeft { select: false });
        assert_eq!(moved, caret(1, 2));
    }

    #[test]
    fn move_right_extends_selection_when_selecting() {
        let buffer = RopeBuffer::from_text("abcdef");
        let moved = resolve_state(&buffer, caret(1, 2), CursorIntent::MoveRight { select: true });
        assert_eq!(moved, Selection::new(Position::new(1, 2), Position::new(1, 3)));
    }

    #[test]
    fn vertical_move_clamps_to_shorter_line() {
        let buffer = RopeBuffer::from_text("long line here\nab\nanother long one");
        let moved = resolve_state(&buffer, caret(1, 10), CursorIntent::MoveDown { select: false });
        assert_eq!(moved, caret(2, 3));
    }

    #[test]
    fn word_right_lands_after_word_end() {
        let buffer = RopeBuffer::from_text("alpha beta gamma");
        let moved =
            resolve_state(&buffer, caret(1, 1), CursorIntent::MoveWordRight { select: false });
        assert_eq!(moved, caret(1, 6));
        let moved =
            resolve_state(&buffer, moved, CursorIntent::MoveWordRight { select: false });
        assert_eq!(moved, caret(1, 11));
    }

    #[test]
    fn word_left_lands_on_word_start() {
        let buffer = RopeBuffer::from_text("alpha beta gamma");
        let moved =
            resolve_state(&buffer, caret(1, 11), CursorIntent::MoveWordLeft { select: false });
        assert_eq!(moved, caret(1, 7));
    }

    #[test]
    fn select_word_covers_word_under_cursor() {
        let buffer = RopeBuffer::from_text("alpha beta gamma");
        let sel = resolve_state(&buffer, caret(1, 8), CursorIntent::SelectWord);
        assert_eq!(sel, Selection::new(Position::new(1, 7), Position::new(1, 11)));
    }

    #[test]
    fn select_line_includes_terminator() {
        let buffer = RopeBuffer::from_text("one\ntwo\nthree");
        let sel = resolve_state(&buffer, caret(2, 2), CursorIntent::SelectLine);
        assert_eq!(sel, Selection::new(Position::new(2, 1), Position::new(3, 1)));
    }

    #[test]
    fn delete_left_at_buffer_start_is_nothing() {
        let buffer = RopeBuffer::from_text("abc");
        assert!(resolve(&ctx(&buffer), caret(1, 1), &CursorIntent::DeleteLeft).is_none());
    }

    #[test]
    fn tab_in_leading_whitespace_is_auto_whitespace() {
        let buffer = RopeBuffer::from_text("  indented");
        let outcome = match resolve(&ctx(&buffer), caret(1, 2), &CursorIntent::Tab) {
            Some(ResolvedIntent::Edit(o)) => o,
            _ => panic!("expected an edit"),
        };
        assert!(outcome.is_auto_whitespace_edit);

        let outcome = match resolve(&ctx(&buffer), caret(1, 8), &CursorIntent::Tab) {
            Some(ResolvedIntent::Edit(o)) => o,
            _ => panic!("expected an edit"),
        };
        assert!(!outcome.is_auto_whitespace_edit);
    }
}
