//! Edit commands.
//!
//! An edit command is opaque to the execution engine except for two
//! capabilities: emit (range, text) operations through a builder, and
//! compute its cursor's post-edit selection from the matched inverse
//! operations and tracked-selection resolutions. Concrete editing intents
//! are variants implementing [`EditCommand`], not a class hierarchy.

use crate::buffer::{InverseEditOperation, MarkerStickiness, TextBuffer};
use crate::selection::{Position, Selection, TextRange};
use std::cell::Cell;
use std::collections::BTreeMap;
use thiserror::Error;

/// Error raised by an edit command while producing operations.
///
/// A failing command is reported and contributes zero operations; it never
/// aborts the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command could not produce its operations.
    #[error("edit command failed: {0}")]
    Failed(String),
}

/// Handle to a selection tracked through an edit batch via sticky markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedSelectionId(pub(crate) usize);

/// Collects the operations a command wants applied.
pub trait EditOperationBuilder {
    /// Queue one (range, replacement text) operation.
    fn add_edit_operation(&mut self, range: TextRange, text: &str);

    /// Ask the engine to carry `selection` through the edit on sticky
    /// markers. Stickiness is derived from the selection's direction and
    /// emptiness unless overridden.
    fn track_selection(
        &mut self,
        selection: Selection,
        stickiness_override: Option<MarkerStickiness>,
    ) -> TrackedSelectionId;
}

/// Post-edit data handed to [`EditCommand::compute_cursor_state`]: the
/// command's inverse operations (sorted by minor id) and the resolved
/// positions of its tracked selections.
pub struct CursorComputeData<'a> {
    inverse_operations: &'a [InverseEditOperation],
    tracked_selections: &'a BTreeMap<usize, Selection>,
}

impl<'a> CursorComputeData<'a> {
    pub(crate) fn new(
        inverse_operations: &'a [InverseEditOperation],
        tracked_selections: &'a BTreeMap<usize, Selection>,
    ) -> Self {
        Self {
            inverse_operations,
            tracked_selections,
        }
    }

    /// Inverse operations matched to this command, sorted by minor id.
    pub fn inverse_operations(&self) -> &[InverseEditOperation] {
        self.inverse_operations
    }

    /// Resolve a tracked selection to its post-edit position.
    pub fn tracked_selection(&self, id: TrackedSelectionId) -> Option<Selection> {
        self.tracked_selections.get(&id.0).copied()
    }
}

/// One cursor's contribution to an edit batch.
pub trait EditCommand {
    /// Emit this command's edit operations.
    fn get_edit_operations(
        &self,
        buffer: &dyn TextBuffer,
        builder: &mut dyn EditOperationBuilder,
    ) -> Result<(), CommandError>;

    /// Derive the cursor's new selection after the batch applied. `None`
    /// collapses the cursor (its slot is removed from the result set).
    fn compute_cursor_state(
        &self,
        buffer: &dyn TextBuffer,
        data: &CursorComputeData<'_>,
    ) -> Option<Selection>;

    /// `Some(range)` iff this command is a single pure deletion of `range`.
    /// Drives the adjacent-deletion collapse pre-pass.
    fn pure_deletion_range(&self) -> Option<TextRange> {
        None
    }
}

/// Replace `range` with `text`; the cursor collapses to the end of the
/// inserted text. Plain typing is this command with the cursor's selection
/// as the range.
#[derive(Debug, Clone)]
pub struct ReplaceCommand {
    range: TextRange,
    text: String,
}

impl ReplaceCommand {
    /// Create a replacement command.
    pub fn new(range: TextRange, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }
}

impl EditCommand for ReplaceCommand {
    fn get_edit_operations(
        &self,
        _buffer: &dyn TextBuffer,
        builder: &mut dyn EditOperationBuilder,
    ) -> Result<(), CommandError> {
        builder.add_edit_operation(self.range, &self.text);
        Ok(())
    }

    fn compute_cursor_state(
        &self,
        _buffer: &dyn TextBuffer,
        data: &CursorComputeData<'_>,
    ) -> Option<Selection> {
        let inverse = data.inverse_operations().first()?;
        Some(Selection::cursor(inverse.range.end))
    }
}

/// Replace `range` with `text` while preserving a selection through the
/// edit on sticky markers.
#[derive(Debug)]
pub struct ReplaceKeepSelection {
    range: TextRange,
    text: String,
    selection_to_keep: Selection,
    tracked: Cell<Option<TrackedSelectionId>>,
}

impl ReplaceKeepSelection {
    /// Create a replacement that keeps `selection_to_keep` selected.
    pub fn new(range: TextRange, text: impl Into<String>, selection_to_keep: Selection) -> Self {
        Self {
            range,
            text: text.into(),
            selection_to_keep,
            tracked: Cell::new(None),
        }
    }
}

impl EditCommand for ReplaceKeepSelection {
    fn get_edit_operations(
        &self,
        _buffer: &dyn TextBuffer,
        builder: &mut dyn EditOperationBuilder,
    ) -> Result<(), CommandError> {
        self.tracked
            .set(Some(builder.track_selection(self.selection_to_keep, None)));
        builder.add_edit_operation(self.range, &self.text);
        Ok(())
    }

    fn compute_cursor_state(
        &self,
        _buffer: &dyn TextBuffer,
        data: &CursorComputeData<'_>,
    ) -> Option<Selection> {
        data.tracked_selection(self.tracked.get()?)
    }
}

/// Delete `range`; the cursor collapses to the deletion start.
#[derive(Debug, Clone)]
pub struct DeleteCommand {
    range: TextRange,
}

impl DeleteCommand {
    /// Create a deletion command.
    pub fn new(range: TextRange) -> Self {
        Self { range }
    }
}

impl EditCommand for DeleteCommand {
    fn get_edit_operations(
        &self,
        _buffer: &dyn TextBuffer,
        builder: &mut dyn EditOperationBuilder,
    ) -> Result<(), CommandError> {
        builder.add_edit_operation(self.range, "");
        Ok(())
    }

    fn compute_cursor_state(
        &self,
        _buffer: &dyn TextBuffer,
        data: &CursorComputeData<'_>,
    ) -> Option<Selection> {
        let inverse = data.inverse_operations().first()?;
        Some(Selection::cursor(inverse.range.start))
    }

    fn pure_deletion_range(&self) -> Option<TextRange> {
        Some(self.range)
    }
}

/// Indent or outdent every line a selection spans, preserving the selection
/// through the edit.
#[derive(Debug)]
pub struct ShiftLinesCommand {
    selection: Selection,
    indent_unit: String,
    outdent: bool,
    tracked: Cell<Option<TrackedSelectionId>>,
}

impl ShiftLinesCommand {
    /// Indent the lines spanned by `selection` by one `indent_unit`.
    pub fn indent(selection: Selection, indent_unit: impl Into<String>) -> Self {
        Self {
            selection,
            indent_unit: indent_unit.into(),
            outdent: false,
            tracked: Cell::new(None),
        }
    }

    /// Remove up to one `indent_unit` of leading whitespace from the lines
    /// spanned by `selection`.
    pub fn outdent(selection: Selection, indent_unit: impl Into<String>) -> Self {
        Self {
            selection,
            indent_unit: indent_unit.into(),
            outdent: true,
            tracked: Cell::new(None),
        }
    }

    fn line_span(&self) -> (usize, usize) {
        let range = self.selection.to_range();
        let mut end_line = range.end.line;
        // A selection ending at column 1 of a line does not shift that line.
        if end_line > range.start.line && range.end.column == 1 {
            end_line -= 1;
        }
        (range.start.line, end_line)
    }
}

impl EditCommand for ShiftLinesCommand {
    fn get_edit_operations(
        &self,
        buffer: &dyn TextBuffer,
        builder: &mut dyn EditOperationBuilder,
    ) -> Result<(), CommandError> {
        let (start_line, end_line) = self.line_span();
        let multi_line = end_line > start_line;

        for line in start_line..=end_line {
            let text = buffer.line_text(line);
            if self.outdent {
                let remove = if text.starts_with('\t') {
                    1
                } else {
                    let unit_len = self.indent_unit.chars().count();
                    text.chars().take(unit_len).take_while(|&c| c == ' ').count()
                };
                if remove > 0 {
                    builder.add_edit_operation(
                        TextRange::new(Position::new(line, 1), Position::new(line, 1 + remove)),
                        "",
                    );
                }
            } else {
                if multi_line && text.is_empty() {
                    continue;
                }
                builder.add_edit_operation(
                    TextRange::collapsed(Position::new(line, 1)),
                    &self.indent_unit,
                );
            }
        }

        self.tracked
            .set(Some(builder.track_selection(self.selection, None)));
        Ok(())
    }

    fn compute_cursor_state(
        &self,
        _buffer: &dyn TextBuffer,
        data: &CursorComputeData<'_>,
    ) -> Option<Selection> {
        data.tracked_selection(self.tracked.get()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OperationId;

    struct RecordingBuilder {
        operations: Vec<(TextRange, String)>,
        tracked: usize,
    }

    impl EditOperationBuilder for RecordingBuilder {
        fn add_edit_operation(&mut self, range: TextRange, text: &str) {
            self.operations.push((range, text.to_string()));
        }

        fn track_selection(
            &mut self,
            _selection: Selection,
            _stickiness_override: Option<MarkerStickiness>,
        ) -> TrackedSelectionId {
            let id = TrackedSelectionId(self.tracked);
            self.tracked += 1;
            id
        }
    }

    fn range(l1: usize, c1: usize, l2: usize, c2: usize) -> TextRange {
        TextRange::new(Position::new(l1, c1), Position::new(l2, c2))
    }

    #[test]
    fn replace_command_collapses_to_inserted_end() {
        let buffer = crate::buffer::RopeBuffer::from_text("abc");
        let command = ReplaceCommand::new(range(1, 1, 1, 2), "xy");

        let inverse = vec![InverseEditOperation {
            id: OperationId::new(0, 0),
            range: range(1, 1, 1, 3),
            text: "a".to_string(),
        }];
        let tracked = BTreeMap::new();
        let data = CursorComputeData::new(&inverse, &tracked);

        assert_eq!(
            command.compute_cursor_state(&buffer, &data),
            Some(Selection::cursor(Position::new(1, 3)))
        );
    }

    #[test]
    fn delete_command_exposes_pure_deletion_range() {
        let command = DeleteCommand::new(range(1, 4, 1, 6));
        assert_eq!(command.pure_deletion_range(), Some(range(1, 4, 1, 6)));
        assert!(ReplaceCommand::new(range(1, 4, 1, 6), "").pure_deletion_range().is_none());
    }

    #[test]
    fn outdent_skips_unindented_lines() {
        let buffer = crate::buffer::RopeBuffer::from_text("    one\ntwo\n\tthree\n");
        let command = ShiftLinesCommand::outdent(
            Selection::new(Position::new(1, 1), Position::new(3, 7)),
            "    ",
        );

        let mut builder = RecordingBuilder {
            operations: Vec::new(),
            tracked: 0,
        };
        command.get_edit_operations(&buffer, &mut builder).unwrap();

        assert_eq!(
            builder.operations,
            vec![
                (range(1, 1, 1, 5), String::new()),
                (range(3, 1, 3, 2), String::new()),
            ]
        );
    }
}
