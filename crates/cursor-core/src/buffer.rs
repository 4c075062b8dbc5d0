//! The text buffer collaborator interface and a rope-backed reference
//! implementation.
//!
//! # Overview
//!
//! The orchestration engine does not own any text. It talks to a document
//! through [`TextBuffer`]: validated position/range queries, an optional
//! editable region, sticky markers that survive edits, an atomic batch-apply
//! entry point that derives post-edit cursor state through an
//! inverse-operation callback, and the document's own undo/redo stack.
//!
//! [`RopeBuffer`] is the bundled reference implementation, backed by
//! [`ropey::Rope`]. It is what the test suite runs against and what embedders
//! can use when they do not bring their own document type.

use crate::selection::{Position, Selection, TextRange};
use ropey::Rope;
use std::collections::BTreeMap;
use thiserror::Error;

/// Identifier of one edit operation within a batch.
///
/// `major` is the index of the originating cursor, `minor` the sequence
/// number of the operation within that cursor's command. Both are scoped to
/// a single batch and carry no meaning outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId {
    /// Originating cursor index within the batch.
    pub major: usize,
    /// Operation sequence number within that cursor's command.
    pub minor: usize,
}

impl OperationId {
    /// Create a new operation identifier.
    pub fn new(major: usize, minor: usize) -> Self {
        Self { major, minor }
    }
}

/// One (range, replacement text) pair submitted to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOperation {
    /// Batch-scoped identifier of this operation.
    pub id: OperationId,
    /// The range to replace. Empty range means pure insertion.
    pub range: TextRange,
    /// The replacement text. Empty means pure deletion.
    pub text: String,
}

impl EditOperation {
    /// Whether this operation would change nothing at all.
    pub fn is_noop(&self) -> bool {
        self.range.is_empty() && self.text.is_empty()
    }
}

/// The inverse of an applied edit operation.
///
/// `range` covers the inserted text in post-edit coordinates; `text` is the
/// text the operation replaced. Applying the inverse restores the pre-edit
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseEditOperation {
    /// Identifier matching the applied operation.
    pub id: OperationId,
    /// Range of the inserted text, in post-edit coordinates.
    pub range: TextRange,
    /// The replaced text.
    pub text: String,
}

/// How a marker behaves when text is inserted exactly at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStickiness {
    /// The marker binds to the character before it and stays put.
    StickToPrevious,
    /// The marker binds to the character after it and moves past the
    /// inserted text.
    StickToNext,
}

/// Opaque handle to a sticky marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(u64);

impl MarkerId {
    /// Create a marker id from a raw value. Intended for [`TextBuffer`]
    /// implementations.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Kind of content change reported by the surrounding shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferChange {
    /// The content was replaced wholesale.
    Flush,
    /// The content received an incremental edit.
    Edited,
}

/// Errors surfaced by a [`TextBuffer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The buffer rejects all mutation.
    #[error("buffer is read-only")]
    ReadOnly,
    /// An edit operation escapes the restricted editable region.
    #[error("edit at {start:?}..{end:?} lies outside the editable region")]
    OutsideEditableRange {
        /// Start of the offending range.
        start: Position,
        /// End of the offending range.
        end: Position,
    },
    /// Two operations in one batch cover overlapping text.
    #[error("edit operations in one batch overlap")]
    OverlappingEdits,
}

/// Callback deriving post-edit cursor state from the applied batch's inverse
/// operations. Invoked exactly once per successful [`TextBuffer::apply_edits`]
/// call, after the batch has been applied and markers have been adjusted.
pub type CursorStateComputer<'a> =
    dyn FnMut(&dyn TextBuffer, &[InverseEditOperation]) -> Option<Vec<Selection>> + 'a;

/// The document collaborator, specified at its interface.
///
/// Implementations must apply [`apply_edits`](TextBuffer::apply_edits)
/// batches atomically: either every operation is applied or none is, and no
/// intermediate state is ever observable.
pub trait TextBuffer {
    /// Total line count. Always at least 1.
    fn line_count(&self) -> usize;

    /// The largest valid column on `line` (one past the last character).
    fn line_max_column(&self, line: usize) -> usize;

    /// Content of `line`, without its line terminator.
    fn line_text(&self, line: usize) -> String;

    /// Text covered by `range` (validated first).
    fn text_in_range(&self, range: TextRange) -> String;

    /// Full text content.
    fn text(&self) -> String;

    /// Clamp `pos` to the nearest valid position.
    fn validate_position(&self, pos: Position) -> Position;

    /// Clamp both ends of `range` to valid positions.
    fn validate_range(&self, range: TextRange) -> TextRange {
        TextRange::new(
            self.validate_position(range.start),
            self.validate_position(range.end),
        )
    }

    /// The region edits are restricted to, if any.
    fn editable_range(&self) -> Option<TextRange>;

    /// Whether the buffer currently rejects all mutation.
    fn is_read_only(&self) -> bool;

    /// Create a sticky marker at `pos`.
    fn add_marker(&mut self, pos: Position, stickiness: MarkerStickiness) -> MarkerId;

    /// Resolve a marker to its current position.
    fn marker_position(&self, id: MarkerId) -> Option<Position>;

    /// Remove a marker. Unknown ids are ignored.
    fn remove_marker(&mut self, id: MarkerId);

    /// Number of live markers.
    fn marker_count(&self) -> usize;

    /// Apply a batch of operations as one atomic transaction.
    ///
    /// `before_cursor_state` is recorded with the undo entry so a later
    /// [`undo`](TextBuffer::undo) can restore it. After the batch is applied,
    /// `compute_cursor_state` receives the post-edit buffer and the inverse
    /// operations (in application order); its result is recorded as the
    /// cursor state a later [`redo`](TextBuffer::redo) restores.
    fn apply_edits(
        &mut self,
        before_cursor_state: &[Selection],
        operations: Vec<EditOperation>,
        compute_cursor_state: &mut CursorStateComputer<'_>,
    ) -> Result<(), BufferError>;

    /// Close the current undo coalescing group ("push stack element").
    fn push_undo_boundary(&mut self);

    /// Undo the most recent edit group. `None` means there was nothing to
    /// undo; `Some` carries the cursor state recorded before that group
    /// (possibly empty when none was recorded).
    fn undo(&mut self) -> Option<Vec<Selection>>;

    /// Redo the most recently undone edit group. `None` means there was
    /// nothing to redo; `Some` carries the cursor state recorded after that
    /// group (possibly empty when none was recorded).
    fn redo(&mut self) -> Option<Vec<Selection>>;
}

#[derive(Debug, Clone)]
struct TextEdit {
    start_before: usize,
    start_after: usize,
    deleted_text: String,
    inserted_text: String,
}

impl TextEdit {
    fn deleted_len(&self) -> usize {
        self.deleted_text.chars().count()
    }

    fn inserted_len(&self) -> usize {
        self.inserted_text.chars().count()
    }
}

#[derive(Debug, Clone)]
struct UndoStep {
    group_id: usize,
    edits: Vec<TextEdit>,
    before_cursor_state: Vec<Selection>,
    after_cursor_state: Option<Vec<Selection>>,
}

/// Grouped undo history. Consecutive steps share a group until a boundary
/// closes it; undo/redo always moves one whole group.
#[derive(Debug)]
struct UndoHistory {
    undo_stack: Vec<UndoStep>,
    redo_stack: Vec<UndoStep>,
    max_undo: usize,
    next_group_id: usize,
    open_group_id: Option<usize>,
}

impl UndoHistory {
    fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo,
            next_group_id: 0,
            open_group_id: None,
        }
    }

    fn end_group(&mut self) {
        self.open_group_id = None;
    }

    fn push_step(&mut self, mut step: UndoStep) {
        self.redo_stack.clear();

        if self.undo_stack.len() >= self.max_undo {
            self.undo_stack.remove(0);
        }

        match self.open_group_id {
            Some(group_id) => step.group_id = group_id,
            None => {
                step.group_id = self.next_group_id;
                self.next_group_id = self.next_group_id.wrapping_add(1);
                self.open_group_id = Some(step.group_id);
            }
        }

        self.undo_stack.push(step);
    }

    fn pop_undo_group(&mut self) -> Option<Vec<UndoStep>> {
        let last_group_id = self.undo_stack.last().map(|s| s.group_id)?;
        let mut steps: Vec<UndoStep> = Vec::new();

        while let Some(step) = self.undo_stack.last() {
            if step.group_id != last_group_id {
                break;
            }
            steps.push(self.undo_stack.pop().expect("checked"));
        }

        Some(steps)
    }

    fn pop_redo_group(&mut self) -> Option<Vec<UndoStep>> {
        let last_group_id = self.redo_stack.last().map(|s| s.group_id)?;
        let mut steps: Vec<UndoStep> = Vec::new();

        while let Some(step) = self.redo_stack.last() {
            if step.group_id != last_group_id {
                break;
            }
            steps.push(self.redo_stack.pop().expect("checked"));
        }

        Some(steps)
    }
}

#[derive(Debug, Clone)]
struct MarkerRecord {
    offset: usize,
    stickiness: MarkerStickiness,
}

/// Rope-backed reference implementation of [`TextBuffer`].
///
/// # Example
///
/// ```rust
/// use cursor_core::{Position, RopeBuffer, TextBuffer};
///
/// let buffer = RopeBuffer::from_text("hello\nworld");
/// assert_eq!(buffer.line_count(), 2);
/// assert_eq!(buffer.line_max_column(1), 6);
/// assert_eq!(buffer.validate_position(Position::new(9, 9)), Position::new(2, 6));
/// ```
#[derive(Debug)]
pub struct RopeBuffer {
    rope: Rope,
    markers: BTreeMap<MarkerId, MarkerRecord>,
    next_marker_id: u64,
    editable_range: Option<TextRange>,
    read_only: bool,
    history: UndoHistory,
}

const MAX_TEXT_UNDO: usize = 1000;

impl RopeBuffer {
    /// Create a buffer from initial text.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            markers: BTreeMap::new(),
            next_marker_id: 1,
            editable_range: None,
            read_only: false,
            history: UndoHistory::new(MAX_TEXT_UNDO),
        }
    }

    /// Create an empty buffer.
    pub fn empty() -> Self {
        Self::from_text("")
    }

    /// Restrict edits to `range` (or lift the restriction with `None`).
    pub fn set_editable_range(&mut self, range: Option<TextRange>) {
        self.editable_range = range.map(|r| self.validate_range(r));
    }

    /// Toggle the read-only flag.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// The last valid position of the buffer.
    pub fn end_position(&self) -> Position {
        let line = self.line_count();
        Position::new(line, self.line_max_column(line))
    }

    fn line_char_len(&self, line_idx: usize) -> usize {
        let line = self.rope.line(line_idx);
        let mut len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && line.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        len
    }

    fn offset_of_position(&self, pos: Position) -> usize {
        let pos = self.validate_position(pos);
        self.rope.line_to_char(pos.line - 1) + (pos.column - 1)
    }

    fn position_of_offset(&self, offset: usize) -> Position {
        let offset = offset.min(self.rope.len_chars());
        let line_idx = self.rope.char_to_line(offset);
        let column = offset - self.rope.line_to_char(line_idx) + 1;
        Position::new(line_idx + 1, column)
    }

    fn adjust_markers(&mut self, start: usize, deleted_len: usize, inserted_len: usize) {
        let end = start + deleted_len;
        for marker in self.markers.values_mut() {
            let offset = marker.offset;
            if offset < start {
                continue;
            }
            if offset == start {
                if marker.stickiness == MarkerStickiness::StickToNext {
                    marker.offset = start + inserted_len;
                }
            } else if offset < end {
                // Marker inside deleted content collapses to the edit point.
                marker.offset = match marker.stickiness {
                    MarkerStickiness::StickToNext => start + inserted_len,
                    MarkerStickiness::StickToPrevious => start,
                };
            } else {
                marker.offset = offset - deleted_len + inserted_len;
            }
        }
    }

    /// Apply one raw replacement at char offsets, shifting markers.
    fn splice(&mut self, start: usize, deleted_len: usize, text: &str) {
        if deleted_len > 0 {
            self.rope.remove(start..start + deleted_len);
        }
        if !text.is_empty() {
            self.rope.insert(start, text);
        }
        self.adjust_markers(start, deleted_len, text.chars().count());
    }

    fn revert_step(&mut self, step: &UndoStep) {
        // Delete each edit's inserted text and restore the deleted text,
        // walking backwards so earlier offsets stay valid.
        let mut edits: Vec<&TextEdit> = step.edits.iter().collect();
        edits.sort_by_key(|e| std::cmp::Reverse(e.start_after));
        for edit in edits {
            self.splice(edit.start_after, edit.inserted_len(), &edit.deleted_text);
        }
    }

    fn reapply_step(&mut self, step: &UndoStep) {
        // Mirror of revert_step: offsets recorded per edit are already in
        // the coordinates at which that edit originally applied.
        let mut edits: Vec<&TextEdit> = step.edits.iter().collect();
        edits.sort_by_key(|e| std::cmp::Reverse(e.start_before));
        for edit in edits {
            self.splice(edit.start_before, edit.deleted_len(), &edit.inserted_text);
        }
    }
}

impl TextBuffer for RopeBuffer {
    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_max_column(&self, line: usize) -> usize {
        let line = line.clamp(1, self.line_count());
        self.line_char_len(line - 1) + 1
    }

    fn line_text(&self, line: usize) -> String {
        let line = line.clamp(1, self.line_count());
        let len = self.line_char_len(line - 1);
        self.rope.line(line - 1).slice(..len).to_string()
    }

    fn text_in_range(&self, range: TextRange) -> String {
        let range = self.validate_range(range);
        let start = self.offset_of_position(range.start);
        let end = self.offset_of_position(range.end);
        self.rope.slice(start..end).to_string()
    }

    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn validate_position(&self, pos: Position) -> Position {
        let line = pos.line.clamp(1, self.line_count());
        let column = pos.column.clamp(1, self.line_char_len(line - 1) + 1);
        Position::new(line, column)
    }

    fn editable_range(&self) -> Option<TextRange> {
        self.editable_range
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn add_marker(&mut self, pos: Position, stickiness: MarkerStickiness) -> MarkerId {
        let id = MarkerId::new(self.next_marker_id);
        self.next_marker_id += 1;
        let offset = self.offset_of_position(pos);
        self.markers.insert(id, MarkerRecord { offset, stickiness });
        id
    }

    fn marker_position(&self, id: MarkerId) -> Option<Position> {
        self.markers
            .get(&id)
            .map(|record| self.position_of_offset(record.offset))
    }

    fn remove_marker(&mut self, id: MarkerId) {
        self.markers.remove(&id);
    }

    fn marker_count(&self) -> usize {
        self.markers.len()
    }

    fn apply_edits(
        &mut self,
        before_cursor_state: &[Selection],
        operations: Vec<EditOperation>,
        compute_cursor_state: &mut CursorStateComputer<'_>,
    ) -> Result<(), BufferError> {
        if self.read_only {
            return Err(BufferError::ReadOnly);
        }

        struct OffsetOp {
            id: OperationId,
            start: usize,
            end: usize,
            text: String,
        }

        // Validate the whole batch before touching the rope: rejection must
        // leave the buffer byte-identical.
        let mut ops: Vec<OffsetOp> = Vec::with_capacity(operations.len());
        for op in operations {
            let range = self.validate_range(op.range);
            if let Some(editable) = self.editable_range {
                if !editable.contains_range(range) {
                    return Err(BufferError::OutsideEditableRange {
                        start: range.start,
                        end: range.end,
                    });
                }
            }
            ops.push(OffsetOp {
                id: op.id,
                start: self.offset_of_position(range.start),
                end: self.offset_of_position(range.end),
                text: op.text,
            });
        }

        ops.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));
        for pair in ops.windows(2) {
            if pair[0].end > pair[1].start {
                return Err(BufferError::OverlappingEdits);
            }
        }

        let mut edits: Vec<TextEdit> = Vec::with_capacity(ops.len());
        let mut applied: Vec<(OperationId, usize, usize, String)> = Vec::with_capacity(ops.len());
        let mut delta: isize = 0;

        for op in ops {
            let start = (op.start as isize + delta) as usize;
            let deleted_len = op.end - op.start;
            let deleted_text = self.rope.slice(start..start + deleted_len).to_string();
            let inserted_len = op.text.chars().count();

            self.splice(start, deleted_len, &op.text);

            applied.push((op.id, start, start + inserted_len, deleted_text.clone()));
            edits.push(TextEdit {
                start_before: op.start,
                start_after: start,
                deleted_text,
                inserted_text: op.text,
            });
            delta += inserted_len as isize - deleted_len as isize;
        }

        let inverse: Vec<InverseEditOperation> = applied
            .into_iter()
            .map(|(id, start, end, text)| InverseEditOperation {
                id,
                range: TextRange::new(
                    self.position_of_offset(start),
                    self.position_of_offset(end),
                ),
                text,
            })
            .collect();

        let after_cursor_state = compute_cursor_state(&*self, &inverse);

        self.history.push_step(UndoStep {
            group_id: 0,
            edits,
            before_cursor_state: before_cursor_state.to_vec(),
            after_cursor_state,
        });

        Ok(())
    }

    fn push_undo_boundary(&mut self) {
        self.history.end_group();
    }

    fn undo(&mut self) -> Option<Vec<Selection>> {
        let steps = self.history.pop_undo_group()?;
        for step in &steps {
            self.revert_step(step);
        }
        // Steps arrive newest-first; pushing in that order makes the redo
        // stack pop them oldest-first.
        let restore = steps.last().map(|s| s.before_cursor_state.clone());
        for step in steps {
            self.history.redo_stack.push(step);
        }
        self.history.end_group();
        Some(restore.unwrap_or_default())
    }

    fn redo(&mut self) -> Option<Vec<Selection>> {
        let steps = self.history.pop_redo_group()?;
        for step in &steps {
            self.reapply_step(step);
        }
        let restore = steps.last().and_then(|s| s.after_cursor_state.clone());
        for step in steps {
            self.history.undo_stack.push(step);
        }
        self.history.end_group();
        Some(restore.unwrap_or_default())
    }
}
