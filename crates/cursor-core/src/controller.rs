//! The transaction orchestrator.
//!
//! # Overview
//!
//! [`CursorController`] wraps every externally triggered operation in a
//! transaction: it validates and normalizes the cursor set, snapshots the
//! pre-operation state, runs the intent (which may execute zero or more
//! edit batches through the command execution engine), compares old and new
//! state, maintains the cursor-position undo stack, and emits change
//! notifications through the caller's [`CursorEventSink`].
//!
//! Exactly one operation is active at a time: re-entrant dispatch is
//! rejected, and the buffer-change recompute path is suppressed while a
//! handler runs, preventing reentrant feedback. Any failure inside an
//! operation is caught at this boundary, reported, and treated as "nothing
//! changed".
//!
//! # Example
//!
//! ```rust
//! use cursor_core::{
//!     CollectingEventSink, CursorConfig, CursorController, CursorIntent, IdentityView, Position,
//!     RopeBuffer, TextBuffer,
//! };
//!
//! let buffer = RopeBuffer::from_text("hello world\n");
//! let mut controller = CursorController::new(
//!     Box::new(buffer),
//!     Box::new(IdentityView),
//!     CursorConfig::default(),
//! );
//!
//! let mut sink = CollectingEventSink::default();
//! controller.dispatch(&mut sink, CursorIntent::MoveRight { select: false }, "example");
//! assert_eq!(controller.primary_position(), Position::new(1, 2));
//!
//! controller.dispatch(
//!     &mut sink,
//!     CursorIntent::Type { text: "!".to_string() },
//!     "example",
//! );
//! assert_eq!(controller.buffer().text(), "h!ello world\n");
//! ```

use crate::buffer::{BufferChange, BufferError, TextBuffer};
use crate::command::EditCommand;
use crate::cursor::{CursorSet, SerializedCursorState};
use crate::events::{
    ChangeReason, CursorEventSink, PositionChangedEvent, RevealRangeEvent, RevealStyle,
    ScrollRequestEvent, SelectionChangedEvent,
};
use crate::executor::{AbandonReason, ExecuteOutcome, execute_commands};
use crate::intents::{
    CursorIntent, EditOutcome, ResolveContext, ResolvedIntent, paste_outcome, resolve,
};
use crate::selection::{Position, Selection, TextRange};
use crate::undo_stack::{CursorPositionSnapshot, CursorPositionUndoStack};
use crate::view::ViewLayer;
use thiserror::Error;
use tracing::warn;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct CursorConfig {
    /// Capacity of the cursor-position undo stack.
    pub cursor_undo_limit: usize,
    /// Hard cap on the number of cursors.
    pub secondary_cursor_limit: usize,
    /// Indent unit used by Tab/Indent/Outdent.
    pub indent_unit: String,
    /// Distribute a paste with one line per cursor across the cursors.
    pub distribute_paste: bool,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            cursor_undo_limit: 50,
            secondary_cursor_limit: 10_000,
            indent_unit: "    ".to_string(),
            distribute_paste: true,
        }
    }
}

/// Failure surfaced at the transaction boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The buffer rejected an edit batch at apply time.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

#[derive(Debug, Clone, Copy)]
enum RevealSubject {
    Primary,
    TopMost,
    BottomMost,
    Range(TextRange),
}

#[derive(Debug, Clone, Copy)]
struct RevealRequest {
    subject: RevealSubject,
    style: RevealStyle,
    horizontal: bool,
}

impl RevealRequest {
    fn primary() -> Self {
        Self {
            subject: RevealSubject::Primary,
            style: RevealStyle::Simple,
            horizontal: true,
        }
    }
}

/// Immutable record of what one handler invocation did; folded into events
/// and undo bookkeeping by [`CursorController::dispatch`].
struct HandlerOutcome {
    executed_commands: bool,
    reveal: Option<RevealRequest>,
    scroll: Option<isize>,
}

impl HandlerOutcome {
    fn state_change() -> Self {
        Self {
            executed_commands: false,
            reveal: Some(RevealRequest::primary()),
            scroll: None,
        }
    }

    fn nothing() -> Self {
        Self {
            executed_commands: false,
            reveal: None,
            scroll: None,
        }
    }
}

/// The multi-cursor engine: cursor set, transaction state machine, and
/// cursor-position undo, layered over an external [`TextBuffer`] and
/// [`ViewLayer`].
pub struct CursorController {
    buffer: Box<dyn TextBuffer>,
    view: Box<dyn ViewLayer>,
    cursors: CursorSet,
    config: CursorConfig,
    undo_stack: CursorPositionUndoStack,
    is_handling: bool,
}

impl CursorController {
    /// Create a controller with a single caret at the buffer start.
    pub fn new(
        buffer: Box<dyn TextBuffer>,
        view: Box<dyn ViewLayer>,
        config: CursorConfig,
    ) -> Self {
        let cursors = CursorSet::new(buffer.as_ref(), view.as_ref());
        let undo_stack = CursorPositionUndoStack::new(config.cursor_undo_limit);
        Self {
            buffer,
            view,
            cursors,
            config,
            undo_stack,
            is_handling: false,
        }
    }

    /// The buffer collaborator.
    pub fn buffer(&self) -> &dyn TextBuffer {
        self.buffer.as_ref()
    }

    /// Mutable access to the buffer collaborator. External mutation should
    /// be followed by [`on_buffer_changed`](Self::on_buffer_changed).
    pub fn buffer_mut(&mut self) -> &mut dyn TextBuffer {
        self.buffer.as_mut()
    }

    /// The primary selection (buffer space).
    pub fn primary_selection(&self) -> Selection {
        self.cursors.primary().selection()
    }

    /// The primary cursor position (buffer space).
    pub fn primary_position(&self) -> Position {
        self.cursors.primary().position()
    }

    /// All selections, primary first (buffer space).
    pub fn selections(&self) -> Vec<Selection> {
        self.cursors.selections()
    }

    /// All view-space selections, primary first.
    pub fn view_selections(&self) -> Vec<Selection> {
        self.cursors.view_selections()
    }

    /// All cursor positions, primary first (buffer space).
    pub fn positions(&self) -> Vec<Position> {
        self.cursors.positions()
    }

    /// Number of active cursors.
    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Depth of the cursor-position undo stack.
    pub fn cursor_undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Run one gesture. Returns whether any edit commands were executed.
    ///
    /// Events are emitted into `sink` only when the operation observably
    /// changed the cursor state (reveal and scroll requests are emitted
    /// whenever the intent asks for them).
    pub fn dispatch(
        &mut self,
        sink: &mut dyn CursorEventSink,
        intent: CursorIntent,
        source: &str,
    ) -> bool {
        let reason = match &intent {
            CursorIntent::Paste { .. } => ChangeReason::Paste,
            CursorIntent::Undo => ChangeReason::Undo,
            CursorIntent::Redo => ChangeReason::Redo,
            _ => ChangeReason::Explicit,
        };
        self.dispatch_with_reason(sink, intent, source, reason)
    }

    fn dispatch_with_reason(
        &mut self,
        sink: &mut dyn CursorEventSink,
        intent: CursorIntent,
        source: &str,
        reason: ChangeReason,
    ) -> bool {
        if self.is_handling {
            warn!(source, "rejecting re-entrant cursor operation");
            return false;
        }
        self.is_handling = true;
        let executed = self.handle(sink, intent, source, reason);
        self.is_handling = false;
        executed
    }

    fn handle(
        &mut self,
        sink: &mut dyn CursorEventSink,
        intent: CursorIntent,
        source: &str,
        reason: ChangeReason,
    ) -> bool {
        self.cursors
            .ensure_valid_state(self.buffer.as_ref(), self.view.as_ref());
        self.cursors.normalize();

        let old_selections = self.cursors.selections();
        let old_view_selections = self.cursors.view_selections();
        let snapshot = CursorPositionSnapshot {
            selections: old_selections.clone(),
            view_selections: old_view_selections.clone(),
        };
        let is_cursor_undo = matches!(intent, CursorIntent::CursorUndo);

        let outcome = match self.run_intent(&intent) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, source, "cursor operation failed; treated as no change");
                return false;
            }
        };
        self.cursors.normalize();

        let changed = self.cursors.selections() != old_selections
            || self.cursors.view_selections() != old_view_selections;

        // Text undo supersedes cursor undo from the moment an edit runs;
        // the pre-edit snapshot pushed right after stays reachable.
        if outcome.executed_commands {
            self.undo_stack.clear();
        }
        if changed {
            if !is_cursor_undo {
                self.undo_stack.push(snapshot);
            }
            self.emit_position_changed(sink, source, reason);
            self.emit_selection_changed(sink, source, reason);
        }
        if let Some(request) = outcome.reveal {
            self.emit_reveal(sink, request, source);
        }
        if let Some(lines) = outcome.scroll {
            sink.scroll_request(&ScrollRequestEvent {
                lines,
                source: source.to_string(),
            });
        }

        outcome.executed_commands
    }

    fn run_intent(&mut self, intent: &CursorIntent) -> Result<HandlerOutcome, EngineError> {
        use CursorIntent::*;

        match intent {
            MoveTo { position, select } => {
                let primary = self.cursors.primary().selection();
                let target = self.buffer.validate_position(*position);
                let selection = if *select {
                    primary.with_active(target)
                } else {
                    Selection::cursor(target)
                };
                self.cursors
                    .set_selections(self.buffer.as_ref(), self.view.as_ref(), &[selection]);
                Ok(HandlerOutcome::state_change())
            }
            AddCursorAbove => Ok(self.add_cursor_vertically(-1)),
            AddCursorBelow => Ok(self.add_cursor_vertically(1)),
            AddCursorAt { position } => {
                if self.cursors.len() >= self.config.secondary_cursor_limit {
                    warn!(limit = self.config.secondary_cursor_limit, "cursor limit reached");
                    return Ok(HandlerOutcome::nothing());
                }
                let selection = Selection::cursor(self.buffer.validate_position(*position));
                self.cursors
                    .add_secondary_cursor(self.buffer.as_ref(), self.view.as_ref(), selection);
                Ok(HandlerOutcome::state_change())
            }
            ColumnSelect { anchor, active } => {
                self.apply_column_select(*anchor, *active);
                Ok(HandlerOutcome::state_change())
            }
            SelectAll => {
                let last = self.buffer.line_count();
                let selection = Selection::new(
                    Position::MIN,
                    Position::new(last, self.buffer.line_max_column(last)),
                );
                self.cursors
                    .set_selections(self.buffer.as_ref(), self.view.as_ref(), &[selection]);
                // Select-all is not a reveal gesture.
                Ok(HandlerOutcome {
                    reveal: None,
                    ..HandlerOutcome::state_change()
                })
            }
            SetSelections { selections } => {
                if selections.is_empty() {
                    return Ok(HandlerOutcome::nothing());
                }
                self.cursors
                    .set_selections(self.buffer.as_ref(), self.view.as_ref(), selections);
                Ok(HandlerOutcome::state_change())
            }
            KillSecondaryCursors => {
                self.cursors.kill_secondary_cursors();
                Ok(HandlerOutcome::state_change())
            }
            Paste { text } => self.apply_paste(text),
            Undo => {
                let restored = self.buffer.undo();
                Ok(self.finish_history_jump(restored))
            }
            Redo => {
                let restored = self.buffer.redo();
                Ok(self.finish_history_jump(restored))
            }
            CursorUndo => {
                let Some(snapshot) = self.undo_stack.pop() else {
                    return Ok(HandlerOutcome::nothing());
                };
                self.cursors.set_selections_with_view(
                    self.buffer.as_ref(),
                    self.view.as_ref(),
                    &snapshot.selections,
                    &snapshot.view_selections,
                );
                Ok(HandlerOutcome::state_change())
            }
            RevealLine { line } => {
                let line = (*line).clamp(1, self.buffer.line_count());
                let range = TextRange::new(
                    Position::new(line, 1),
                    Position::new(line, self.buffer.line_max_column(line)),
                );
                Ok(HandlerOutcome {
                    executed_commands: false,
                    reveal: Some(RevealRequest {
                        subject: RevealSubject::Range(range),
                        style: RevealStyle::Simple,
                        horizontal: false,
                    }),
                    scroll: None,
                })
            }
            Scroll { lines } => Ok(HandlerOutcome {
                executed_commands: false,
                reveal: None,
                scroll: Some(*lines),
            }),
            _ => self.run_per_cursor(intent),
        }
    }

    /// Resolve a per-cursor intent across the whole set and either apply
    /// the new states or execute the collected edit commands.
    fn run_per_cursor(&mut self, intent: &CursorIntent) -> Result<HandlerOutcome, EngineError> {
        let selections = self.cursors.selections();
        let mut states: Vec<Selection> = Vec::with_capacity(selections.len());
        let mut edits: Vec<Option<EditOutcome>> = Vec::with_capacity(selections.len());
        let mut any_edit = false;

        {
            let ctx = ResolveContext {
                buffer: self.buffer.as_ref(),
                indent_unit: &self.config.indent_unit,
            };
            for &selection in &selections {
                match resolve(&ctx, selection, intent) {
                    Some(ResolvedIntent::NewState(state)) => {
                        states.push(state);
                        edits.push(None);
                    }
                    Some(ResolvedIntent::Edit(outcome)) => {
                        any_edit = true;
                        states.push(selection);
                        edits.push(Some(outcome));
                    }
                    None => {
                        states.push(selection);
                        edits.push(None);
                    }
                }
            }
        }

        if !any_edit {
            self.cursors
                .set_selections(self.buffer.as_ref(), self.view.as_ref(), &states);
            return Ok(HandlerOutcome::state_change());
        }

        self.interpret_edits(edits)
    }

    /// Interpret a pending per-cursor edit list: open/close undo boundaries
    /// as requested and run the command execution engine. The pending list
    /// is consumed here, so repeated interpretation is impossible by
    /// construction.
    fn interpret_edits(
        &mut self,
        outcomes: Vec<Option<EditOutcome>>,
    ) -> Result<HandlerOutcome, EngineError> {
        if outcomes.iter().all(|o| o.is_none()) {
            return Ok(HandlerOutcome::nothing());
        }

        // Automatic-whitespace edits never open or close boundaries, so
        // they coalesce with surrounding edits in the text undo history.
        let auto_whitespace_only = outcomes
            .iter()
            .flatten()
            .all(|o| o.is_auto_whitespace_edit);
        let push_before = !auto_whitespace_only
            && outcomes
                .iter()
                .flatten()
                .any(|o| o.should_push_stack_element_before);
        let push_after = !auto_whitespace_only
            && outcomes
                .iter()
                .flatten()
                .any(|o| o.should_push_stack_element_after);
        let reveal_horizontal = outcomes
            .iter()
            .flatten()
            .all(|o| o.should_reveal_horizontal);

        let selections = self.cursors.selections();
        let commands: Vec<Option<Box<dyn EditCommand>>> = outcomes
            .into_iter()
            .map(|outcome| outcome.map(|o| o.command))
            .collect();

        if push_before {
            self.buffer.push_undo_boundary();
        }

        let executed = match execute_commands(self.buffer.as_mut(), &selections, commands) {
            ExecuteOutcome::Executed { selections } => {
                self.cursors
                    .set_selections(self.buffer.as_ref(), self.view.as_ref(), &selections);
                true
            }
            ExecuteOutcome::NothingExecuted => false,
            ExecuteOutcome::Abandoned(AbandonReason::BufferRejected(error)) => {
                return Err(error.into());
            }
            // Already reported by the engine; the batch left no trace.
            ExecuteOutcome::Abandoned(_) => false,
        };

        if push_after {
            self.buffer.push_undo_boundary();
        }

        Ok(HandlerOutcome {
            executed_commands: executed,
            reveal: Some(RevealRequest {
                subject: RevealSubject::Primary,
                style: RevealStyle::Simple,
                horizontal: reveal_horizontal,
            }),
            scroll: None,
        })
    }

    fn finish_history_jump(&mut self, restored: Option<Vec<Selection>>) -> HandlerOutcome {
        match restored {
            None => HandlerOutcome::nothing(),
            Some(selections) => {
                if selections.is_empty() {
                    // History carried no cursor state; fall back to
                    // re-validating what we have against the new content.
                    self.cursors
                        .ensure_valid_state(self.buffer.as_ref(), self.view.as_ref());
                } else {
                    self.cursors.set_selections(
                        self.buffer.as_ref(),
                        self.view.as_ref(),
                        &selections,
                    );
                }
                HandlerOutcome {
                    executed_commands: true,
                    reveal: Some(RevealRequest::primary()),
                    scroll: None,
                }
            }
        }
    }

    fn add_cursor_vertically(&mut self, delta: isize) -> HandlerOutcome {
        if self.cursors.len() >= self.config.secondary_cursor_limit {
            warn!(limit = self.config.secondary_cursor_limit, "cursor limit reached");
            return HandlerOutcome::nothing();
        }

        let from = self.cursors.all()[self.cursors.last_added_cursor_index()].position();
        let line = if delta < 0 {
            if from.line == 1 {
                return HandlerOutcome::nothing();
            }
            from.line - 1
        } else {
            if from.line >= self.buffer.line_count() {
                return HandlerOutcome::nothing();
            }
            from.line + 1
        };

        let target = self
            .buffer
            .validate_position(Position::new(line, from.column));
        self.cursors.add_secondary_cursor(
            self.buffer.as_ref(),
            self.view.as_ref(),
            Selection::cursor(target),
        );

        HandlerOutcome {
            executed_commands: false,
            reveal: Some(RevealRequest {
                subject: if delta < 0 {
                    RevealSubject::TopMost
                } else {
                    RevealSubject::BottomMost
                },
                style: RevealStyle::Simple,
                horizontal: true,
            }),
            scroll: None,
        }
    }

    fn apply_column_select(&mut self, anchor: Position, active: Position) {
        let anchor = self.buffer.validate_position(anchor);
        let active = self.buffer.validate_position(active);
        let top = anchor.line.min(active.line);
        let bottom = anchor.line.max(active.line);

        let mut selections: Vec<Selection> = Vec::with_capacity(bottom - top + 1);
        for line in top..=bottom {
            let a = self
                .buffer
                .validate_position(Position::new(line, anchor.column));
            let b = self
                .buffer
                .validate_position(Position::new(line, active.column));
            selections.push(Selection::new(a, b));
        }

        // The selection on the active line is primary.
        let primary_index = active.line - top;
        let primary = selections.remove(primary_index);
        let mut ordered = vec![primary];
        ordered.extend(selections);

        self.cursors
            .set_selections(self.buffer.as_ref(), self.view.as_ref(), &ordered);
    }

    fn apply_paste(&mut self, text: &str) -> Result<HandlerOutcome, EngineError> {
        let selections = self.cursors.selections();
        let lines = split_paste_lines(text);
        let distribute = self.config.distribute_paste
            && selections.len() > 1
            && lines.len() == selections.len();

        let mut outcomes: Vec<Option<EditOutcome>> = (0..selections.len()).map(|_| None).collect();
        if distribute {
            // The i-th cursor in buffer-position order receives the i-th
            // pasted line.
            for (i, &cursor_index) in self.cursors.sorted_indices_by_position().iter().enumerate()
            {
                outcomes[cursor_index] = Some(paste_outcome(selections[cursor_index], &lines[i]));
            }
        } else {
            for (i, &selection) in selections.iter().enumerate() {
                outcomes[i] = Some(paste_outcome(selection, text));
            }
        }

        self.interpret_edits(outcomes)
    }

    fn emit_position_changed(
        &self,
        sink: &mut dyn CursorEventSink,
        source: &str,
        reason: ChangeReason,
    ) {
        let positions = self.cursors.positions();
        sink.position_changed(&PositionChangedEvent {
            position: positions[0],
            secondary_positions: positions[1..].to_vec(),
            source: source.to_string(),
            reason,
        });
    }

    fn emit_selection_changed(
        &self,
        sink: &mut dyn CursorEventSink,
        source: &str,
        reason: ChangeReason,
    ) {
        let selections = self.cursors.selections();
        sink.selection_changed(&SelectionChangedEvent {
            selection: selections[0],
            secondary_selections: selections[1..].to_vec(),
            source: source.to_string(),
            reason,
        });
    }

    fn emit_reveal(&self, sink: &mut dyn CursorEventSink, request: RevealRequest, source: &str) {
        let (range, view_range, explicit_target) = match request.subject {
            RevealSubject::Primary => {
                let cursor = self.cursors.primary();
                (
                    TextRange::collapsed(cursor.selection().active),
                    TextRange::collapsed(cursor.view_selection().active),
                    false,
                )
            }
            RevealSubject::TopMost => {
                let order = self.cursors.sorted_indices_by_position();
                let cursor = &self.cursors.all()[order[0]];
                (
                    TextRange::collapsed(cursor.selection().active),
                    TextRange::collapsed(cursor.view_selection().active),
                    true,
                )
            }
            RevealSubject::BottomMost => {
                let order = self.cursors.sorted_indices_by_position();
                let cursor = &self.cursors.all()[*order.last().expect("non-empty cursor set")];
                (
                    TextRange::collapsed(cursor.selection().active),
                    TextRange::collapsed(cursor.view_selection().active),
                    true,
                )
            }
            RevealSubject::Range(range) => {
                let view_range = TextRange::new(
                    self.view
                        .buffer_to_view_position(self.buffer.as_ref(), range.start),
                    self.view
                        .buffer_to_view_position(self.buffer.as_ref(), range.end),
                );
                (range, view_range, true)
            }
        };

        // With several active cursors and no explicit target there is no
        // single meaningful vertical scroll destination.
        let vertical = if self.cursors.len() > 1 && !explicit_target {
            None
        } else {
            Some(request.style)
        };

        sink.reveal_range(&RevealRangeEvent {
            range,
            view_range,
            vertical,
            reveal_horizontal: request.horizontal,
            source: source.to_string(),
        });
    }

    /// React to an external buffer change. Suppressed while a handler is
    /// active (the engine already accounts for its own edits).
    pub fn on_buffer_changed(
        &mut self,
        sink: &mut dyn CursorEventSink,
        change: BufferChange,
        source: &str,
    ) {
        if self.is_handling {
            return;
        }
        self.is_handling = true;

        let old_selections = self.cursors.selections();
        let old_view_selections = self.cursors.view_selections();

        let reason = match change {
            BufferChange::Flush => {
                // Content replaced wholesale: rebuild cursors from the old
                // positions, clamped to the new content.
                let selections = self.cursors.selections();
                self.cursors.set_selections(
                    self.buffer.as_ref(),
                    self.view.as_ref(),
                    &selections,
                );
                ChangeReason::ContentFlush
            }
            BufferChange::Edited => {
                self.cursors
                    .ensure_valid_state(self.buffer.as_ref(), self.view.as_ref());
                ChangeReason::RecoveredFromMarkers
            }
        };
        self.cursors.normalize();

        if self.cursors.selections() != old_selections
            || self.cursors.view_selections() != old_view_selections
        {
            self.emit_position_changed(sink, source, reason);
            self.emit_selection_changed(sink, source, reason);
        }

        self.is_handling = false;
    }

    /// Persist the cursor set.
    pub fn save_state(&self) -> Vec<SerializedCursorState> {
        self.cursors
            .selections()
            .iter()
            .map(|&sel| SerializedCursorState::from_selection(sel))
            .collect()
    }

    /// Restore a persisted cursor set. Missing fields default per
    /// [`SerializedCursorState`]; an empty list resets to a single caret at
    /// the buffer start.
    pub fn restore_state(
        &mut self,
        sink: &mut dyn CursorEventSink,
        states: &[SerializedCursorState],
        source: &str,
    ) {
        let mut selections: Vec<Selection> =
            states.iter().map(|state| state.to_selection()).collect();
        if selections.is_empty() {
            selections.push(Selection::cursor(Position::MIN));
        }
        self.dispatch_with_reason(
            sink,
            CursorIntent::SetSelections { selections },
            source,
            ChangeReason::NotSet,
        );
    }

    /// Persist the cursor set as JSON.
    pub fn save_state_json(&self) -> String {
        serde_json::to_string(&self.save_state()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Restore a cursor set persisted with
    /// [`save_state_json`](Self::save_state_json).
    pub fn restore_state_json(
        &mut self,
        sink: &mut dyn CursorEventSink,
        json: &str,
        source: &str,
    ) -> Result<(), serde_json::Error> {
        let states: Vec<SerializedCursorState> = serde_json::from_str(json)?;
        self.restore_state(sink, &states, source);
        Ok(())
    }
}

/// Split pasted text into lines for distribution: one trailing newline is
/// ignored, `\r\n` terminators are tolerated.
fn split_paste_lines(text: &str) -> Vec<String> {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    trimmed
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_paste_lines_ignores_one_trailing_newline() {
        assert_eq!(split_paste_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_paste_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_paste_lines("plain"), vec!["plain"]);
        assert_eq!(split_paste_lines("a\n\n"), vec!["a", ""]);
    }
}
