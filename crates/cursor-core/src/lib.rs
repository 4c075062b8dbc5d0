#![warn(missing_docs)]
//! Cursor Core - Headless Multi-Cursor Orchestration Engine
//!
//! # Overview
//!
//! `cursor-core` coordinates multiple simultaneous cursors/selections inside
//! a text buffer. It translates editing intents (move, type, delete, paste,
//! select) into batches of text edits, resolves conflicts when several
//! cursors' edits overlap, and derives each cursor's post-edit position from
//! the buffer's edit-inversion feedback. It owns no text and renders
//! nothing: the document and the view are collaborators specified at their
//! interfaces ([`TextBuffer`], [`ViewLayer`]).
//!
//! # Core Features
//!
//! - **Multi-Cursor Set**: one primary plus N secondary cursors, with
//!   idempotent merge/cull normalization
//! - **Conflict-Resolved Batch Edits**: deterministic loser-cursor
//!   resolution; a batch either applies atomically or leaves no trace
//! - **Selection Recovery**: tracked selections survive edits on sticky
//!   markers; inverse operations drive post-edit cursor placement
//! - **Transactions**: one handler invocation at a time, with change
//!   detection, typed outbound events, and reveal/scroll requests
//! - **Cursor-Position Undo**: a bounded stack of selection snapshots,
//!   independent of the buffer's text undo
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Transaction Orchestrator (CursorController)│  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Intent Resolvers (CursorIntent -> outcome) │  ← Gesture vocabulary
//! ├─────────────────────────────────────────────┤
//! │  Command Execution Engine (conflicts, apply)│  ← Batch edits
//! ├─────────────────────────────────────────────┤
//! │  Cursor Set (normalize, coordinate spaces)  │  ← Cursor state
//! ├─────────────────────────────────────────────┤
//! │  TextBuffer / ViewLayer collaborators       │  ← External interfaces
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use cursor_core::{
//!     CollectingEventSink, CursorConfig, CursorController, CursorIntent, IdentityView, Position,
//!     RopeBuffer, Selection, TextBuffer,
//! };
//!
//! let mut controller = CursorController::new(
//!     Box::new(RopeBuffer::from_text("one\ntwo\nthree\n")),
//!     Box::new(IdentityView),
//!     CursorConfig::default(),
//! );
//! let mut sink = CollectingEventSink::default();
//!
//! // Put a caret on each of the first two lines and type.
//! controller.dispatch(
//!     &mut sink,
//!     CursorIntent::SetSelections {
//!         selections: vec![
//!             Selection::cursor(Position::new(1, 1)),
//!             Selection::cursor(Position::new(2, 1)),
//!         ],
//!     },
//!     "quickstart",
//! );
//! controller.dispatch(
//!     &mut sink,
//!     CursorIntent::Type { text: "# ".to_string() },
//!     "quickstart",
//! );
//!
//! assert_eq!(controller.buffer().text(), "# one\n# two\nthree\n");
//! assert_eq!(controller.cursor_count(), 2);
//! ```
//!
//! # Module Description
//!
//! - [`selection`] - positions, ranges, directed selections
//! - [`buffer`] - the [`TextBuffer`] interface and the bundled [`RopeBuffer`]
//! - [`view`] - the [`ViewLayer`] interface and the identity mapping
//! - [`cursor`] - [`Cursor`], [`CursorSet`], persisted state
//! - [`intents`] - the [`CursorIntent`] vocabulary and pure resolvers
//! - [`command`] - the [`EditCommand`] trait and concrete commands
//! - [`executor`] - conflict resolution and atomic batch execution
//! - [`undo_stack`] - the bounded cursor-position undo stack
//! - [`events`] - typed outbound events ([`CursorEventSink`])
//! - [`controller`] - the transaction orchestrator ([`CursorController`])

pub mod buffer;
pub mod command;
pub mod controller;
pub mod cursor;
pub mod events;
pub mod executor;
pub mod intents;
pub mod selection;
pub mod undo_stack;
pub mod view;

pub use buffer::{
    BufferChange, BufferError, CursorStateComputer, EditOperation, InverseEditOperation, MarkerId,
    MarkerStickiness, OperationId, RopeBuffer, TextBuffer,
};
pub use command::{
    CommandError, CursorComputeData, DeleteCommand, EditCommand, EditOperationBuilder,
    ReplaceCommand, ReplaceKeepSelection, ShiftLinesCommand, TrackedSelectionId,
};
pub use controller::{CursorConfig, CursorController, EngineError};
pub use cursor::{Cursor, CursorSet, SerializedCursorState, SerializedPosition};
pub use events::{
    ChangeReason, CollectingEventSink, CursorEvent, CursorEventSink, NullEventSink,
    PositionChangedEvent, RevealRangeEvent, RevealStyle, ScrollRequestEvent,
    SelectionChangedEvent,
};
pub use executor::{AbandonReason, ExecuteOutcome, execute_commands};
pub use intents::{
    CursorIntent, EditOutcome, ResolveContext, ResolvedIntent, paste_outcome, resolve,
};
pub use selection::{Position, Selection, SelectionDirection, TextRange};
pub use undo_stack::{CursorPositionSnapshot, CursorPositionUndoStack};
pub use view::{IdentityView, ViewLayer};
