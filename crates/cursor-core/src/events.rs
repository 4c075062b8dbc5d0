//! Outbound event surface.
//!
//! The engine never needs publish/subscribe internally; it makes a single
//! outbound call per event kind through [`CursorEventSink`]. The surrounding
//! shell implements the sink (or consumes [`CollectingEventSink`] in tests)
//! and wires the notifications into its own rendering and scrolling.

use crate::selection::{Position, Selection, TextRange};

/// Why the cursor state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// No reason recorded.
    NotSet,
    /// An explicit user/API gesture.
    Explicit,
    /// A paste operation.
    Paste,
    /// Text undo.
    Undo,
    /// Text redo.
    Redo,
    /// The buffer content was replaced wholesale.
    ContentFlush,
    /// Selections were re-derived from sticky markers / re-validation after
    /// an incremental external edit.
    RecoveredFromMarkers,
}

/// How the view should bring the revealed range into sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStyle {
    /// Scroll as little as possible.
    Simple,
    /// Center the revealed range.
    Center,
    /// Center only when the range is outside the viewport.
    CenterIfOutsideViewport,
}

/// Primary and secondary cursor positions changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionChangedEvent {
    /// New primary cursor position (buffer space).
    pub position: Position,
    /// New secondary cursor positions (buffer space).
    pub secondary_positions: Vec<Position>,
    /// Tag identifying who triggered the change.
    pub source: String,
    /// Why the change happened.
    pub reason: ChangeReason,
}

/// Primary and secondary selections changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChangedEvent {
    /// New primary selection (buffer space).
    pub selection: Selection,
    /// New secondary selections (buffer space).
    pub secondary_selections: Vec<Selection>,
    /// Tag identifying who triggered the change.
    pub source: String,
    /// Why the change happened.
    pub reason: ChangeReason,
}

/// Request to scroll a range into visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealRangeEvent {
    /// The range to reveal, in buffer space.
    pub range: TextRange,
    /// The same range in view space.
    pub view_range: TextRange,
    /// Vertical reveal style. `None` means the vertical reveal is
    /// suppressed and only the horizontal component applies.
    pub vertical: Option<RevealStyle>,
    /// Whether the view should also scroll horizontally.
    pub reveal_horizontal: bool,
    /// Tag identifying who triggered the request.
    pub source: String,
}

/// Request to scroll the view by a number of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRequestEvent {
    /// Lines to scroll; positive scrolls down.
    pub lines: isize,
    /// Tag identifying who triggered the request.
    pub source: String,
}

/// One outbound call per event kind. All methods default to no-ops so a
/// shell only implements what it consumes.
pub trait CursorEventSink {
    /// Cursor positions changed.
    fn position_changed(&mut self, _event: &PositionChangedEvent) {}

    /// Selections changed.
    fn selection_changed(&mut self, _event: &SelectionChangedEvent) {}

    /// A range should be scrolled into visibility.
    fn reveal_range(&mut self, _event: &RevealRangeEvent) {}

    /// The view should scroll by a line delta.
    fn scroll_request(&mut self, _event: &ScrollRequestEvent) {}
}

/// A sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl CursorEventSink for NullEventSink {}

/// Any event, for recording sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorEvent {
    /// See [`PositionChangedEvent`].
    Position(PositionChangedEvent),
    /// See [`SelectionChangedEvent`].
    Selection(SelectionChangedEvent),
    /// See [`RevealRangeEvent`].
    Reveal(RevealRangeEvent),
    /// See [`ScrollRequestEvent`].
    Scroll(ScrollRequestEvent),
}

/// A sink that records every event in order. Useful for tests and for
/// shells that drain events once per frame.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    /// Recorded events, oldest first.
    pub events: Vec<CursorEvent>,
}

impl CollectingEventSink {
    /// Drop all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Recorded reveal requests, oldest first.
    pub fn reveals(&self) -> Vec<&RevealRangeEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                CursorEvent::Reveal(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Recorded selection-changed events, oldest first.
    pub fn selection_changes(&self) -> Vec<&SelectionChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                CursorEvent::Selection(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl CursorEventSink for CollectingEventSink {
    fn position_changed(&mut self, event: &PositionChangedEvent) {
        self.events.push(CursorEvent::Position(event.clone()));
    }

    fn selection_changed(&mut self, event: &SelectionChangedEvent) {
        self.events.push(CursorEvent::Selection(event.clone()));
    }

    fn reveal_range(&mut self, event: &RevealRangeEvent) {
        self.events.push(CursorEvent::Reveal(event.clone()));
    }

    fn scroll_request(&mut self, event: &ScrollRequestEvent) {
        self.events.push(CursorEvent::Scroll(event.clone()));
    }
}
