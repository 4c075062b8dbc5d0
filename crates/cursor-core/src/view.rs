//! The view coordinate layer, specified at its interface.
//!
//! Cursors carry both a buffer-space and a view-space selection. The view
//! layer owns the mapping between the two (soft wrapping, folding); the
//! engine only asks it to convert and validate positions.

use crate::buffer::TextBuffer;
use crate::selection::{Position, Selection};

/// Coordinate conversion between buffer space and view space.
pub trait ViewLayer {
    /// Map a buffer position to its view position.
    fn buffer_to_view_position(&self, buffer: &dyn TextBuffer, pos: Position) -> Position;

    /// Map a view position back to a buffer position.
    fn view_to_buffer_position(&self, buffer: &dyn TextBuffer, pos: Position) -> Position;

    /// Clamp a view position to one that is valid for the given buffer
    /// position (used when re-validating cursors after external mutation).
    fn validate_view_position(
        &self,
        buffer: &dyn TextBuffer,
        view_pos: Position,
        buffer_pos: Position,
    ) -> Position;

    /// Map a buffer selection to a view selection end-for-end.
    fn buffer_to_view_selection(&self, buffer: &dyn TextBuffer, selection: Selection) -> Selection {
        Selection::new(
            self.buffer_to_view_position(buffer, selection.anchor),
            self.buffer_to_view_position(buffer, selection.active),
        )
    }

    /// Map a view selection to a buffer selection end-for-end.
    fn view_to_buffer_selection(&self, buffer: &dyn TextBuffer, selection: Selection) -> Selection {
        Selection::new(
            self.view_to_buffer_position(buffer, selection.anchor),
            self.view_to_buffer_position(buffer, selection.active),
        )
    }
}

/// Identity view: view coordinates equal buffer coordinates.
///
/// The default for shells without wrapping or folding.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityView;

impl ViewLayer for IdentityView {
    fn buffer_to_view_position(&self, buffer: &dyn TextBuffer, pos: Position) -> Position {
        buffer.validate_position(pos)
    }

    fn view_to_buffer_position(&self, buffer: &dyn TextBuffer, pos: Position) -> Position {
        buffer.validate_position(pos)
    }

    fn validate_view_position(
        &self,
        buffer: &dyn TextBuffer,
        _view_pos: Position,
        buffer_pos: Position,
    ) -> Position {
        buffer.validate_position(buffer_pos)
    }
}
