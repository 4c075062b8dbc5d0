//! Cursors and the cursor set.
//!
//! # Overview
//!
//! A [`Cursor`] owns one buffer-space selection and one view-space selection;
//! the two are kept independently consistent through the [`ViewLayer`]. A
//! [`CursorSet`] holds the ordered collection of active cursors: index 0 is
//! the primary cursor, the rest are secondary in insertion order.
//!
//! After any mutation the set is [`normalize`](CursorSet::normalize)d:
//! cursors whose buffer selections overlap or touch are merged into the
//! union range (the later-index cursor donates the direction) and exact
//! duplicates disappear. Normalization is idempotent.

use crate::buffer::TextBuffer;
use crate::selection::{Position, Selection, TextRange};
use crate::view::ViewLayer;
use serde::{Deserialize, Serialize};

/// One insertion/selection point: a buffer selection plus its view-space
/// projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    id: u64,
    selection: Selection,
    view_selection: Selection,
}

impl Cursor {
    fn new(id: u64, selection: Selection, view_selection: Selection) -> Self {
        Self {
            id,
            selection,
            view_selection,
        }
    }

    /// The buffer-space selection.
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The view-space selection.
    pub fn view_selection(&self) -> Selection {
        self.view_selection
    }

    /// The buffer-space active position.
    pub fn position(&self) -> Position {
        self.selection.active
    }
}

/// The ordered collection of active cursors. Index 0 is primary.
#[derive(Debug, Clone)]
pub struct CursorSet {
    cursors: Vec<Cursor>,
    next_id: u64,
    /// Id of the most recently added secondary cursor; 0 means "none", in
    /// which case the primary stands in.
    last_added_id: u64,
}

impl CursorSet {
    /// A set with a single caret at the buffer start.
    pub fn new(buffer: &dyn TextBuffer, view: &dyn ViewLayer) -> Self {
        let mut set = Self {
            cursors: Vec::new(),
            next_id: 1,
            last_added_id: 0,
        };
        set.set_selections(buffer, view, &[Selection::cursor(Position::MIN)]);
        set
    }

    /// Number of active cursors (always at least 1 after construction).
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Whether the set holds no cursors. Only observable mid-replacement.
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// The primary cursor.
    pub fn primary(&self) -> &Cursor {
        &self.cursors[0]
    }

    /// All cursors, primary first.
    pub fn all(&self) -> &[Cursor] {
        &self.cursors
    }

    /// All buffer-space selections, primary first.
    pub fn selections(&self) -> Vec<Selection> {
        self.cursors.iter().map(|c| c.selection).collect()
    }

    /// All view-space selections, primary first.
    pub fn view_selections(&self) -> Vec<Selection> {
        self.cursors.iter().map(|c| c.view_selection).collect()
    }

    /// All buffer-space active positions, primary first.
    pub fn positions(&self) -> Vec<Position> {
        self.cursors.iter().map(|c| c.position()).collect()
    }

    /// Cursor indices sorted by buffer position. Only conflict-sensitive
    /// operations (distributed paste, topmost/bottommost reveal) need this;
    /// everything else sees insertion order.
    pub fn sorted_indices_by_position(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.cursors.len()).collect();
        order.sort_by_key(|&i| {
            (
                self.cursors[i].selection.start(),
                self.cursors[i].selection.end(),
            )
        });
        order
    }

    /// Replace all cursors; `selections[0]` becomes the primary. View
    /// selections are derived through the view layer.
    pub fn set_selections(
        &mut self,
        buffer: &dyn TextBuffer,
        view: &dyn ViewLayer,
        selections: &[Selection],
    ) {
        self.cursors = selections
            .iter()
            .map(|&sel| {
                let sel = validate_selection(buffer, sel);
                let view_sel = view.buffer_to_view_selection(buffer, sel);
                let id = self.next_id;
                self.next_id += 1;
                Cursor::new(id, sel, view_sel)
            })
            .collect();
        self.last_added_id = 0;
    }

    /// Replace all cursors with explicit view selections (used when
    /// restoring a snapshot; counts must match).
    pub fn set_selections_with_view(
        &mut self,
        buffer: &dyn TextBuffer,
        view: &dyn ViewLayer,
        selections: &[Selection],
        view_selections: &[Selection],
    ) {
        debug_assert_eq!(selections.len(), view_selections.len());
        self.cursors = selections
            .iter()
            .zip(view_selections.iter())
            .map(|(&sel, &view_sel)| {
                let id = self.next_id;
                self.next_id += 1;
                Cursor::new(id, validate_selection(buffer, sel), view_sel)
            })
            .collect();
        self.last_added_id = 0;
    }

    /// Add a secondary cursor; it becomes the "last added" cursor that
    /// repeated multi-cursor gestures target.
    pub fn add_secondary_cursor(
        &mut self,
        buffer: &dyn TextBuffer,
        view: &dyn ViewLayer,
        selection: Selection,
    ) {
        let sel = validate_selection(buffer, selection);
        let view_sel = view.buffer_to_view_selection(buffer, sel);
        let id = self.next_id;
        self.next_id += 1;
        self.cursors.push(Cursor::new(id, sel, view_sel));
        self.last_added_id = id;
    }

    /// Drop every secondary cursor, keeping only the primary.
    pub fn kill_secondary_cursors(&mut self) {
        self.cursors.truncate(1);
        self.last_added_id = 0;
    }

    /// Index of the most recently added cursor, falling back to the primary
    /// when none was added (or it has since been merged away).
    pub fn last_added_cursor_index(&self) -> usize {
        if self.last_added_id != 0 {
            if let Some(idx) = self.cursors.iter().position(|c| c.id == self.last_added_id) {
                return idx;
            }
        }
        0
    }

    /// Re-validate every cursor against current buffer bounds. Defensive
    /// recovery after external buffer mutation; called before every
    /// transaction.
    pub fn ensure_valid_state(&mut self, buffer: &dyn TextBuffer, view: &dyn ViewLayer) {
        for cursor in &mut self.cursors {
            let sel = validate_selection(buffer, cursor.selection);
            let view_sel = Selection::new(
                view.validate_view_position(buffer, cursor.view_selection.anchor, sel.anchor),
                view.validate_view_position(buffer, cursor.view_selection.active, sel.active),
            );
            cursor.selection = sel;
            cursor.view_selection = view_sel;
        }
    }

    /// Merge cursors whose buffer selections overlap or touch and drop
    /// exact duplicates. Idempotent.
    ///
    /// Merge policy: the union range survives in the slot of the
    /// earlier-index cursor; the direction comes from the cursor with the
    /// larger index.
    pub fn normalize(&mut self) {
        if self.cursors.len() < 2 {
            return;
        }

        struct Group {
            slot: usize,
            buffer_range: TextRange,
            view_range: TextRange,
            direction_index: usize,
            has_last_added: bool,
        }

        let order = self.sorted_indices_by_position();
        let mut groups: Vec<Group> = Vec::with_capacity(self.cursors.len());

        for &i in &order {
            let cursor = &self.cursors[i];
            let range = cursor.selection.to_range();
            let is_last_added = self.last_added_id != 0 && cursor.id == self.last_added_id;

            if let Some(group) = groups.last_mut() {
                if group.buffer_range.intersects_or_touches(range) {
                    group.buffer_range = group.buffer_range.union(range);
                    group.view_range = group.view_range.union(cursor.view_selection.to_range());
                    group.slot = group.slot.min(i);
                    group.direction_index = group.direction_index.max(i);
                    group.has_last_added |= is_last_added;
                    continue;
                }
            }
            groups.push(Group {
                slot: i,
                buffer_range: range,
                view_range: cursor.view_selection.to_range(),
                direction_index: i,
                has_last_added: is_last_added,
            });
        }

        if groups.len() == self.cursors.len() {
            return;
        }

        groups.sort_by_key(|g| g.slot);

        let mut merged: Vec<Cursor> = Vec::with_capacity(groups.len());
        let mut last_added_id = 0;
        for group in groups {
            let keeper = &self.cursors[group.slot];
            let direction = self.cursors[group.direction_index].selection.direction();
            let cursor = Cursor::new(
                keeper.id,
                Selection::from_range(group.buffer_range, direction),
                Selection::from_range(group.view_range, direction),
            );
            if group.has_last_added {
                last_added_id = cursor.id;
            }
            merged.push(cursor);
        }

        self.cursors = merged;
        self.last_added_id = last_added_id;
    }
}

fn validate_selection(buffer: &dyn TextBuffer, selection: Selection) -> Selection {
    Selection::new(
        buffer.validate_position(selection.anchor),
        buffer.validate_position(selection.active),
    )
}

fn one() -> usize {
    1
}

/// A persisted position; missing fields default to 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedPosition {
    /// One-based line number.
    #[serde(default = "one")]
    pub line_number: usize,
    /// One-based column.
    #[serde(default = "one")]
    pub column: usize,
}

/// Persisted state of one cursor.
///
/// A missing `position` defaults to (1,1); a missing `selection_start`
/// defaults to `position`, yielding an empty selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedCursorState {
    /// The anchor end ("selection start").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_start: Option<SerializedPosition>,
    /// The active end ("position").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SerializedPosition>,
}

impl SerializedCursorState {
    /// Decode into a selection, applying the defaulting rules.
    pub fn to_selection(&self) -> Selection {
        let position = self
            .position
            .as_ref()
            .map(|p| Position::new(p.line_number, p.column))
            .unwrap_or(Position::MIN);
        let anchor = self
            .selection_start
            .as_ref()
            .map(|p| Position::new(p.line_number, p.column))
            .unwrap_or(position);
        Selection::new(anchor, position)
    }

    /// Encode a selection.
    pub fn from_selection(selection: Selection) -> Self {
        Self {
            selection_start: Some(SerializedPosition {
                line_number: selection.anchor.line,
                column: selection.anchor.column,
            }),
            position: Some(SerializedPosition {
                line_number: selection.active.line,
                column: selection.active.column,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RopeBuffer;
    use crate::view::IdentityView;

    fn sel(l1: usize, c1: usize, l2: usize, c2: usize) -> Selection {
        Selection::new(Position::new(l1, c1), Position::new(l2, c2))
    }

    fn fixture() -> (RopeBuffer, IdentityView) {
        (
            RopeBuffer::from_text("alpha beta gamma\ndelta epsilon\nzeta eta theta\n"),
            IdentityView,
        )
    }

    #[test]
    fn set_selections_makes_first_primary() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);

        set.set_selections(&buffer, &view, &[sel(2, 1, 2, 3), sel(1, 1, 1, 1)]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.primary().selection(), sel(2, 1, 2, 3));
    }

    #[test]
    fn normalize_merges_overlapping_selections() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);

        set.set_selections(&buffer, &view, &[sel(1, 1, 1, 8), sel(1, 5, 1, 12)]);
        set.normalize();

        assert_eq!(set.len(), 1);
        assert_eq!(set.primary().selection().to_range().start, Position::new(1, 1));
        assert_eq!(set.primary().selection().to_range().end, Position::new(1, 12));
    }

    #[test]
    fn normalize_merge_takes_direction_of_later_cursor() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);

        // Later cursor is backward; the merged selection must be too.
        set.set_selections(&buffer, &view, &[sel(1, 1, 1, 8), sel(1, 12, 1, 5)]);
        set.normalize();

        assert_eq!(set.len(), 1);
        assert_eq!(set.primary().selection(), sel(1, 12, 1, 1));
    }

    #[test]
    fn normalize_merges_touching_and_removes_duplicates() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);

        set.set_selections(
            &buffer,
            &view,
            &[sel(1, 1, 1, 5), sel(1, 5, 1, 9), sel(1, 1, 1, 5), sel(2, 2, 2, 2)],
        );
        set.normalize();

        assert_eq!(set.len(), 2);
        assert_eq!(set.selections()[0], sel(1, 1, 1, 9));
        assert_eq!(set.selections()[1], sel(2, 2, 2, 2));
    }

    #[test]
    fn normalize_is_idempotent() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);

        set.set_selections(
            &buffer,
            &view,
            &[sel(1, 1, 1, 6), sel(1, 4, 1, 10), sel(3, 1, 3, 4), sel(2, 1, 2, 1)],
        );
        set.normalize();
        let once = set.selections();
        set.normalize();
        assert_eq!(set.selections(), once);
    }

    #[test]
    fn last_added_cursor_survives_merges_by_reference() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);

        set.set_selections(&buffer, &view, &[sel(1, 1, 1, 1)]);
        set.add_secondary_cursor(&buffer, &view, sel(2, 1, 2, 1));
        set.add_secondary_cursor(&buffer, &view, sel(3, 1, 3, 1));
        assert_eq!(set.last_added_cursor_index(), 2);

        // Merging the last-added cursor keeps targeting its survivor.
        set.add_secondary_cursor(&buffer, &view, sel(3, 1, 3, 3));
        set.normalize();
        assert_eq!(set.len(), 3);
        assert_eq!(set.last_added_cursor_index(), 2);
    }

    #[test]
    fn kill_secondary_cursors_keeps_primary() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);

        set.set_selections(&buffer, &view, &[sel(1, 2, 1, 4)]);
        set.add_secondary_cursor(&buffer, &view, sel(2, 1, 2, 1));
        set.kill_secondary_cursors();

        assert_eq!(set.len(), 1);
        assert_eq!(set.primary().selection(), sel(1, 2, 1, 4));
    }

    #[test]
    fn ensure_valid_state_clamps_to_buffer() {
        let (buffer, view) = fixture();
        let mut set = CursorSet::new(&buffer, &view);
        set.set_selections(&buffer, &view, &[sel(3, 10, 3, 10)]);

        // The document shrank underneath the cursors.
        let shorter = RopeBuffer::from_text("ab\ncd");
        set.ensure_valid_state(&shorter, &view);

        assert_eq!(set.primary().selection(), Selection::cursor(Position::new(2, 3)));
    }

    #[test]
    fn serialized_state_defaults_missing_fields() {
        let state: SerializedCursorState =
            serde_json::from_str(r#"{"position":{"lineNumber":3}}"#).unwrap();
        let selection = state.to_selection();
        assert_eq!(selection.anchor, Position::new(3, 1));
        assert_eq!(selection.active, Position::new(3, 1));

        let empty: SerializedCursorState = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.to_selection(), Selection::cursor(Position::MIN));
    }

    #[test]
    fn serialized_state_round_trips() {
        let original = sel(2, 3, 4, 5);
        let encoded = serde_json::to_string(&SerializedCursorState::from_selection(original)).unwrap();
        let decoded: SerializedCursorState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.to_selection(), original);
    }
}
