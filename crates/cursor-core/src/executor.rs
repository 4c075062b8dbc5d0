//! The command execution engine.
//!
//! # Overview
//!
//! Given one optional edit command per cursor, the engine:
//!
//! 1. Collapses adjacent pure deletions into one command (pre-pass).
//! 2. Collects edit operations in cursor-index order; each operation is
//!    tagged (major, minor) and commands may request selection tracking.
//! 3. Drops true no-ops (empty range, empty text).
//! 4. Abandons the whole batch if any operation escapes the editable region.
//! 5. Resolves overlapping edits across cursors: the cursor with the higher
//!    major id loses and all of its operations are dropped. A losing primary
//!    cursor abandons the whole batch with a warning.
//! 6. Applies the filtered batch atomically and recomputes each surviving
//!    cursor's selection from the buffer's inverse-operation feedback.
//! 7. Removes losing cursors' slots from the result.
//! 8. Releases every tracking marker, on every exit path.
//!
//! Abandonment is decided before any buffer mutation; a rejected batch
//! leaves both the buffer and the cursor set untouched.

use crate::buffer::{
    BufferError, EditOperation, InverseEditOperation, MarkerId, MarkerStickiness, OperationId,
    TextBuffer,
};
use crate::command::{
    CursorComputeData, DeleteCommand, EditCommand, EditOperationBuilder, TrackedSelectionId,
};
use crate::selection::{Selection, SelectionDirection, TextRange};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Result of running one batch of per-cursor edit commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// The batch applied; these are the new cursor selections (buffer
    /// space), with losing and collapsed cursors already removed.
    Executed {
        /// New selections, in surviving cursor order.
        selections: Vec<Selection>,
    },
    /// No operations were applied (no commands, or nothing left to do).
    NothingExecuted,
    /// The whole batch was rejected before any mutation.
    Abandoned(AbandonReason),
}

/// Why a batch was rejected wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// The buffer rejects all mutation.
    ReadOnly,
    /// An operation fell outside the buffer's editable region.
    OutsideEditableRange,
    /// The primary cursor would have lost conflict resolution; the command
    /// set is fundamentally inconsistent.
    PrimaryCursorConflict,
    /// The buffer rejected the batch at apply time.
    BufferRejected(BufferError),
}

struct TrackedRequest {
    id: usize,
    major: usize,
    selection: Selection,
    stickiness_override: Option<MarkerStickiness>,
}

struct TrackedMarkerPair {
    id: usize,
    major: usize,
    anchor: MarkerId,
    active: MarkerId,
}

struct Collector<'a> {
    major: usize,
    next_minor: usize,
    operations: &'a mut Vec<EditOperation>,
    tracked: &'a mut Vec<TrackedRequest>,
    next_tracked_id: &'a mut usize,
}

impl EditOperationBuilder for Collector<'_> {
    fn add_edit_operation(&mut self, range: TextRange, text: &str) {
        self.operations.push(EditOperation {
            id: OperationId::new(self.major, self.next_minor),
            range,
            text: text.to_string(),
        });
        self.next_minor += 1;
    }

    fn track_selection(
        &mut self,
        selection: Selection,
        stickiness_override: Option<MarkerStickiness>,
    ) -> TrackedSelectionId {
        let id = *self.next_tracked_id;
        *self.next_tracked_id += 1;
        self.tracked.push(TrackedRequest {
            id,
            major: self.major,
            selection,
            stickiness_override,
        });
        TrackedSelectionId(id)
    }
}

/// Stickiness for the (anchor, active) marker pair of a tracked selection.
///
/// An empty selection keeps a single insertion point; by default it binds to
/// the previous character. A non-empty selection gets markers that keep it
/// from growing: the earlier end moves past insertions at its position, the
/// later end stays before them.
fn tracking_stickiness(
    selection: Selection,
    stickiness_override: Option<MarkerStickiness>,
) -> (MarkerStickiness, MarkerStickiness) {
    if selection.is_empty() {
        let stickiness = stickiness_override.unwrap_or(MarkerStickiness::StickToPrevious);
        return (stickiness, stickiness);
    }
    match selection.direction() {
        SelectionDirection::Forward => (
            MarkerStickiness::StickToNext,
            MarkerStickiness::StickToPrevious,
        ),
        SelectionDirection::Backward => (
            MarkerStickiness::StickToPrevious,
            MarkerStickiness::StickToNext,
        ),
    }
}

/// Run a batch of per-cursor edit commands against the buffer.
///
/// `commands` is parallel to `selections_before`: entry `i` is cursor `i`'s
/// command (or `None` when that cursor contributes nothing this gesture).
pub fn execute_commands(
    buffer: &mut dyn TextBuffer,
    selections_before: &[Selection],
    mut commands: Vec<Option<Box<dyn EditCommand>>>,
) -> ExecuteOutcome {
    debug_assert_eq!(commands.len(), selections_before.len());

    if commands.iter().all(|c| c.is_none()) {
        return ExecuteOutcome::NothingExecuted;
    }
    if buffer.is_read_only() {
        warn!("buffer is read-only; edit batch not executed");
        return ExecuteOutcome::Abandoned(AbandonReason::ReadOnly);
    }

    let absorbed = collapse_adjacent_deletions(&mut commands);

    // Collect operations in major (cursor index) order. A failing command
    // contributes nothing; the rest of the batch continues.
    let mut operations: Vec<EditOperation> = Vec::new();
    let mut tracked_requests: Vec<TrackedRequest> = Vec::new();
    let mut next_tracked_id = 0usize;

    for (major, command) in commands.iter().enumerate() {
        let Some(command) = command else { continue };
        let ops_before = operations.len();
        let tracked_before = tracked_requests.len();
        let mut collector = Collector {
            major,
            next_minor: 0,
            operations: &mut operations,
            tracked: &mut tracked_requests,
            next_tracked_id: &mut next_tracked_id,
        };
        if let Err(error) = command.get_edit_operations(&*buffer, &mut collector) {
            warn!(major, %error, "edit command failed; contributing zero operations");
            operations.truncate(ops_before);
            tracked_requests.truncate(tracked_before);
        }
    }

    operations.retain(|op| !op.is_noop());
    if operations.is_empty() {
        return ExecuteOutcome::NothingExecuted;
    }

    // Every operation must fall inside the editable region, or the whole
    // batch is rejected before any mutation.
    if let Some(editable) = buffer.editable_range() {
        for op in &operations {
            let range = buffer.validate_range(op.range);
            if !editable.contains_range(range) {
                warn!(
                    major = op.id.major,
                    "edit operation outside the editable region; abandoning batch"
                );
                return ExecuteOutcome::Abandoned(AbandonReason::OutsideEditableRange);
            }
        }
    }

    // Markers live from here on; every exit path below must release them.
    let marker_pairs: Vec<TrackedMarkerPair> = tracked_requests
        .iter()
        .map(|request| {
            let (anchor_stickiness, active_stickiness) =
                tracking_stickiness(request.selection, request.stickiness_override);
            TrackedMarkerPair {
                id: request.id,
                major: request.major,
                anchor: buffer.add_marker(request.selection.anchor, anchor_stickiness),
                active: buffer.add_marker(request.selection.active, active_stickiness),
            }
        })
        .collect();

    let outcome = resolve_and_apply(
        buffer,
        selections_before,
        &commands,
        operations,
        &marker_pairs,
        &absorbed,
    );

    for pair in &marker_pairs {
        buffer.remove_marker(pair.anchor);
        buffer.remove_marker(pair.active);
    }

    outcome
}

fn resolve_and_apply(
    buffer: &mut dyn TextBuffer,
    selections_before: &[Selection],
    commands: &[Option<Box<dyn EditCommand>>],
    operations: Vec<EditOperation>,
    marker_pairs: &[TrackedMarkerPair],
    absorbed: &BTreeSet<usize>,
) -> ExecuteOutcome {
    let losers = match resolve_conflicts(&operations) {
        Ok(losers) => losers,
        Err(PrimaryCursorLoss) => {
            warn!("primary cursor would lose conflict resolution; abandoning batch");
            return ExecuteOutcome::Abandoned(AbandonReason::PrimaryCursorConflict);
        }
    };

    let surviving: Vec<EditOperation> = operations
        .into_iter()
        .filter(|op| !losers.contains(&op.id.major))
        .collect();
    if surviving.is_empty() {
        return ExecuteOutcome::NothingExecuted;
    }

    let mut final_selections: Option<Vec<Selection>> = None;

    let apply_result = buffer.apply_edits(selections_before, surviving, &mut |post, inverse| {
        let mut by_major: BTreeMap<usize, Vec<InverseEditOperation>> = BTreeMap::new();
        for op in inverse {
            by_major.entry(op.id.major).or_default().push(op.clone());
        }
        for ops in by_major.values_mut() {
            ops.sort_by_key(|op| op.id.minor);
        }

        let mut tracked_resolved: BTreeMap<usize, Selection> = BTreeMap::new();
        let mut tracked_majors: BTreeSet<usize> = BTreeSet::new();
        for pair in marker_pairs {
            if losers.contains(&pair.major) {
                continue;
            }
            if let (Some(anchor), Some(active)) = (
                post.marker_position(pair.anchor),
                post.marker_position(pair.active),
            ) {
                tracked_resolved.insert(pair.id, Selection::new(anchor, active));
                tracked_majors.insert(pair.major);
            }
        }

        let empty: Vec<InverseEditOperation> = Vec::new();
        let mut computed: Vec<Option<Selection>> =
            selections_before.iter().map(|&sel| Some(sel)).collect();

        for (major, command) in commands.iter().enumerate() {
            let Some(command) = command else { continue };
            if losers.contains(&major) {
                continue;
            }
            let inverse_ops = by_major.get(&major);
            // A command with neither inverse operations nor a tracked
            // selection keeps its pre-edit selection unchanged.
            if inverse_ops.is_none() && !tracked_majors.contains(&major) {
                continue;
            }
            let data = CursorComputeData::new(
                inverse_ops.map(|ops| ops.as_slice()).unwrap_or(empty.as_slice()),
                &tracked_resolved,
            );
            computed[major] = command.compute_cursor_state(post, &data);
        }

        let mut result: Vec<Selection> = Vec::new();
        for (major, slot) in computed.into_iter().enumerate() {
            if losers.contains(&major) || absorbed.contains(&major) {
                continue;
            }
            if let Some(selection) = slot {
                result.push(selection);
            }
        }

        final_selections = Some(result.clone());
        Some(result)
    });

    match apply_result {
        Ok(()) => match final_selections {
            Some(selections) => ExecuteOutcome::Executed { selections },
            None => ExecuteOutcome::NothingExecuted,
        },
        Err(error) => {
            warn!(%error, "buffer rejected the edit batch");
            ExecuteOutcome::Abandoned(AbandonReason::BufferRejected(error))
        }
    }
}

/// Pre-pass: when every present command is a single pure deletion, merge
/// commands whose ranges are exactly adjacent into one larger deletion.
/// Returns the majors whose commands were absorbed; their result slots are
/// removed after the batch (the merged deletion speaks for all of them).
fn collapse_adjacent_deletions(
    commands: &mut [Option<Box<dyn EditCommand>>],
) -> BTreeSet<usize> {
    let mut absorbed: BTreeSet<usize> = BTreeSet::new();

    let mut ranges: Vec<(usize, TextRange)> = Vec::new();
    for (major, command) in commands.iter().enumerate() {
        if let Some(command) = command {
            match command.pure_deletion_range() {
                Some(range) => ranges.push((major, range)),
                None => return absorbed,
            }
        }
    }
    if ranges.len() < 2 {
        return absorbed;
    }

    ranges.sort_by_key(|&(_, range)| (range.start, range.end));

    let mut runs: Vec<(TextRange, Vec<usize>)> = Vec::new();
    for (major, range) in ranges {
        if let Some((last, members)) = runs.last_mut() {
            if last.end == range.start {
                *last = last.union(range);
                members.push(major);
                continue;
            }
        }
        runs.push((range, vec![major]));
    }

    for (union_range, members) in runs {
        if members.len() < 2 {
            continue;
        }
        debug!(?union_range, "collapsing adjacent deletions into one command");
        // The lowest major keeps the merged command so the primary can never
        // be absorbed by this pre-pass.
        let keeper = *members.iter().min().expect("non-empty run");
        for major in members {
            if major == keeper {
                commands[major] = Some(Box::new(DeleteCommand::new(union_range)));
            } else {
                commands[major] = None;
                absorbed.insert(major);
            }
        }
    }

    absorbed
}

struct PrimaryCursorLoss;

/// Determine which cursors lose conflict resolution.
///
/// Operations are ordered by range end, descending; whenever two adjacent
/// operations in that order overlap, the cursor with the higher major id
/// loses and all of its operations leave the working set. Repeats until no
/// overlap remains. Implemented as an iterative mark-and-filter pass over
/// the loser set rather than splicing the working array mid-scan;
/// observable behavior is identical.
fn resolve_conflicts(operations: &[EditOperation]) -> Result<BTreeSet<usize>, PrimaryCursorLoss> {
    let mut losers: BTreeSet<usize> = BTreeSet::new();

    loop {
        let mut work: Vec<&EditOperation> = operations
            .iter()
            .filter(|op| !losers.contains(&op.id.major))
            .collect();
        work.sort_by(|a, b| {
            b.range
                .end
                .cmp(&a.range.end)
                .then_with(|| b.range.start.cmp(&a.range.start))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut loser: Option<usize> = None;
        for pair in work.windows(2) {
            let (previous, current) = (pair[0], pair[1]);
            if previous.range.start < current.range.end {
                // Ties always resolve against the higher major id.
                loser = Some(previous.id.major.max(current.id.major));
                break;
            }
        }

        match loser {
            None => return Ok(losers),
            Some(0) => return Err(PrimaryCursorLoss),
            Some(major) => {
                debug!(major, "dropping all operations of losing cursor");
                losers.insert(major);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Position;

    fn op(major: usize, minor: usize, r: TextRange, text: &str) -> EditOperation {
        EditOperation {
            id: OperationId::new(major, minor),
            range: r,
            text: text.to_string(),
        }
    }

    fn range(l1: usize, c1: usize, l2: usize, c2: usize) -> TextRange {
        TextRange::new(Position::new(l1, c1), Position::new(l2, c2))
    }

    #[test]
    fn disjoint_operations_have_no_losers() {
        let ops = vec![
            op(0, 0, range(1, 1, 1, 3), "x"),
            op(1, 0, range(1, 5, 1, 7), "y"),
        ];
        let losers = resolve_conflicts(&ops).ok().unwrap();
        assert!(losers.is_empty());
    }

    #[test]
    fn touching_operations_do_not_conflict() {
        let ops = vec![
            op(0, 0, range(1, 1, 1, 5), "x"),
            op(1, 0, range(1, 5, 1, 9), "y"),
        ];
        let losers = resolve_conflicts(&ops).ok().unwrap();
        assert!(losers.is_empty());
    }

    #[test]
    fn higher_major_loses_on_overlap() {
        let ops = vec![
            op(0, 0, range(1, 1, 1, 10), "a"),
            op(1, 0, range(1, 5, 1, 15), "b"),
        ];
        let losers = resolve_conflicts(&ops).ok().unwrap();
        assert_eq!(losers.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn all_operations_of_a_loser_are_dropped() {
        // Cursor 2's second operation conflicts; both of its operations go.
        let ops = vec![
            op(0, 0, range(1, 1, 1, 4), "a"),
            op(1, 0, range(2, 1, 2, 4), "b"),
            op(2, 0, range(3, 1, 3, 4), "c"),
            op(2, 1, range(2, 2, 2, 6), "d"),
        ];
        let losers = resolve_conflicts(&ops).ok().unwrap();
        assert_eq!(losers.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn cascading_conflicts_resolve_deterministically() {
        // 2 loses first (overlaps 1); with 2 gone, 1 still overlaps 0 and
        // loses as well.
        let ops = vec![
            op(0, 0, range(1, 1, 1, 10), "a"),
            op(1, 0, range(1, 8, 1, 20), "b"),
            op(2, 0, range(1, 18, 1, 30), "c"),
        ];
        let losers = resolve_conflicts(&ops).ok().unwrap();
        assert_eq!(losers.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn primary_self_overlap_aborts() {
        let ops = vec![
            op(0, 0, range(1, 1, 1, 10), "a"),
            op(0, 1, range(1, 5, 1, 8), "b"),
        ];
        assert!(resolve_conflicts(&ops).is_err());
    }

    #[test]
    fn empty_selection_tracking_defaults_to_previous() {
        let sel = Selection::cursor(Position::new(1, 4));
        let (anchor, active) = tracking_stickiness(sel, None);
        assert_eq!(anchor, MarkerStickiness::StickToPrevious);
        assert_eq!(active, MarkerStickiness::StickToPrevious);

        let (anchor, _) = tracking_stickiness(sel, Some(MarkerStickiness::StickToNext));
        assert_eq!(anchor, MarkerStickiness::StickToNext);
    }

    #[test]
    fn nonempty_selection_tracking_pins_both_edges() {
        let forward = Selection::new(Position::new(1, 2), Position::new(1, 6));
        assert_eq!(
            tracking_stickiness(forward, None),
            (
                MarkerStickiness::StickToNext,
                MarkerStickiness::StickToPrevious
            )
        );

        let backward = Selection::new(Position::new(1, 6), Position::new(1, 2));
        assert_eq!(
            tracking_stickiness(backward, None),
            (
                MarkerStickiness::StickToPrevious,
                MarkerStickiness::StickToNext
            )
        );
    }
}
