//! Direction Resolver (C7): turns each `CompareLine`'s `ComparisonResult`
//! into a concrete `SyncOperation`, honoring a user policy and, for lines
//! under `Automatic`, a three-way state-DB lookup. Also performs move
//! detection, collapsing matching create/delete pairs into move pairs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{CompareLine, ComparisonResult, DirInfo, FileId, LineId, SyncOperation};
use crate::path::RelPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    None,
    Automatic,
}

/// Maps each non-conflict, non-equal `ComparisonResult` to a `Direction`.
/// `Conflict` and `Equal` are never looked up here — they resolve
/// unconditionally to `UnresolvedConflict`/`Equal` respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionPolicy {
    pub left_only: Direction,
    pub right_only: Direction,
    pub left_newer: Direction,
    pub right_newer: Direction,
    pub different: Direction,
}

impl DirectionPolicy {
    pub fn mirror_to_right() -> Self {
        Self {
            left_only: Direction::Right,
            right_only: Direction::Right,
            left_newer: Direction::Right,
            right_newer: Direction::Right,
            different: Direction::Right,
        }
    }

    pub fn mirror_to_left() -> Self {
        Self {
            left_only: Direction::Left,
            right_only: Direction::Left,
            left_newer: Direction::Left,
            right_newer: Direction::Left,
            different: Direction::Left,
        }
    }

    pub fn two_way_automatic() -> Self {
        Self {
            left_only: Direction::Automatic,
            right_only: Direction::Automatic,
            left_newer: Direction::Automatic,
            right_newer: Direction::Automatic,
            different: Direction::Automatic,
        }
    }

    fn direction_for(&self, cmp: &ComparisonResult) -> Option<Direction> {
        match cmp {
            ComparisonResult::LeftOnly => Some(self.left_only),
            ComparisonResult::RightOnly => Some(self.right_only),
            ComparisonResult::LeftNewer => Some(self.left_newer),
            ComparisonResult::RightNewer => Some(self.right_newer),
            ComparisonResult::Different => Some(self.different),
            ComparisonResult::Equal | ComparisonResult::Conflict(_) => None,
        }
    }
}

/// Direct (non-automatic) mapping from (cmp category, direction) to the
/// concrete operation. Shared by manual policy application and by
/// automatic resolution once it has decided which side's change to
/// propagate.
fn map_direct_op(line: &CompareLine, direction: Direction) -> SyncOperation {
    use ComparisonResult::*;
    use Direction::*;
    match (&line.cmp, direction) {
        (LeftOnly, Right) => SyncOperation::CreateRight,
        (LeftOnly, Left) => SyncOperation::DeleteLeft,
        (LeftOnly, None) => SyncOperation::DoNothing,

        (RightOnly, Right) => SyncOperation::DeleteRight,
        (RightOnly, Left) => SyncOperation::CreateLeft,
        (RightOnly, None) => SyncOperation::DoNothing,

        (LeftNewer, Right) | (RightNewer, Right) | (Different, Right) => SyncOperation::OverwriteRight,
        (LeftNewer, Left) | (RightNewer, Left) | (Different, Left) => SyncOperation::OverwriteLeft,
        (LeftNewer, None) | (RightNewer, None) | (Different, None) => SyncOperation::DoNothing,

        (Equal, _) => finalize_equal(line),
        (Conflict(reason), _) => SyncOperation::UnresolvedConflict(reason.clone()),
        (_, Automatic) => unreachable!("Automatic must be resolved before calling map_direct_op"),
    }
}

/// A line classified `Equal` by content or by time+size still needs a
/// metadata refresh when the two sides' mtimes disagree (confirmed-equal
/// content with stale mtime on one side, or a case-only rename on a
/// case-insensitive filesystem). Picks the newer mtime as the side to copy
/// from; ties (including directories, which never carry a `FileMeta`)
/// stay plain `Equal`.
fn finalize_equal(line: &CompareLine) -> SyncOperation {
    match (line.left.meta, line.right.meta) {
        (Some(l), Some(r)) if l.mtime_utc_seconds > r.mtime_utc_seconds => SyncOperation::CopyMetaRight,
        (Some(l), Some(r)) if l.mtime_utc_seconds < r.mtime_utc_seconds => SyncOperation::CopyMetaLeft,
        _ => SyncOperation::Equal,
    }
}

/// Whether a validated pair of state-DB snapshots is available for
/// automatic (three-way) resolution. `Unavailable` covers both a missing
/// DB file and one that failed to cross-reference its partner — per §4.5,
/// both collapse every `Automatic` line straight to `UnresolvedConflict`
/// rather than guessing from current state alone. A pair of folders that
/// have simply never been synced before is represented as `Available`
/// with empty snapshot trees, not `Unavailable` — every path is then
/// legitimately "not found in snapshot", which `resolve_automatic` already
/// handles via its ordinary changed-on-one-side logic.
pub enum AutomaticSnapshots<'a> {
    Available(&'a DirInfo, &'a DirInfo),
    Unavailable,
}

/// Resolve every line's `op` field from its `cmp` and the policy,
/// consulting the state-DB snapshots for any line whose bucket is
/// `Automatic`, then run move detection over the result.
pub fn resolve_directions(lines: &mut [CompareLine], policy: &DirectionPolicy, snapshots: AutomaticSnapshots<'_>) {
    for line in lines.iter_mut() {
        line.op = match policy.direction_for(&line.cmp) {
            None => map_direct_op(line, Direction::None /* unused for Equal/Conflict */),
            Some(Direction::Automatic) => match snapshots {
                AutomaticSnapshots::Available(left, right) => resolve_automatic(line, left, right),
                AutomaticSnapshots::Unavailable => {
                    SyncOperation::UnresolvedConflict("automatic resolution unavailable: state database mismatch".to_string())
                }
            },
            Some(direction) => map_direct_op(line, direction),
        };
    }
    detect_moves(lines);
}

/// §4.6 automatic resolution: consult both sides' last-synchronous-state
/// snapshots for this line's path and propagate whichever side changed.
fn resolve_automatic(line: &CompareLine, left_snapshot: &DirInfo, right_snapshot: &DirInfo) -> SyncOperation {
    let left_snap_node = left_snapshot.lookup(&line.rel_path);
    let right_snap_node = right_snapshot.lookup(&line.rel_path);

    // Both sides currently present but neither ever recorded in a
    // snapshot: a path that's brand new to both sides at once, not a
    // path that merely diverged since the last sync.
    if left_snap_node.is_none() && right_snap_node.is_none() && !line.left.is_absent() && !line.right.is_absent() {
        return if line.cmp == ComparisonResult::Equal {
            SyncOperation::Equal
        } else {
            SyncOperation::UnresolvedConflict("new on both sides".to_string())
        };
    }

    let left_changed = !side_matches_snapshot(&line.left, left_snap_node);
    let right_changed = !side_matches_snapshot(&line.right, right_snap_node);

    match (left_changed, right_changed) {
        (true, true) => SyncOperation::UnresolvedConflict("both sides changed since last sync".to_string()),
        (false, false) => finalize_equal(line),
        (true, false) => map_direct_op(line, Direction::Right),
        (false, true) => map_direct_op(line, Direction::Left),
    }
}

fn side_matches_snapshot(side: &crate::model::Side, snap: Option<&DirInfo>) -> bool {
    match (side.is_absent(), snap) {
        (true, None) => true,
        (true, Some(_)) => false,
        (false, None) => false,
        (false, Some(node)) => {
            if side.kind != node.kind {
                return false;
            }
            match (side.meta, node.meta) {
                (Some(a), Some(b)) => a.size == b.size && a.mtime_utc_seconds == b.mtime_utc_seconds,
                (None, None) => true,
                _ => false,
            }
        }
    }
}

/// Collapse `(LeftOnly a, RightOnly b)` pairs on the same side into move
/// pairs when `file_id(a) == file_id(b)` and size/mtime also match (an
/// exact rename, not a rename-plus-edit — the stricter reading of the two
/// ambiguous in the source, see DESIGN.md). Only collapses when the two
/// lines' already-resolved ops agree on propagation direction
/// (CreateRight+DeleteRight, or DeleteLeft+CreateLeft).
fn detect_moves(lines: &mut [CompareLine]) {
    let mut by_file_id: HashMap<FileId, Vec<usize>> = HashMap::new();
    for (idx, line) in lines.iter().enumerate() {
        let id = match line.cmp {
            ComparisonResult::LeftOnly => line.left.meta.and_then(|m| m.file_id),
            ComparisonResult::RightOnly => line.right.meta.and_then(|m| m.file_id),
            _ => None,
        };
        if let Some(id) = id {
            by_file_id.entry(id).or_default().push(idx);
        }
    }

    let mut pairs_to_apply: Vec<(usize, usize)> = Vec::new();
    for indices in by_file_id.values() {
        for &i in indices {
            for &j in indices {
                if i == j {
                    continue;
                }
                let (is_new, is_old) = (&lines[i], &lines[j]);
                if is_new.cmp == ComparisonResult::LeftOnly
                    && is_old.cmp == ComparisonResult::RightOnly
                    && same_identity(is_new, is_old)
                {
                    pairs_to_apply.push((i, j));
                }
            }
        }
    }

    for (new_idx, old_idx) in pairs_to_apply {
        let new_op = lines[new_idx].op.clone();
        let old_op = lines[old_idx].op.clone();
        match (new_op, old_op) {
            (SyncOperation::CreateRight, SyncOperation::DeleteRight) => {
                lines[new_idx].op = SyncOperation::MoveRightTarget;
                lines[old_idx].op = SyncOperation::MoveRightSource;
                lines[new_idx].move_ref = Some(LineId(old_idx));
                lines[old_idx].move_ref = Some(LineId(new_idx));
            }
            (SyncOperation::DeleteLeft, SyncOperation::CreateLeft) => {
                lines[new_idx].op = SyncOperation::MoveLeftSource;
                lines[old_idx].op = SyncOperation::MoveLeftTarget;
                lines[new_idx].move_ref = Some(LineId(old_idx));
                lines[old_idx].move_ref = Some(LineId(new_idx));
            }
            _ => {}
        }
    }
}

fn same_identity(a: &CompareLine, b: &CompareLine) -> bool {
    let am = a.left.meta.or(a.right.meta);
    let bm = b.left.meta.or(b.right.meta);
    match (am, bm) {
        (Some(am), Some(bm)) => am.size == bm.size && am.mtime_utc_seconds == bm.mtime_utc_seconds,
        _ => false,
    }
}

/// Look up the final target-side relative path a move pair ends up with,
/// for callers that need to report a single "rename" rather than two
/// separate lines.
pub fn move_target_path<'a>(lines: &'a [CompareLine], source_idx: usize) -> Option<&'a RelPath> {
    let target_idx = lines[source_idx].move_ref?.0;
    Some(&lines[target_idx].rel_path)
}
