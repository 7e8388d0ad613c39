//! Statistics (C8): per-side counts and byte totals computed from a
//! `CompareLine` list, used for the pre-sync summary and to drive the
//! progress bar.

use serde::{Deserialize, Serialize};

use crate::model::{CompareLine, SyncOperation};
use crate::path::RelPath;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideCounts {
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub left: SideCounts,
    pub right: SideCounts,
    pub conflicts: u64,
    pub bytes_to_process: u64,
    pub conflict_paths: Vec<(String, String)>,
}

impl Statistics {
    pub fn total_objects(&self) -> u64 {
        self.left.creates
            + self.left.updates
            + self.left.deletes
            + self.right.creates
            + self.right.updates
            + self.right.deletes
    }

    /// `≥ 50% of total entries are create+delete ops and that total ≥ 10`
    /// — the pre-flight "significant difference" check (§4.11 item 2).
    pub fn is_significant_difference(&self, total_entries: u64) -> bool {
        let create_delete_total = self.left.creates + self.left.deletes + self.right.creates + self.right.deletes;
        create_delete_total >= 10 && total_entries > 0 && create_delete_total * 2 >= total_entries
    }
}

/// Compute statistics from a CompareLine list. `bytes_to_process` sums the
/// source-side file size of every Create/Overwrite op; Delete ops
/// contribute zero bytes (§4.7).
pub fn compute_statistics(lines: &[CompareLine]) -> Statistics {
    let mut stats = Statistics::default();

    for line in lines {
        match &line.op {
            SyncOperation::CreateRight | SyncOperation::MoveRightTarget => {
                stats.right.creates += 1;
                stats.bytes_to_process += source_size(line, Side::Left);
            }
            SyncOperation::CreateLeft | SyncOperation::MoveLeftTarget => {
                stats.left.creates += 1;
                stats.bytes_to_process += source_size(line, Side::Right);
            }
            SyncOperation::DeleteRight | SyncOperation::MoveRightSource => {
                stats.right.deletes += 1;
            }
            SyncOperation::DeleteLeft | SyncOperation::MoveLeftSource => {
                stats.left.deletes += 1;
            }
            SyncOperation::OverwriteRight => {
                stats.right.updates += 1;
                stats.bytes_to_process += source_size(line, Side::Left);
            }
            SyncOperation::OverwriteLeft => {
                stats.left.updates += 1;
                stats.bytes_to_process += source_size(line, Side::Right);
            }
            SyncOperation::CopyMetaRight => stats.right.updates += 1,
            SyncOperation::CopyMetaLeft => stats.left.updates += 1,
            SyncOperation::UnresolvedConflict(reason) => {
                stats.conflicts += 1;
                stats.conflict_paths.push((line.rel_path.display_string(), reason.clone()));
            }
            SyncOperation::DoNothing | SyncOperation::Equal => {}
        }
    }

    stats
}

enum Side {
    Left,
    Right,
}

fn source_size(line: &CompareLine, side: Side) -> u64 {
    let meta = match side {
        Side::Left => line.left.meta,
        Side::Right => line.right.meta,
    };
    meta.map(|m| m.size).unwrap_or(0)
}

/// A conflict, named for display, decoupled from `Statistics` so callers
/// can render it without re-deriving the RelPath string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub rel_path: RelPath,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompareLine, EntryKind, FileMeta, Side as ModelSide};
    use crate::path::RelPath;

    fn line(path: &str, op: SyncOperation, left_size: u64, right_size: u64) -> CompareLine {
        let mut l = CompareLine::new(
            RelPath::parse(path),
            ModelSide::new(EntryKind::File, Some(FileMeta::new(left_size, 1))),
            ModelSide::new(EntryKind::File, Some(FileMeta::new(right_size, 1))),
        );
        l.op = op;
        l
    }

    #[test]
    fn bytes_to_process_sums_source_side_only() {
        let lines = vec![
            line("a.txt", SyncOperation::CreateRight, 10, 0),
            line("b.txt", SyncOperation::OverwriteLeft, 0, 20),
            line("c.txt", SyncOperation::DeleteRight, 5, 0),
        ];
        let stats = compute_statistics(&lines);
        assert_eq!(stats.bytes_to_process, 30);
        assert_eq!(stats.right.creates, 1);
        assert_eq!(stats.left.updates, 1);
        assert_eq!(stats.right.deletes, 1);
    }

    #[test]
    fn conflicts_are_counted_and_named() {
        let lines = vec![line("a.txt", SyncOperation::UnresolvedConflict("x".into()), 0, 0)];
        let stats = compute_statistics(&lines);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.conflict_paths[0].0, "a.txt");
    }

    #[test]
    fn significant_difference_threshold() {
        let mut stats = Statistics::default();
        stats.left.creates = 6;
        stats.right.deletes = 4;
        assert!(stats.is_significant_difference(20));
        assert!(!stats.is_significant_difference(21));
    }

    #[rstest::rstest]
    #[case(10, 20, true)] // exactly half, at the floor of 10
    #[case(9, 20, false)] // below the count-10 floor
    #[case(10, 21, false)] // half-of-21 rounds against create+delete=10
    #[case(0, 0, false)] // nothing to sync is never "significant"
    #[case(50, 50, true)] // comfortably over both thresholds
    fn significant_difference_boundaries(#[case] create_delete_total: u64, #[case] total_entries: u64, #[case] expected: bool) {
        let mut stats = Statistics::default();
        stats.left.creates = create_delete_total;
        assert_eq!(stats.is_significant_difference(total_entries), expected);
    }
}
