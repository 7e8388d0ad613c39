//! Pre-flight Checks (C12): run after direction resolution and before
//! Pass 0, per §4.11. Each check reports through the observer; the last
//! (mandatory-field) and the first (source-missing) are fatal, the rest
//! are user-dismissible warnings.

use std::path::Path;

use crate::config::FolderPair;
use crate::deletion;
use crate::fsops;
use crate::model::{CompareLine, SyncOperation};
use crate::progress::ProgressObserver;
use crate::statistics::Statistics;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Proceed,
    /// Skip just this pair; the orchestrator moves on to the next one.
    Skip(String),
}

/// Run every per-pair check in §4.11 order, in a single pass. Stops (and
/// reports fatally) at the first fatal condition rather than continuing
/// to accumulate warnings past it, since a fatal condition means the rest
/// of the comparison result can no longer be trusted.
pub async fn run_preflight_checks(
    pair: &FolderPair,
    lines: &[CompareLine],
    stats: &Statistics,
    observer: &dyn ProgressObserver,
) -> Verdict {
    if let Some(reason) = check_source_missing_with_only_deletes(pair, lines).await {
        observer.report_fatal_error(&reason);
        return Verdict::Skip(reason);
    }

    if let Some(reason) = check_mandatory_fields(pair, lines) {
        observer.report_fatal_error(&reason);
        return Verdict::Skip(reason);
    }

    if stats.is_significant_difference(lines.len() as u64) {
        observer.report_warning(
            "this sync would create or delete at least half of all compared items; please confirm this is expected",
            true,
        );
    }

    if let Some(reason) = check_insufficient_free_space(pair, lines).await {
        observer.report_warning(&reason, true);
    }

    if matches!(pair.deletion_policy, crate::deletion::DeletionPolicy::RecycleBin)
        && !deletion::probe_recycle_bin(&pair.left_root).await
    {
        observer.report_warning("recycle bin is unavailable on the left volume; permanent deletion will be used instead", true);
    }
    if matches!(pair.deletion_policy, crate::deletion::DeletionPolicy::RecycleBin)
        && !deletion::probe_recycle_bin(&pair.right_root).await
    {
        observer.report_warning("recycle bin is unavailable on the right volume; permanent deletion will be used instead", true);
    }

    if let crate::deletion::DeletionPolicy::Versioning { folder, .. } = &pair.deletion_policy {
        if path_contains(&pair.left_root, folder) || path_contains(&pair.right_root, folder) {
            observer.report_warning(
                "the versioning folder is located inside a sync root; versioned items may be re-scanned as ordinary content",
                true,
            );
        }
    }

    Verdict::Proceed
}

/// §4.11 item 1: the source root vanished between scan and pre-flight,
/// yet every actionable line reduces to "delete everything on the other
/// side" — a signature of a scan that silently treated a missing root as
/// an empty directory, which would otherwise wipe out the other side.
async fn check_source_missing_with_only_deletes(pair: &FolderPair, lines: &[CompareLine]) -> Option<String> {
    let left_exists = path_exists(&pair.left_root).await;
    let right_exists = path_exists(&pair.right_root).await;

    let actionable: Vec<&SyncOperation> = lines.iter().map(|l| &l.op).filter(|op| op.is_actionable()).collect();
    if actionable.is_empty() {
        return None;
    }

    if !left_exists && actionable.iter().all(|op| matches!(op, SyncOperation::DeleteRight)) {
        return Some(format!(
            "left root '{}' is missing, and every scheduled operation deletes from the right; aborting this pair to avoid an unintended wipe",
            pair.left_root.display()
        ));
    }
    if !right_exists && actionable.iter().all(|op| matches!(op, SyncOperation::DeleteLeft)) {
        return Some(format!(
            "right root '{}' is missing, and every scheduled operation deletes from the left; aborting this pair to avoid an unintended wipe",
            pair.right_root.display()
        ));
    }
    None
}

/// §4.11 item 6: a required path is empty while the pair would still
/// perform writes, or the versioning folder is unset while that policy is
/// selected.
fn check_mandatory_fields(pair: &FolderPair, lines: &[CompareLine]) -> Option<String> {
    let writes_scheduled = lines.iter().any(|l| l.op.is_actionable());
    if writes_scheduled && pair.left_root.as_os_str().is_empty() {
        return Some("left root path is empty while writes are scheduled".to_string());
    }
    if writes_scheduled && pair.right_root.as_os_str().is_empty() {
        return Some("right root path is empty while writes are scheduled".to_string());
    }
    if let crate::deletion::DeletionPolicy::Versioning { folder, .. } = &pair.deletion_policy {
        if folder.as_os_str().is_empty() {
            return Some("versioning folder path is empty while DeletionPolicy::Versioning is selected".to_string());
        }
    }
    None
}

/// §4.11 item 3: approximate net bytes needed per target side vs. the
/// free space actually available there.
async fn check_insufficient_free_space(pair: &FolderPair, lines: &[CompareLine]) -> Option<String> {
    let mut left_needed: i64 = 0;
    let mut right_needed: i64 = 0;

    for line in lines {
        match &line.op {
            SyncOperation::CreateLeft | SyncOperation::OverwriteLeft | SyncOperation::MoveLeftTarget => {
                left_needed += line.right.meta.map(|m| m.size as i64).unwrap_or(0);
            }
            SyncOperation::DeleteLeft | SyncOperation::MoveLeftSource => {
                left_needed -= line.left.meta.map(|m| m.size as i64).unwrap_or(0);
            }
            SyncOperation::CreateRight | SyncOperation::OverwriteRight | SyncOperation::MoveRightTarget => {
                right_needed += line.left.meta.map(|m| m.size as i64).unwrap_or(0);
            }
            SyncOperation::DeleteRight | SyncOperation::MoveRightSource => {
                right_needed -= line.right.meta.map(|m| m.size as i64).unwrap_or(0);
            }
            _ => {}
        }
    }

    if left_needed > 0 {
        if let Some(free) = fsops::free_space(&pair.left_root).await {
            if left_needed as u64 > free {
                return Some(format!(
                    "left root '{}' needs about {left_needed} more bytes than the {free} available",
                    pair.left_root.display()
                ));
            }
        }
    }
    if right_needed > 0 {
        if let Some(free) = fsops::free_space(&pair.right_root).await {
            if right_needed as u64 > free {
                return Some(format!(
                    "right root '{}' needs about {right_needed} more bytes than the {free} available",
                    pair.right_root.display()
                ));
            }
        }
    }
    None
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

fn path_contains(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

/// §4.11 item 5, run once across the whole `SyncConfig` (not per pair):
/// flags any two pairs where one's root is an ancestor of (or equal to)
/// the other's, since one pair's reads can then race another's writes.
pub fn detect_overlapping_pairs(pairs: &[FolderPair]) -> Vec<(usize, usize, String)> {
    let mut warnings = Vec::new();
    let roots: Vec<(&Path, &Path)> = pairs.iter().map(|p| (p.left_root.as_path(), p.right_root.as_path())).collect();

    for i in 0..roots.len() {
        for j in (i + 1)..roots.len() {
            let (a_left, a_right) = roots[i];
            let (b_left, b_right) = roots[j];
            if overlaps(a_left, b_left) || overlaps(a_left, b_right) || overlaps(a_right, b_left) || overlaps(a_right, b_right) {
                warnings.push((i, j, format!("folder pairs {i} and {j} have overlapping roots")));
            }
        }
    }
    warnings
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompareLine, EntryKind, FileMeta, Side};
    use crate::path::RelPath;
    use crate::progress::NullProgressObserver;
    use tempfile::tempdir;

    fn line_with_op(op: SyncOperation) -> CompareLine {
        let mut l = CompareLine::new(
            RelPath::parse("a.txt"),
            Side::new(EntryKind::File, Some(FileMeta::new(10, 1))),
            Side::absent(),
        );
        l.op = op;
        l
    }

    #[tokio::test]
    async fn source_missing_with_only_deletes_is_fatal() {
        let left_dir = tempdir().unwrap();
        let right_dir = tempdir().unwrap();
        let missing_left = left_dir.path().join("gone");
        let mut pair = FolderPair::new(&missing_left, right_dir.path());
        pair.deletion_policy = crate::deletion::DeletionPolicy::Permanent;

        let lines = vec![line_with_op(SyncOperation::DeleteRight)];
        let stats = Statistics::default();
        let verdict = run_preflight_checks(&pair, &lines, &stats, &NullProgressObserver).await;
        assert!(matches!(verdict, Verdict::Skip(_)));
    }

    #[tokio::test]
    async fn healthy_pair_with_real_roots_proceeds() {
        let left_dir = tempdir().unwrap();
        let right_dir = tempdir().unwrap();
        let pair = FolderPair::new(left_dir.path(), right_dir.path());
        let lines: Vec<CompareLine> = vec![];
        let stats = Statistics::default();
        let verdict = run_preflight_checks(&pair, &lines, &stats, &NullProgressObserver).await;
        assert_eq!(verdict, Verdict::Proceed);
    }

    #[tokio::test]
    async fn empty_versioning_folder_is_fatal() {
        let left_dir = tempdir().unwrap();
        let right_dir = tempdir().unwrap();
        let mut pair = FolderPair::new(left_dir.path(), right_dir.path());
        pair.deletion_policy =
            crate::deletion::DeletionPolicy::Versioning { folder: std::path::PathBuf::new(), style: crate::deletion::VersioningStyle::Replace };

        let lines = vec![line_with_op(SyncOperation::CreateRight)];
        let stats = Statistics::default();
        let verdict = run_preflight_checks(&pair, &lines, &stats, &NullProgressObserver).await;
        assert!(matches!(verdict, Verdict::Skip(_)));
    }

    #[test]
    fn detect_overlapping_pairs_flags_nested_roots() {
        let pairs = vec![FolderPair::new("/data/a", "/backup/a"), FolderPair::new("/data/a/sub", "/backup/a/sub")];
        let warnings = detect_overlapping_pairs(&pairs);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn detect_overlapping_pairs_ignores_disjoint_roots() {
        let pairs = vec![FolderPair::new("/data/a", "/backup/a"), FolderPair::new("/data/b", "/backup/b")];
        assert!(detect_overlapping_pairs(&pairs).is_empty());
    }
}
