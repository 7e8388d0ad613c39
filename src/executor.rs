//! Sync Executor (C10): applies every `CompareLine`'s resolved
//! `SyncOperation`, in three dependency-respecting passes, per §4.9.
//!
//! Pass 0 relocates same-volume moves directly, through a two-step rename
//! via a sibling `.ffs_tmp` name so a case-only rename on a case-insensitive
//! filesystem never collides with itself mid-flight. Pass 1 walks the line
//! list back to front (children always precede their parent, since the
//! matcher emits a directory immediately before its descendants) and
//! removes everything plus any overwrite that shrinks its target, freeing
//! space before Pass 2 needs it. Pass 2 walks forward (parents before
//! children) creating everything, applying growing/equal-size overwrites,
//! refreshing metadata-only lines, and finishing any move Pass 0 deferred
//! because it crossed volumes.
//!
//! A line whose operation completes is rewritten to `SyncOperation::Equal`;
//! one an `ErrorResolution::Ignore` skipped over is left exactly as
//! scheduled so a caller can tell, from the post-run line list alone,
//! which objects still need attention.

use std::path::{Path, PathBuf};

use crate::deletion::DeletionHandler;
use crate::error::{Result, SyncError};
use crate::fsops::{self, SymlinkTimePolicy};
use crate::model::{CompareLine, EntryKind, Side, SyncOperation};
use crate::path::RelPath;
use crate::preservation::AttributePreserver;
use crate::progress::{ErrorResolution, ProgressObserver};

/// Which side of a pair an overwrite/move/delete targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dest {
    Left,
    Right,
}

/// Totals accumulated while executing one folder pair's line list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub objects_processed: u64,
    pub bytes_processed: u64,
    pub had_errors: bool,
}

impl ExecutionOutcome {
    fn record(&mut self, objects: u64, bytes: u64) {
        self.objects_processed += objects;
        self.bytes_processed += bytes;
    }
}

/// Execute every actionable line in `lines` against the two roots.
pub async fn execute(
    lines: &mut [CompareLine],
    left_root: &Path,
    right_root: &Path,
    left_deletion: &DeletionHandler,
    right_deletion: &DeletionHandler,
    observer: &dyn ProgressObserver,
) -> Result<ExecutionOutcome> {
    let mut outcome = ExecutionOutcome::default();

    pass0_moves(lines, left_root, right_root, observer, &mut outcome).await?;
    pass1_deletes_and_shrinking_overwrites(lines, left_root, right_root, left_deletion, right_deletion, observer, &mut outcome).await?;
    pass2_creates_growing_overwrites_metadata_and_deferred_moves(
        lines,
        left_root,
        right_root,
        left_deletion,
        right_deletion,
        observer,
        &mut outcome,
    )
    .await?;

    Ok(outcome)
}

enum MoveAttempt {
    Done,
    Deferred,
}

async fn pass0_moves(
    lines: &mut [CompareLine],
    left_root: &Path,
    right_root: &Path,
    observer: &dyn ProgressObserver,
    outcome: &mut ExecutionOutcome,
) -> Result<()> {
    for idx in 0..lines.len() {
        let (is_right, source_idx) = match (&lines[idx].op, lines[idx].move_ref) {
            (SyncOperation::MoveRightTarget, Some(r)) => (true, r.0),
            (SyncOperation::MoveLeftTarget, Some(r)) => (false, r.0),
            _ => continue,
        };

        let root = if is_right { right_root } else { left_root };
        let old_path = root.join(lines[source_idx].rel_path.to_path_buf());
        let new_path = root.join(lines[idx].rel_path.to_path_buf());

        match attempt_move(observer, &old_path, &new_path).await? {
            Some(MoveAttempt::Done) => {
                lines[idx].op = SyncOperation::Equal;
                lines[source_idx].op = SyncOperation::Equal;
                if is_right {
                    let moved = lines[source_idx].right.clone();
                    lines[idx].right = moved;
                    lines[source_idx].right = Side::absent();
                } else {
                    let moved = lines[source_idx].left.clone();
                    lines[idx].left = moved;
                    lines[source_idx].left = Side::absent();
                }
                outcome.record(1, 0);
            }
            Some(MoveAttempt::Deferred) => {
                // Crossed volumes: leave both lines as Move* so Pass 2
                // finishes them as a copy-then-delete.
            }
            None => {
                // The user chose to ignore a retryable error; leave both
                // lines as Move* and note the run had an error.
                outcome.had_errors = true;
            }
        }
    }
    Ok(())
}

async fn attempt_move(observer: &dyn ProgressObserver, old_path: &Path, new_path: &Path) -> Result<Option<MoveAttempt>> {
    loop {
        observer.request_ui_refresh()?;
        match move_same_volume(old_path, new_path).await {
            Ok(()) => return Ok(Some(MoveAttempt::Done)),
            Err(SyncError::CrossVolume { .. }) => return Ok(Some(MoveAttempt::Deferred)),
            Err(e) => match observer.report_error(&e.to_string()) {
                ErrorResolution::Retry => continue,
                ErrorResolution::Ignore => return Ok(None),
                ErrorResolution::Abort => return Err(e),
            },
        }
    }
}

/// Relocate `old_path` to `new_path` on the same volume via a two-step
/// rename through a sibling `.ffs_tmp` name, so a case-only rename on a
/// case-insensitive filesystem never collides with the still-present
/// original under a single direct rename.
async fn move_same_volume(old_path: &Path, new_path: &Path) -> Result<()> {
    if let Some(parent) = new_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::path_error(parent, format!("mkdir for move target failed: {e}")))?;
    }
    let tmp = sibling_tmp_name(new_path);
    fsops::rename(old_path, &tmp).await?;
    fsops::rename(&tmp, new_path).await
}

fn sibling_tmp_name(path: &Path) -> PathBuf {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let unique = uuid::Uuid::new_v4().simple().to_string();
    path.with_file_name(format!(".{file_name}.{unique}.ffs_tmp"))
}

#[allow(clippy::too_many_arguments)]
async fn pass1_deletes_and_shrinking_overwrites(
    lines: &mut [CompareLine],
    left_root: &Path,
    right_root: &Path,
    left_deletion: &DeletionHandler,
    right_deletion: &DeletionHandler,
    observer: &dyn ProgressObserver,
    outcome: &mut ExecutionOutcome,
) -> Result<()> {
    for idx in (0..lines.len()).rev() {
        match lines[idx].op {
            SyncOperation::DeleteLeft => {
                let rel = lines[idx].rel_path.clone();
                let kind = lines[idx].left.kind.clone();
                let size = lines[idx].left.meta.map(|m| m.size).unwrap_or(0);
                if apply_delete(&rel, &kind, size, left_deletion, observer, outcome).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].left = Side::absent();
                }
            }
            SyncOperation::DeleteRight => {
                let rel = lines[idx].rel_path.clone();
                let kind = lines[idx].right.kind.clone();
                let size = lines[idx].right.meta.map(|m| m.size).unwrap_or(0);
                if apply_delete(&rel, &kind, size, right_deletion, observer, outcome).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].right = Side::absent();
                }
            }
            SyncOperation::OverwriteRight if is_shrinking(&lines[idx], Dest::Right) => {
                let new_side = lines[idx].left.clone();
                if apply_overwrite_at(&lines[idx], left_root, right_root, right_deletion, observer, outcome, Dest::Right).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].right = new_side;
                }
            }
            SyncOperation::OverwriteLeft if is_shrinking(&lines[idx], Dest::Left) => {
                let new_side = lines[idx].right.clone();
                if apply_overwrite_at(&lines[idx], left_root, right_root, left_deletion, observer, outcome, Dest::Left).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].left = new_side;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn is_shrinking(line: &CompareLine, dest: Dest) -> bool {
    match (dest, line.left.meta, line.right.meta) {
        (Dest::Right, Some(l), Some(r)) => l.size < r.size,
        (Dest::Left, Some(l), Some(r)) => r.size < l.size,
        _ => false,
    }
}

/// Remove one scheduled object through its side's `DeletionHandler`.
/// Returns `Ok(true)` on success, `Ok(false)` when the user chose to
/// ignore a retryable error, and propagates on abort or cancellation.
async fn apply_delete(
    rel_path: &RelPath,
    kind: &EntryKind,
    size: u64,
    handler: &DeletionHandler,
    observer: &dyn ProgressObserver,
    outcome: &mut ExecutionOutcome,
) -> Result<bool> {
    loop {
        observer.request_ui_refresh()?;
        let result = match kind {
            EntryKind::Directory => handler.remove_dir(rel_path, |_p| {}).await,
            EntryKind::Symlink { kind: link_kind, .. } => handler.remove_symlink(rel_path, size, *link_kind, |_n| {}).await,
            EntryKind::File => handler.remove_file(rel_path, size, |_n| {}).await,
            EntryKind::Absent => unreachable!("a delete op always implies a present side"),
        };
        match result {
            Ok(()) => {
                outcome.record(1, 0);
                return Ok(true);
            }
            Err(e) => match observer.report_error(&e.to_string()) {
                ErrorResolution::Retry => continue,
                ErrorResolution::Ignore => {
                    outcome.had_errors = true;
                    return Ok(false);
                }
                ErrorResolution::Abort => return Err(e),
            },
        }
    }
}

/// Create one object (file, directory, or symlink) at `dst_path`, with
/// retry/ignore/abort resolution.
async fn create_with_retry(
    src_path: &Path,
    dst_path: &Path,
    src_side: &Side,
    observer: &dyn ProgressObserver,
    outcome: &mut ExecutionOutcome,
) -> Result<bool> {
    if let Some(parent) = dst_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::path_error(parent, format!("mkdir for create target failed: {e}")))?;
    }

    loop {
        observer.request_ui_refresh()?;
        match create_once(src_path, dst_path, src_side).await {
            Ok(bytes) => {
                outcome.record(1, bytes);
                return Ok(true);
            }
            Err(e) => match observer.report_error(&e.to_string()) {
                ErrorResolution::Retry => continue,
                ErrorResolution::Ignore => {
                    outcome.had_errors = true;
                    return Ok(false);
                }
                ErrorResolution::Abort => return Err(e),
            },
        }
    }
}

async fn create_once(src_path: &Path, dst_path: &Path, src_side: &Side) -> Result<u64> {
    match &src_side.kind {
        EntryKind::Directory => {
            fsops::make_dir(dst_path, false).await?;
            Ok(0)
        }
        EntryKind::File => {
            let meta = src_side.meta.expect("file side must carry FileMeta");
            let written = fsops::copy_file(src_path, dst_path, true, true, |_n| {}).await?;
            fsops::set_mtime(dst_path, meta.mtime_utc_seconds, SymlinkTimePolicy::FollowTarget).await?;
            Ok(written.size)
        }
        EntryKind::Symlink { .. } => {
            fsops::copy_symlink(src_path, dst_path, true).await?;
            let meta = src_side.meta.expect("symlink side must carry FileMeta");
            let _ = fsops::set_mtime(dst_path, meta.mtime_utc_seconds, SymlinkTimePolicy::SetOnLinkItself).await;
            Ok(0)
        }
        EntryKind::Absent => unreachable!("a create op always implies a present source side"),
    }
}

async fn apply_copy_meta(src_path: &Path, dst_path: &Path, observer: &dyn ProgressObserver, outcome: &mut ExecutionOutcome) -> Result<bool> {
    let preserver = AttributePreserver::default();
    loop {
        observer.request_ui_refresh()?;
        match preserver.copy_attributes(src_path, dst_path).await {
            Ok(()) => {
                outcome.record(1, 0);
                return Ok(true);
            }
            Err(e) => match observer.report_error(&e.to_string()) {
                ErrorResolution::Retry => continue,
                ErrorResolution::Ignore => {
                    outcome.had_errors = true;
                    return Ok(false);
                }
                ErrorResolution::Abort => return Err(e),
            },
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn pass2_creates_growing_overwrites_metadata_and_deferred_moves(
    lines: &mut [CompareLine],
    left_root: &Path,
    right_root: &Path,
    left_deletion: &DeletionHandler,
    right_deletion: &DeletionHandler,
    observer: &dyn ProgressObserver,
    outcome: &mut ExecutionOutcome,
) -> Result<()> {
    for idx in 0..lines.len() {
        match lines[idx].op.clone() {
            SyncOperation::CreateRight => {
                let rel = lines[idx].rel_path.clone();
                let src_path = left_root.join(rel.to_path_buf());
                let dst_path = right_root.join(rel.to_path_buf());
                let src_side = lines[idx].left.clone();
                if create_with_retry(&src_path, &dst_path, &src_side, observer, outcome).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].right = src_side;
                }
            }
            SyncOperation::CreateLeft => {
                let rel = lines[idx].rel_path.clone();
                let src_path = right_root.join(rel.to_path_buf());
                let dst_path = left_root.join(rel.to_path_buf());
                let src_side = lines[idx].right.clone();
                if create_with_retry(&src_path, &dst_path, &src_side, observer, outcome).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].left = src_side;
                }
            }
            SyncOperation::OverwriteRight if !is_shrinking(&lines[idx], Dest::Right) => {
                let new_side = lines[idx].left.clone();
                if apply_overwrite_at(&lines[idx], left_root, right_root, right_deletion, observer, outcome, Dest::Right).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].right = new_side;
                }
            }
            SyncOperation::OverwriteLeft if !is_shrinking(&lines[idx], Dest::Left) => {
                let new_side = lines[idx].right.clone();
                if apply_overwrite_at(&lines[idx], left_root, right_root, left_deletion, observer, outcome, Dest::Left).await? {
                    lines[idx].op = SyncOperation::Equal;
                    lines[idx].left = new_side;
                }
            }
            SyncOperation::CopyMetaRight => {
                let rel = lines[idx].rel_path.clone();
                let src_path = left_root.join(rel.to_path_buf());
                let dst_path = right_root.join(rel.to_path_buf());
                let src_mtime = lines[idx].left.meta.map(|m| m.mtime_utc_seconds);
                if apply_copy_meta(&src_path, &dst_path, observer, outcome).await? {
                    lines[idx].op = SyncOperation::Equal;
                    if let (Some(mtime), Some(dst_meta)) = (src_mtime, lines[idx].right.meta) {
                        lines[idx].right.meta = Some(crate::model::FileMeta { mtime_utc_seconds: mtime, ..dst_meta });
                    }
                }
            }
            SyncOperation::CopyMetaLeft => {
                let rel = lines[idx].rel_path.clone();
                let src_path = right_root.join(rel.to_path_buf());
                let dst_path = left_root.join(rel.to_path_buf());
                let src_mtime = lines[idx].right.meta.map(|m| m.mtime_utc_seconds);
                if apply_copy_meta(&src_path, &dst_path, observer, outcome).await? {
                    lines[idx].op = SyncOperation::Equal;
                    if let (Some(mtime), Some(dst_meta)) = (src_mtime, lines[idx].left.meta) {
                        lines[idx].left.meta = Some(crate::model::FileMeta { mtime_utc_seconds: mtime, ..dst_meta });
                    }
                }
            }
            SyncOperation::MoveRightTarget => {
                if let Some(source_idx) = lines[idx].move_ref.map(|r| r.0) {
                    let target_rel = lines[idx].rel_path.clone();
                    let source_rel = lines[source_idx].rel_path.clone();
                    let content_side = lines[idx].left.clone();
                    let src_path = left_root.join(target_rel.to_path_buf());
                    let dst_path = right_root.join(target_rel.to_path_buf());
                    let old_kind = lines[source_idx].right.kind.clone();
                    let old_size = lines[source_idx].right.meta.map(|m| m.size).unwrap_or(0);

                    if apply_deferred_move(
                        &src_path,
                        &dst_path,
                        &content_side,
                        &source_rel,
                        &old_kind,
                        old_size,
                        right_deletion,
                        observer,
                        outcome,
                    )
                    .await?
                    {
                        lines[idx].op = SyncOperation::Equal;
                        lines[source_idx].op = SyncOperation::Equal;
                        lines[idx].right = content_side;
                        lines[source_idx].right = Side::absent();
                    }
                }
            }
            SyncOperation::MoveLeftTarget => {
                if let Some(source_idx) = lines[idx].move_ref.map(|r| r.0) {
                    let target_rel = lines[idx].rel_path.clone();
                    let source_rel = lines[source_idx].rel_path.clone();
                    let content_side = lines[idx].right.clone();
                    let src_path = right_root.join(target_rel.to_path_buf());
                    let dst_path = left_root.join(target_rel.to_path_buf());
                    let old_kind = lines[source_idx].left.kind.clone();
                    let old_size = lines[source_idx].left.meta.map(|m| m.size).unwrap_or(0);

                    if apply_deferred_move(
                        &src_path,
                        &dst_path,
                        &content_side,
                        &source_rel,
                        &old_kind,
                        old_size,
                        left_deletion,
                        observer,
                        outcome,
                    )
                    .await?
                    {
                        lines[idx].op = SyncOperation::Equal;
                        lines[source_idx].op = SyncOperation::Equal;
                        lines[idx].left = content_side;
                        lines[source_idx].left = Side::absent();
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn apply_overwrite_at(
    line: &CompareLine,
    left_root: &Path,
    right_root: &Path,
    dest_handler: &DeletionHandler,
    observer: &dyn ProgressObserver,
    outcome: &mut ExecutionOutcome,
    dest: Dest,
) -> Result<bool> {
    let rel = line.rel_path.clone();
    let (src_side, dst_meta, dst_kind, src_path, dst_path) = match dest {
        Dest::Right => (&line.left, line.right.meta, line.right.kind.clone(), left_root.join(rel.to_path_buf()), right_root.join(rel.to_path_buf())),
        Dest::Left => (&line.right, line.left.meta, line.left.kind.clone(), right_root.join(rel.to_path_buf()), left_root.join(rel.to_path_buf())),
    };

    if dest_handler.preserves_old_version() {
        let old_size = dst_meta.map(|m| m.size).unwrap_or(0);
        if !apply_delete(&rel, &dst_kind, old_size, dest_handler, observer, outcome).await? {
            return Ok(false);
        }
    }

    create_with_retry(&src_path, &dst_path, src_side, observer, outcome).await
}

/// Finish a move Pass 0 deferred because it crossed volumes: copy the
/// content to its new relative path, then relocate the vacated old path
/// through the destination's deletion policy, the same as any other
/// removed item.
#[allow(clippy::too_many_arguments)]
async fn apply_deferred_move(
    src_path: &Path,
    dst_path: &Path,
    content_side: &Side,
    old_rel_path: &RelPath,
    old_kind: &EntryKind,
    old_size: u64,
    dest_handler: &DeletionHandler,
    observer: &dyn ProgressObserver,
    outcome: &mut ExecutionOutcome,
) -> Result<bool> {
    if !create_with_retry(src_path, dst_path, content_side, observer, outcome).await? {
        return Ok(false);
    }
    apply_delete(old_rel_path, old_kind, old_size, dest_handler, observer, outcome).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deletion::DeletionPolicy;
    use crate::model::FileMeta;
    use crate::progress::NullProgressObserver;
    use tempfile::tempdir;

    async fn handlers(left: &Path, right: &Path) -> (DeletionHandler, DeletionHandler) {
        (
            DeletionHandler::new(left, DeletionPolicy::Permanent, "2026-01-01 000000".into()).await,
            DeletionHandler::new(right, DeletionPolicy::Permanent, "2026-01-01 000000".into()).await,
        )
    }

    #[tokio::test]
    async fn create_right_copies_file_and_sets_mtime() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        tokio::fs::write(left.path().join("a.txt"), b"hello").await.unwrap();
        let (lh, rh) = handlers(left.path(), right.path()).await;

        let mut lines = vec![CompareLine::new(
            RelPath::parse("a.txt"),
            Side::new(EntryKind::File, Some(FileMeta::new(5, 1_700_000_000))),
            Side::absent(),
        )];
        lines[0].op = SyncOperation::CreateRight;

        let outcome = execute(&mut lines, left.path(), right.path(), &lh, &rh, &NullProgressObserver).await.unwrap();
        assert_eq!(outcome.objects_processed, 1);
        assert!(!outcome.had_errors);
        assert_eq!(tokio::fs::read(right.path().join("a.txt")).await.unwrap(), b"hello");
        assert_eq!(lines[0].op, SyncOperation::Equal);
        assert!(matches!(lines[0].right.kind, EntryKind::File));
        assert_eq!(lines[0].right.meta.unwrap().size, 5);
        assert_eq!(lines[0].right.meta.unwrap().mtime_utc_seconds, 1_700_000_000);
    }

    #[tokio::test]
    async fn delete_left_removes_file_through_handler() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        tokio::fs::write(left.path().join("a.txt"), b"hello").await.unwrap();
        let (lh, rh) = handlers(left.path(), right.path()).await;

        let mut lines = vec![CompareLine::new(
            RelPath::parse("a.txt"),
            Side::new(EntryKind::File, Some(FileMeta::new(5, 1))),
            Side::absent(),
        )];
        lines[0].op = SyncOperation::DeleteLeft;

        execute(&mut lines, left.path(), right.path(), &lh, &rh, &NullProgressObserver).await.unwrap();
        assert!(!left.path().join("a.txt").exists());
        assert_eq!(lines[0].op, SyncOperation::Equal);
        assert!(lines[0].left.is_absent());
    }

    #[tokio::test]
    async fn overwrite_right_replaces_content() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        tokio::fs::write(left.path().join("a.txt"), b"new-and-longer").await.unwrap();
        tokio::fs::write(right.path().join("a.txt"), b"old").await.unwrap();
        let (lh, rh) = handlers(left.path(), right.path()).await;

        let mut lines = vec![CompareLine::new(
            RelPath::parse("a.txt"),
            Side::new(EntryKind::File, Some(FileMeta::new(14, 2))),
            Side::new(EntryKind::File, Some(FileMeta::new(3, 1))),
        )];
        lines[0].op = SyncOperation::OverwriteRight;

        execute(&mut lines, left.path(), right.path(), &lh, &rh, &NullProgressObserver).await.unwrap();
        assert_eq!(tokio::fs::read(right.path().join("a.txt")).await.unwrap(), b"new-and-longer");
        assert_eq!(lines[0].right.meta.unwrap().size, 14);
        assert_eq!(lines[0].right.meta.unwrap().mtime_utc_seconds, 2);
    }

    #[tokio::test]
    async fn same_volume_move_relocates_without_copy() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        tokio::fs::write(left.path().join("new.txt"), b"hello").await.unwrap();
        tokio::fs::write(right.path().join("old.txt"), b"hello").await.unwrap();
        let (lh, rh) = handlers(left.path(), right.path()).await;

        let meta = FileMeta::new(5, 1);
        let mut target = CompareLine::new(RelPath::parse("new.txt"), Side::new(EntryKind::File, Some(meta)), Side::absent());
        target.op = SyncOperation::MoveRightTarget;
        target.move_ref = Some(crate::model::LineId(1));
        let mut source = CompareLine::new(RelPath::parse("old.txt"), Side::absent(), Side::new(EntryKind::File, Some(meta)));
        source.op = SyncOperation::MoveRightSource;
        source.move_ref = Some(crate::model::LineId(0));

        let mut lines = vec![target, source];
        execute(&mut lines, left.path(), right.path(), &lh, &rh, &NullProgressObserver).await.unwrap();

        assert!(right.path().join("new.txt").exists());
        assert!(!right.path().join("old.txt").exists());
        assert_eq!(lines[0].op, SyncOperation::Equal);
        assert_eq!(lines[1].op, SyncOperation::Equal);
        assert!(matches!(lines[0].right.kind, EntryKind::File));
        assert_eq!(lines[0].right.meta.unwrap().size, 5);
        assert!(lines[1].right.is_absent());
    }

    #[tokio::test]
    async fn copy_meta_right_refreshes_mtime_only() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        tokio::fs::write(left.path().join("a.txt"), b"same").await.unwrap();
        tokio::fs::write(right.path().join("a.txt"), b"same").await.unwrap();
        let (lh, rh) = handlers(left.path(), right.path()).await;

        let mut lines = vec![CompareLine::new(
            RelPath::parse("a.txt"),
            Side::new(EntryKind::File, Some(FileMeta::new(4, 2_000_000_000))),
            Side::new(EntryKind::File, Some(FileMeta::new(4, 1_000_000_000))),
        )];
        lines[0].op = SyncOperation::CopyMetaRight;

        execute(&mut lines, left.path(), right.path(), &lh, &rh, &NullProgressObserver).await.unwrap();
        assert_eq!(tokio::fs::read(right.path().join("a.txt")).await.unwrap(), b"same");
        assert_eq!(lines[0].op, SyncOperation::Equal);
        assert_eq!(lines[0].right.meta.unwrap().mtime_utc_seconds, 2_000_000_000);
        assert_eq!(lines[0].right.meta.unwrap().size, 4);
    }
}
