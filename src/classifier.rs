//! Classifier (C5): assigns a `ComparisonResult` to each `CompareLine`,
//! either from size+mtime alone or by hashing file content.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{CompareLine, ComparisonResult, EntryKind, FileMeta};
use crate::progress::{Phase, ProgressObserver};

/// Default mtime tolerance (seconds) absorbing FAT/NTFS rounding
/// discrepancies between filesystems, per §3.
pub const DEFAULT_MTIME_TOLERANCE_SECONDS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifyMode {
    ByTimeAndSize { tolerance_seconds: i64 },
    ByContent,
}

impl ClassifyMode {
    pub fn by_time_and_size_default() -> Self {
        ClassifyMode::ByTimeAndSize { tolerance_seconds: DEFAULT_MTIME_TOLERANCE_SECONDS }
    }
}

pub struct Classifier {
    mode: ClassifyMode,
}

impl Classifier {
    pub fn new(mode: ClassifyMode) -> Self {
        Self { mode }
    }

    /// Classify every line in place. `left_root`/`right_root` are needed
    /// only in `ByContent` mode, to open files for hashing.
    pub async fn classify_all(
        &self,
        lines: &mut [CompareLine],
        left_root: &Path,
        right_root: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<()> {
        for line in lines.iter_mut() {
            observer.request_ui_refresh()?;
            line.cmp = self.classify_line(line, left_root, right_root, observer).await?;
        }
        Ok(())
    }

    async fn classify_line(
        &self,
        line: &CompareLine,
        left_root: &Path,
        right_root: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<ComparisonResult> {
        if line.right.is_absent() {
            return Ok(ComparisonResult::LeftOnly);
        }
        if line.left.is_absent() {
            return Ok(ComparisonResult::RightOnly);
        }

        match (&line.left.kind, &line.right.kind) {
            (EntryKind::Directory, EntryKind::Directory) => Ok(ComparisonResult::Equal),

            (EntryKind::File, EntryKind::File) => {
                let lm = line.left.meta.expect("file side must carry FileMeta");
                let rm = line.right.meta.expect("file side must carry FileMeta");
                match self.mode {
                    ClassifyMode::ByTimeAndSize { tolerance_seconds } => {
                        Ok(classify_by_time_and_size(lm, rm, tolerance_seconds))
                    }
                    ClassifyMode::ByContent => {
                        self.classify_by_content(line, left_root, right_root, lm, rm, observer).await
                    }
                }
            }

            (EntryKind::Symlink { target: lt, .. }, EntryKind::Symlink { target: rt, .. }) => {
                let lm = line.left.meta.expect("symlink side must carry FileMeta");
                let rm = line.right.meta.expect("symlink side must carry FileMeta");
                match self.mode {
                    ClassifyMode::ByTimeAndSize { tolerance_seconds } => {
                        // Fall back to mtime + target-length as the "size".
                        let lm = FileMeta { size: lt.len() as u64, ..lm };
                        let rm = FileMeta { size: rt.len() as u64, ..rm };
                        Ok(classify_by_time_and_size(lm, rm, tolerance_seconds))
                    }
                    ClassifyMode::ByContent => {
                        Ok(if lt == rt { ComparisonResult::Equal } else { ComparisonResult::Different })
                    }
                }
            }

            // A kind mismatch here means the matcher did not treat this as
            // a directory/non-directory type clash (e.g. File vs Symlink
            // with the same name) — surfaced as a conflict rather than
            // silently picking a side.
            (l, r) => Ok(ComparisonResult::Conflict(format!(
                "incompatible entry kinds: left={l:?}, right={r:?}"
            ))),
        }
    }

    async fn classify_by_content(
        &self,
        line: &CompareLine,
        left_root: &Path,
        right_root: &Path,
        lm: FileMeta,
        rm: FileMeta,
        observer: &dyn ProgressObserver,
    ) -> Result<ComparisonResult> {
        if lm.size != rm.size {
            return Ok(ComparisonResult::Different);
        }
        let left_path = left_root.join(line.rel_path.to_path_buf());
        let right_path = right_root.join(line.rel_path.to_path_buf());
        let left_hash = hash_file(&left_path, observer).await?;
        let right_hash = hash_file(&right_path, observer).await?;
        Ok(if left_hash == right_hash { ComparisonResult::Equal } else { ComparisonResult::Different })
    }
}

/// Deterministic tie-break per §4.4: within tolerance and equal size is
/// Equal; within tolerance and different size is a same-time conflict;
/// outside tolerance, the numerically larger (newer) mtime wins.
fn classify_by_time_and_size(left: FileMeta, right: FileMeta, tolerance_seconds: i64) -> ComparisonResult {
    let diff = left.mtime_utc_seconds - right.mtime_utc_seconds;
    if diff.abs() <= tolerance_seconds {
        if left.size == right.size {
            ComparisonResult::Equal
        } else {
            ComparisonResult::Conflict("same time, different size".to_string())
        }
    } else if diff > 0 {
        ComparisonResult::LeftNewer
    } else {
        ComparisonResult::RightNewer
    }
}

async fn hash_file(path: &Path, observer: &dyn ProgressObserver) -> Result<blake3::Hash> {
    use tokio::io::AsyncReadExt;
    const BUF_SIZE: usize = 512 * 1024;

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| crate::error::SyncError::hash_error(path, format!("open failed: {e}")))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| crate::error::SyncError::hash_error(path, format!("read failed: {e}")))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        observer.on_processed(0, n as u64);
    }
    Ok(hasher.finalize())
}

pub fn init_compare_content_phase(observer: &dyn ProgressObserver, total_bytes: u64) {
    observer.init_phase(Phase::CompareContent, 0, total_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompareLine, Side};
    use crate::path::RelPath;
    use crate::progress::NullProgressObserver;
    use tempfile::tempdir;

    fn line_with(left: FileMeta, right: FileMeta) -> CompareLine {
        CompareLine::new(
            RelPath::parse("a.txt"),
            Side::new(EntryKind::File, Some(left)),
            Side::new(EntryKind::File, Some(right)),
        )
    }

    #[tokio::test]
    async fn equal_within_tolerance_and_same_size() {
        let classifier = Classifier::new(ClassifyMode::ByTimeAndSize { tolerance_seconds: 2 });
        let mut line = line_with(FileMeta::new(10, 1000), FileMeta::new(10, 999));
        let dir = tempdir().unwrap();
        classifier.classify_all(std::slice::from_mut(&mut line), dir.path(), dir.path(), &NullProgressObserver).await.unwrap();
        assert_eq!(line.cmp, ComparisonResult::Equal);
    }

    #[tokio::test]
    async fn same_time_different_size_is_conflict() {
        let classifier = Classifier::new(ClassifyMode::ByTimeAndSize { tolerance_seconds: 2 });
        let mut line = line_with(FileMeta::new(10, 1000), FileMeta::new(20, 1000));
        let dir = tempdir().unwrap();
        classifier.classify_all(std::slice::from_mut(&mut line), dir.path(), dir.path(), &NullProgressObserver).await.unwrap();
        assert!(line.cmp.is_conflict());
    }

    #[tokio::test]
    async fn outside_tolerance_newer_side_wins() {
        let classifier = Classifier::new(ClassifyMode::ByTimeAndSize { tolerance_seconds: 2 });
        let mut line = line_with(FileMeta::new(10, 2000), FileMeta::new(10, 1000));
        let dir = tempdir().unwrap();
        classifier.classify_all(std::slice::from_mut(&mut line), dir.path(), dir.path(), &NullProgressObserver).await.unwrap();
        assert_eq!(line.cmp, ComparisonResult::LeftNewer);
    }

    #[tokio::test]
    async fn by_content_detects_equal_and_different_files() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"same").await.unwrap();
        tokio::fs::create_dir(dir.path().join("r")).await.unwrap();
        tokio::fs::write(dir.path().join("r/a.txt"), b"same").await.unwrap();

        let classifier = Classifier::new(ClassifyMode::ByContent);
        let mut line = line_with(FileMeta::new(4, 1), FileMeta::new(4, 2));
        classifier
            .classify_all(std::slice::from_mut(&mut line), dir.path(), dir.path().join("r").as_path(), &NullProgressObserver)
            .await
            .unwrap();
        assert_eq!(line.cmp, ComparisonResult::Equal);
    }

    #[tokio::test]
    async fn by_content_short_circuits_on_size_difference() {
        let classifier = Classifier::new(ClassifyMode::ByContent);
        let mut line = line_with(FileMeta::new(4, 1), FileMeta::new(5, 1));
        let dir = tempdir().unwrap();
        classifier.classify_all(std::slice::from_mut(&mut line), dir.path(), dir.path(), &NullProgressObserver).await.unwrap();
        assert_eq!(line.cmp, ComparisonResult::Different);
    }

    #[test]
    fn directories_are_always_equal() {
        let mut line = CompareLine::new(
            RelPath::parse("sub"),
            Side::new(EntryKind::Directory, None),
            Side::new(EntryKind::Directory, None),
        );
        line.cmp = classify_by_time_and_size(FileMeta::new(0, 0), FileMeta::new(0, 0), 2);
        // directories never reach classify_by_time_and_size in practice;
        // this asserts the helper itself treats equal inputs as Equal.
        assert_eq!(line.cmp, ComparisonResult::Equal);
    }
}
