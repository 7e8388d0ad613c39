//! Platform-neutral filesystem primitives (C1). Everything above this
//! module talks to the filesystem only through here, so long-path
//! quirks, cross-volume rename detection, and transactional copy live in
//! exactly one place.

use crate::error::{Result, SyncError};
use crate::model::{EntryKind, FileId, FileMeta, LinkKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Whether two paths are known to live on the same volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameVolume {
    Yes,
    No,
    Unknown,
}

/// One entry as returned by a single-level directory read.
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub short_name: String,
    pub kind: EntryKind,
    pub meta: Option<FileMeta>,
}

/// Read one directory level without following symlinks. Does not recurse;
/// the scanner (C3) drives recursion.
pub async fn read_dir_entries(dir: &Path) -> Result<Vec<DirEntryInfo>> {
    let mut rd = fs::read_dir(dir)
        .await
        .map_err(|e| SyncError::scan_error(dir, format!("cannot read directory: {e}")))?;

    let mut out = Vec::new();
    while let Some(entry) = rd
        .next_entry()
        .await
        .map_err(|e| SyncError::scan_error(dir, format!("cannot iterate directory: {e}")))?
    {
        let short_name = entry.file_name().to_string_lossy().into_owned();
        let (kind, meta) = stat(&entry.path(), false).await?;
        out.push(DirEntryInfo { short_name, kind, meta });
    }
    Ok(out)
}

/// Stat a single path. When `follow_symlinks` is false, a symlink is
/// reported as `EntryKind::Symlink` rather than resolved.
pub async fn stat(path: &Path, follow_symlinks: bool) -> Result<(EntryKind, Option<FileMeta>)> {
    let symlink_meta = fs::symlink_metadata(path)
        .await
        .map_err(|e| SyncError::scan_error(path, format!("stat failed: {e}")))?;

    if symlink_meta.file_type().is_symlink() && !follow_symlinks {
        let target = fs::read_link(path)
            .await
            .map_err(|e| SyncError::scan_error(path, format!("readlink failed: {e}")))?;
        let target_is_dir = fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false);
        let kind = EntryKind::Symlink {
            target: target.to_string_lossy().into_owned(),
            kind: if target_is_dir { LinkKind::DirLink } else { LinkKind::FileLink },
        };
        let meta = file_meta_from_std(&symlink_meta, path);
        return Ok((kind, Some(meta)));
    }

    let meta = if follow_symlinks {
        fs::metadata(path)
            .await
            .map_err(|e| SyncError::scan_error(path, format!("stat failed: {e}")))?
    } else {
        symlink_meta
    };

    if meta.is_dir() {
        Ok((EntryKind::Directory, None))
    } else {
        Ok((EntryKind::File, Some(file_meta_from_std(&meta, path))))
    }
}

fn file_meta_from_std(meta: &std::fs::Metadata, path: &Path) -> FileMeta {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let mut fm = FileMeta::new(meta.len(), mtime);
    if let Some(id) = file_id(meta, path) {
        fm = fm.with_file_id(id);
    }
    fm
}

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata, _path: &Path) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId(meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata, _path: &Path) -> Option<FileId> {
    None
}

/// Copy a file's bytes. When `transactional`, writes to a sibling temp name
/// and renames atomically into place, removing the temp file on any error.
/// `progress` is called after each buffer with the number of bytes written.
pub async fn copy_file<F>(
    src: &Path,
    dst: &Path,
    transactional: bool,
    copy_permissions: bool,
    mut progress: F,
) -> Result<FileMeta>
where
    F: FnMut(u64),
{
    const BUF_SIZE: usize = 512 * 1024;

    let write_target = if transactional {
        sibling_temp_name(dst)
    } else {
        dst.to_path_buf()
    };

    let result = async {
        let mut reader = fs::File::open(src)
            .await
            .map_err(|e| SyncError::copy_error(src, dst, format!("open source failed: {e}")))?;
        let mut writer = fs::File::create(&write_target)
            .await
            .map_err(|e| SyncError::copy_error(src, dst, format!("create destination failed: {e}")))?;

        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| SyncError::copy_error(src, dst, format!("read failed: {e}")))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|e| SyncError::copy_error(src, dst, format!("write failed: {e}")))?;
            progress(n as u64);
        }
        writer
            .flush()
            .await
            .map_err(|e| SyncError::copy_error(src, dst, format!("flush failed: {e}")))?;
        Ok::<(), SyncError>(())
    }
    .await;

    if let Err(e) = result {
        if transactional {
            let _ = fs::remove_file(&write_target).await;
        }
        return Err(e);
    }

    if transactional {
        fs::rename(&write_target, dst).await.map_err(|e| {
            SyncError::copy_error(src, dst, format!("atomic rename into place failed: {e}"))
        })?;
    }

    if copy_permissions {
        copy_permission_bits(src, dst).await?;
    }

    let (_, meta) = stat(dst, false).await?;
    meta.ok_or_else(|| SyncError::copy_error(src, dst, "destination has no metadata after copy"))
}

fn sibling_temp_name(dst: &Path) -> PathBuf {
    let file_name = dst.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let unique = uuid::Uuid::new_v4().simple().to_string();
    dst.with_file_name(format!(".{file_name}.{unique}.ffs_tmp"))
}

#[cfg(unix)]
async fn copy_permission_bits(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::metadata(src)
        .await
        .map_err(|e| SyncError::permission_error(src, format!("stat for permission copy failed: {e}")))?;
    fs::set_permissions(dst, meta.permissions())
        .await
        .map_err(|e| SyncError::permission_error(dst, format!("set permissions failed: {e}")))
}

#[cfg(not(unix))]
async fn copy_permission_bits(_src: &Path, _dst: &Path) -> Result<()> {
    Ok(())
}

/// Copy a symlink by recreating it at `dst` pointing at the same target.
pub async fn copy_symlink(src: &Path, dst: &Path, copy_permissions: bool) -> Result<()> {
    let target = fs::read_link(src)
        .await
        .map_err(|e| SyncError::copy_error(src, dst, format!("readlink failed: {e}")))?;

    #[cfg(unix)]
    {
        tokio::fs::symlink(&target, dst)
            .await
            .map_err(|e| SyncError::copy_error(src, dst, format!("symlink create failed: {e}")))?;
    }
    #[cfg(windows)]
    {
        let target_is_dir = fs::metadata(src).await.map(|m| m.is_dir()).unwrap_or(false);
        if target_is_dir {
            tokio::fs::symlink_dir(&target, dst)
                .await
                .map_err(|e| SyncError::copy_error(src, dst, format!("symlink_dir create failed: {e}")))?;
        } else {
            tokio::fs::symlink_file(&target, dst)
                .await
                .map_err(|e| SyncError::copy_error(src, dst, format!("symlink_file create failed: {e}")))?;
        }
    }

    if copy_permissions {
        let _ = copy_permission_bits(src, dst).await;
    }
    Ok(())
}

/// Rename/move `src` to `dst`. Fails with [`SyncError::CrossVolume`] when
/// the two paths are on different volumes and the rename syscall cannot
/// complete atomically; callers fall back to copy+delete in that case.
pub async fn rename(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_cross_volume_error(&e) {
                Err(SyncError::CrossVolume {
                    src: src.to_path_buf(),
                    dst: dst.to_path_buf(),
                })
            } else {
                Err(SyncError::path_error(dst, format!("rename failed: {e}")))
            }
        }
    }
}

#[cfg(unix)]
fn is_cross_volume_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_volume_error(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::Other
}

pub async fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path)
        .await
        .map_err(|e| SyncError::deletion_error(path, format!("remove file failed: {e}")))
}

/// Recursively remove a directory, invoking `on_progress` once per removed
/// child (file, symlink, or subdirectory).
pub async fn remove_dir_recursive<F>(path: &Path, mut on_progress: F) -> Result<()>
where
    F: FnMut(&Path),
{
    remove_dir_recursive_inner(path, &mut on_progress).await
}

fn remove_dir_recursive_inner<'a, F>(
    path: &'a Path,
    on_progress: &'a mut F,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>
where
    F: FnMut(&Path) + Send,
{
    Box::pin(async move {
        let mut rd = fs::read_dir(path)
            .await
            .map_err(|e| SyncError::deletion_error(path, format!("read_dir failed: {e}")))?;

        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| SyncError::deletion_error(path, format!("iterate failed: {e}")))?
        {
            let child_path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SyncError::deletion_error(&child_path, format!("file_type failed: {e}")))?;
            if file_type.is_dir() {
                remove_dir_recursive_inner(&child_path, on_progress).await?;
            } else {
                fs::remove_file(&child_path)
                    .await
                    .map_err(|e| SyncError::deletion_error(&child_path, format!("remove failed: {e}")))?;
                on_progress(&child_path);
            }
        }
        fs::remove_dir(path)
            .await
            .map_err(|e| SyncError::deletion_error(path, format!("rmdir failed: {e}")))?;
        on_progress(path);
        Ok(())
    })
}

pub async fn make_dir(path: &Path, fail_if_exists: bool) -> Result<()> {
    match fs::create_dir(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            if fail_if_exists {
                Err(SyncError::TargetExists { path: path.to_path_buf() })
            } else {
                Ok(())
            }
        }
        Err(e) => Err(SyncError::path_error(path, format!("mkdir failed: {e}"))),
    }
}

/// How to treat symlinks when setting mtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkTimePolicy {
    FollowTarget,
    SetOnLinkItself,
}

pub async fn set_mtime(path: &Path, mtime_utc_seconds: i64, policy: SymlinkTimePolicy) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let ft = filetime::FileTime::from_unix_time(mtime_utc_seconds, 0);
        let result = match policy {
            SymlinkTimePolicy::FollowTarget => filetime::set_file_mtime(&path, ft),
            SymlinkTimePolicy::SetOnLinkItself => filetime::set_symlink_file_times(&path, ft, ft),
        };
        result.map_err(|e| SyncError::path_error(&path, format!("set mtime failed: {e}")))
    })
    .await
    .map_err(|e| SyncError::Generic(anyhow::anyhow!("set_mtime task panicked: {e}")))?
}

/// Best-effort same-volume check, used to decide whether a rename can be
/// attempted atomically before even trying it (mostly informational; the
/// authoritative signal is still the `CrossVolume` error from `rename`).
pub async fn same_volume(a: &Path, b: &Path) -> SameVolume {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let da = tokio::fs::metadata(a).await.ok();
        let db = tokio::fs::metadata(b.parent().unwrap_or(b)).await.ok();
        match (da, db) {
            (Some(x), Some(y)) => {
                if x.dev() == y.dev() {
                    SameVolume::Yes
                } else {
                    SameVolume::No
                }
            }
            _ => SameVolume::Unknown,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (a, b);
        SameVolume::Unknown
    }
}

/// Free space available on the volume containing `path`, if determinable.
pub async fn free_space(path: &Path) -> Option<u64> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || fs2::available_space(&path).ok())
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn read_dir_entries_reports_files_and_dirs() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"hello").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();

        let entries = read_dir_entries(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 2);
        let file_entry = entries.iter().find(|e| e.short_name == "a.txt").unwrap();
        assert!(matches!(file_entry.kind, EntryKind::File));
        assert_eq!(file_entry.meta.unwrap().size, 5);
    }

    #[tokio::test]
    async fn copy_file_transactional_round_trip() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        tokio::fs::write(&src, b"payload").await.unwrap();

        let mut total = 0u64;
        let meta = copy_file(&src, &dst, true, false, |n| total += n).await.unwrap();
        assert_eq!(meta.size, 7);
        assert_eq!(total, 7);
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn rename_within_same_dir_succeeds() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        tokio::fs::write(&src, b"x").await.unwrap();
        rename(&src, &dst).await.unwrap();
        assert!(!src.exists());
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn remove_dir_recursive_removes_everything() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        tokio::fs::create_dir(&sub).await.unwrap();
        tokio::fs::write(sub.join("f.txt"), b"x").await.unwrap();

        let mut removed = Vec::new();
        remove_dir_recursive(&sub, |p| removed.push(p.to_path_buf())).await.unwrap();
        assert!(!sub.exists());
        assert_eq!(removed.len(), 2);
    }

    #[tokio::test]
    async fn make_dir_fail_if_exists() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("sub");
        make_dir(&target, true).await.unwrap();
        let err = make_dir(&target, true).await.unwrap_err();
        assert!(matches!(err, SyncError::TargetExists { .. }));
        make_dir(&target, false).await.unwrap();
    }
}
