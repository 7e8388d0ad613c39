//! Core data model shared by the scanner, matcher, classifier, direction
//! resolver, and executor: `EntryKind`, `FileMeta`, `DirInfo`, `CompareLine`,
//! `ComparisonResult`, and `SyncOperation`.

use crate::path::RelPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An opaque per-volume file identifier used to detect renames. Two entries
/// with the same `FileId` on the same volume are the same underlying object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u64, pub u64);

/// Whether a symlink's target is (as far as the scanner could tell) a file
/// or a directory. Recorded at scan time so later classification doesn't
/// need to re-stat the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    FileLink,
    DirLink,
}

/// The kind of filesystem object an entry represents, plus enough data to
/// classify it without touching the filesystem again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    Symlink { target: String, kind: LinkKind },
    Absent,
}

impl EntryKind {
    pub fn is_absent(&self) -> bool {
        matches!(self, EntryKind::Absent)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, EntryKind::Symlink { .. })
    }
}

/// Size/mtime/identity metadata for a File or Symlink entry. Directories and
/// Absent entries carry no metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: u64,
    pub mtime_utc_seconds: i64,
    pub file_id: Option<FileId>,
}

impl FileMeta {
    pub fn new(size: u64, mtime_utc_seconds: i64) -> Self {
        Self {
            size,
            mtime_utc_seconds,
            file_id: None,
        }
    }

    pub fn with_file_id(mut self, id: FileId) -> Self {
        self.file_id = Some(id);
        self
    }
}

/// One node of a scanned directory tree: a short name plus its kind and,
/// for files/symlinks, metadata. Directories carry their children inline.
///
/// Invariants upheld by the scanner (C3), never re-checked here:
/// short names unique under the tree's case policy; the tree is cycle-free;
/// no component contains a path separator; the root has no short name and
/// `kind = Directory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirInfo {
    pub name: String,
    pub kind: EntryKind,
    pub meta: Option<FileMeta>,
    /// Keyed by short name as discovered; lookups during matching go
    /// through a case-policy map built on demand (see `matcher.rs`).
    pub children: BTreeMap<String, DirInfo>,
}

impl DirInfo {
    pub fn root() -> Self {
        Self {
            name: String::new(),
            kind: EntryKind::Directory,
            meta: None,
            children: BTreeMap::new(),
        }
    }

    pub fn file(name: impl Into<String>, meta: FileMeta) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            meta: Some(meta),
            children: BTreeMap::new(),
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            meta: None,
            children: BTreeMap::new(),
        }
    }

    pub fn symlink(name: impl Into<String>, target: impl Into<String>, kind: LinkKind, meta: FileMeta) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Symlink { target: target.into(), kind },
            meta: Some(meta),
            children: BTreeMap::new(),
        }
    }

    /// Total count of File + Symlink + Directory nodes under (and
    /// including) this node, excluding the synthetic root itself.
    pub fn object_count(&self) -> usize {
        self.children
            .values()
            .map(|c| 1 + c.object_count())
            .sum()
    }

    /// Look up a node by RelPath from this node considered as the root.
    pub fn lookup(&self, path: &RelPath) -> Option<&DirInfo> {
        let mut cur = self;
        for component in path.components() {
            cur = cur.children.get(component)?;
        }
        Some(cur)
    }
}

/// The outcome of classifying one CompareLine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComparisonResult {
    LeftOnly,
    RightOnly,
    LeftNewer,
    RightNewer,
    Different,
    Equal,
    Conflict(String),
}

impl ComparisonResult {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ComparisonResult::Conflict(_))
    }
}

/// A stable index into a folder pair's CompareLine list. Used instead of
/// raw pointers/references so move pairs can refer to each other without
/// creating a cycle in an owned, growable container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(pub usize);

/// The concrete action to take for one CompareLine, as derived by the
/// direction resolver (C7) and consumed by the executor (C10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncOperation {
    DoNothing,
    Equal,
    CreateLeft,
    CreateRight,
    DeleteLeft,
    DeleteRight,
    OverwriteLeft,
    OverwriteRight,
    CopyMetaLeft,
    CopyMetaRight,
    MoveLeftSource,
    MoveLeftTarget,
    MoveRightSource,
    MoveRightTarget,
    UnresolvedConflict(String),
}

impl SyncOperation {
    pub fn is_actionable(&self) -> bool {
        !matches!(
            self,
            SyncOperation::DoNothing | SyncOperation::Equal | SyncOperation::UnresolvedConflict(_)
        )
    }

    pub fn is_move(&self) -> bool {
        matches!(
            self,
            SyncOperation::MoveLeftSource
                | SyncOperation::MoveLeftTarget
                | SyncOperation::MoveRightSource
                | SyncOperation::MoveRightTarget
        )
    }
}

/// One side of a CompareLine: what the scanner saw there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Side {
    pub kind: EntryKind,
    pub meta: Option<FileMeta>,
}

impl Side {
    pub fn absent() -> Self {
        Self { kind: EntryKind::Absent, meta: None }
    }

    pub fn new(kind: EntryKind, meta: Option<FileMeta>) -> Self {
        Self { kind, meta }
    }

    pub fn is_absent(&self) -> bool {
        self.kind.is_absent()
    }
}

/// The unit of work produced by the matcher and carried through
/// classification, direction resolution, and execution.
///
/// Invariant: at least one of `left`/`right` is not `Absent` (enforced by
/// the matcher, which never emits a line with both sides absent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareLine {
    pub rel_path: RelPath,
    pub left: Side,
    pub right: Side,
    pub cmp: ComparisonResult,
    pub op: SyncOperation,
    /// Gates whether this line participates in synchronization; filtering
    /// itself (glob/size rules) lives outside the core, in `filter.rs`.
    pub selected: bool,
    /// Set when this line is one half of a detected rename; points at its
    /// counterpart (source <-> target).
    pub move_ref: Option<LineId>,
}

impl CompareLine {
    pub fn new(rel_path: RelPath, left: Side, right: Side) -> Self {
        debug_assert!(
            !left.is_absent() || !right.is_absent(),
            "CompareLine must have at least one non-absent side"
        );
        Self {
            rel_path,
            left,
            right,
            cmp: ComparisonResult::Equal,
            op: SyncOperation::DoNothing,
            selected: true,
            move_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirinfo_object_count_counts_descendants() {
        let mut root = DirInfo::root();
        let mut sub = DirInfo::directory("sub");
        sub.children.insert("a.txt".into(), DirInfo::file("a.txt", FileMeta::new(10, 1000)));
        sub.children.insert("b.txt".into(), DirInfo::file("b.txt", FileMeta::new(20, 1000)));
        root.children.insert("sub".into(), sub);
        root.children.insert("c.txt".into(), DirInfo::file("c.txt", FileMeta::new(1, 1)));
        // sub (1) + a.txt + b.txt (2) + c.txt (1) = 4
        assert_eq!(root.object_count(), 4);
    }

    #[test]
    fn lookup_traverses_components() {
        let mut root = DirInfo::root();
        let mut sub = DirInfo::directory("sub");
        sub.children.insert("a.txt".into(), DirInfo::file("a.txt", FileMeta::new(10, 1000)));
        root.children.insert("sub".into(), sub);

        let found = root.lookup(&RelPath::parse("sub/a.txt"));
        assert!(found.is_some());
        assert_eq!(found.unwrap().name, "a.txt");
    }

    #[test]
    fn compare_line_requires_one_present_side() {
        let line = CompareLine::new(
            RelPath::parse("a.txt"),
            Side::new(EntryKind::File, Some(FileMeta::new(1, 1))),
            Side::absent(),
        );
        assert!(!line.left.is_absent());
        assert!(line.right.is_absent());
    }
}
