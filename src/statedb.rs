//! State DB (C6): the persisted "last synchronous state" snapshot that
//! backs automatic (three-way) direction resolution, per §4.5/§6.
//!
//! Two twin files, one under each root (default `<root>/.ffs_db`), each
//! storing this side's UUID and a map from partner UUID to the DirInfo
//! snapshot taken on this side right after the last successful sync with
//! that partner. The wire format is specified down to the byte (magic,
//! version, deflate payload, length-prefixed records) so it is hand-rolled
//! here rather than handed to a general-purpose serializer — a generic
//! encoding wouldn't reproduce this externally fixed layout.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::model::{DirInfo, EntryKind, FileMeta, LinkKind};

const MAGIC: &[u8; 12] = b"FreeFileSync";
const FORMAT_VERSION: u32 = 1;
pub const DEFAULT_DB_FILE_NAME: &str = ".ffs_db";

/// One side's on-disk database: its own identity plus one snapshot per
/// partner it has ever successfully synced with.
#[derive(Debug, Clone)]
pub struct StateDbFile {
    pub this_uuid: Uuid,
    pub partners: HashMap<Uuid, DirInfo>,
}

impl StateDbFile {
    pub fn new() -> Self {
        Self { this_uuid: Uuid::new_v4(), partners: HashMap::new() }
    }

    /// Read and validate a state DB file. A missing file, a bad magic, or
    /// an unrecognized format version is *not* an error here — per §6 the
    /// caller treats the entry as simply absent.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::Metadata { path: path.to_path_buf(), message: e.to_string() }),
        };
        Ok(Self::decode(&bytes))
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 16 || &bytes[0..12] != MAGIC {
            return None;
        }
        let version = u32::from_le_bytes(bytes[12..16].try_into().ok()?);
        if version != FORMAT_VERSION {
            return None;
        }
        let mut decoder = DeflateDecoder::new(&bytes[16..]);
        let mut payload = Vec::new();
        decoder.read_to_end(&mut payload).ok()?;

        let mut cursor = Cursor::new(&payload);
        let this_uuid = cursor.read_uuid()?;
        let count = cursor.read_u32()?;
        let mut partners = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let partner_uuid = cursor.read_uuid()?;
            let len = cursor.read_u32()? as usize;
            let record = cursor.take(len)?;
            let snapshot = decode_snapshot(&mut Cursor::new(record))?;
            partners.insert(partner_uuid, snapshot);
        }
        Some(Self { this_uuid, partners })
    }

    fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(self.this_uuid.as_bytes());
        payload.extend_from_slice(&(self.partners.len() as u32).to_le_bytes());
        for (uuid, snapshot) in &self.partners {
            let mut record = Vec::new();
            encode_snapshot(snapshot, &mut record);
            payload.extend_from_slice(uuid.as_bytes());
            payload.extend_from_slice(&(record.len() as u32).to_le_bytes());
            payload.extend_from_slice(&record);
        }

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).expect("writing to an in-memory buffer cannot fail");
        let compressed = encoder.finish().expect("finishing an in-memory deflate stream cannot fail");

        let mut out = Vec::with_capacity(16 + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&compressed);
        out
    }

    /// Atomic write: encode to a sibling `.tmp` file, then rename over the
    /// original. The old original is only ever replaced after the new
    /// temp file is fully written, per §4.5.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.encode();
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| SyncError::Metadata { path: tmp_path.clone(), message: e.to_string() })?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| SyncError::Metadata { path: path.to_path_buf(), message: e.to_string() })?;
        Ok(())
    }
}

impl Default for StateDbFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Default on-disk location of a side's state DB file.
pub fn db_path_for(root: &Path) -> std::path::PathBuf {
    root.join(DEFAULT_DB_FILE_NAME)
}

/// The pair of snapshots `direction::resolve_directions` needs for
/// automatic resolution, or a reason it could not be produced.
pub enum LoadedState {
    Matched { left: DirInfo, right: DirInfo },
    Mismatch(String),
}

/// Load and cross-validate both sides' DB files per §4.5: the core must
/// match DBs transitively — the left file has to reference the right
/// file's UUID, and vice versa. A pair of roots with no DB files at all
/// (first-ever sync) is reported as `Matched` with empty snapshot trees,
/// since "never synced" and "synced with nothing recorded" behave
/// identically to the direction resolver.
pub async fn load_sync_state(left_root: &Path, right_root: &Path) -> Result<LoadedState> {
    let left_file = StateDbFile::load(&db_path_for(left_root)).await?;
    let right_file = StateDbFile::load(&db_path_for(right_root)).await?;

    match (left_file, right_file) {
        (None, None) => Ok(LoadedState::Matched { left: DirInfo::root(), right: DirInfo::root() }),
        (Some(left), Some(right)) => {
            let left_snapshot = left.partners.get(&right.this_uuid);
            let right_snapshot = right.partners.get(&left.this_uuid);
            match (left_snapshot, right_snapshot) {
                (Some(l), Some(r)) => Ok(LoadedState::Matched { left: l.clone(), right: r.clone() }),
                _ => Ok(LoadedState::Mismatch(
                    "state DB files do not reference each other's UUID".to_string(),
                )),
            }
        }
        _ => Ok(LoadedState::Mismatch("one side is missing its state DB file".to_string())),
    }
}

/// Persist a new snapshot pair after a successful sync, updating (not
/// replacing) each side's existing partner map.
pub async fn save_sync_state(left_root: &Path, right_root: &Path, left_tree: &DirInfo, right_tree: &DirInfo) -> Result<()> {
    let left_path = db_path_for(left_root);
    let right_path = db_path_for(right_root);

    let mut left_file = StateDbFile::load(&left_path).await?.unwrap_or_default();
    let mut right_file = StateDbFile::load(&right_path).await?.unwrap_or_default();

    left_file.partners.insert(right_file.this_uuid, left_tree.clone());
    right_file.partners.insert(left_file.this_uuid, right_tree.clone());

    left_file.save(&left_path).await?;
    right_file.save(&right_path).await?;
    Ok(())
}

// --- Hand-rolled DirInfo snapshot codec (§6) ---------------------------
//
// The wire sub-format mirrors the original's Filter-then-files-then-
// symlinks-then-dirs layout. This crate has no folder-pair-scoped Filter
// object to round-trip yet, so the opaque blob is written as an empty
// length-prefixed string — a placeholder slot future filter persistence
// can occupy without changing the rest of the layout.

fn encode_snapshot(node: &DirInfo, out: &mut Vec<u8>) {
    // Opaque Filter blob: empty for now, still length-prefixed per §6.
    out.extend_from_slice(&0u32.to_le_bytes());

    let mut files = Vec::new();
    let mut symlinks = Vec::new();
    let mut dirs = Vec::new();
    for (name, child) in &node.children {
        match &child.kind {
            EntryKind::File => files.push((name, child.meta.unwrap_or(FileMeta::new(0, 0)))),
            EntryKind::Symlink { target, kind } => symlinks.push((name, child.meta.unwrap_or(FileMeta::new(0, 0)), target, *kind)),
            EntryKind::Directory => dirs.push((name, child)),
            EntryKind::Absent => {}
        }
    }

    out.extend_from_slice(&(files.len() as u32).to_le_bytes());
    for (name, meta) in &files {
        write_string(out, name);
        out.extend_from_slice(&meta.mtime_utc_seconds.to_le_bytes());
        out.extend_from_slice(&meta.size.to_le_bytes());
    }

    out.extend_from_slice(&(symlinks.len() as u32).to_le_bytes());
    for (name, meta, target, kind) in &symlinks {
        write_string(out, name);
        out.extend_from_slice(&meta.mtime_utc_seconds.to_le_bytes());
        write_string(out, target);
        let kind_tag: u32 = match kind {
            LinkKind::FileLink => 0,
            LinkKind::DirLink => 1,
        };
        out.extend_from_slice(&kind_tag.to_le_bytes());
    }

    out.extend_from_slice(&(dirs.len() as u32).to_le_bytes());
    for (name, child) in &dirs {
        write_string(out, name);
        encode_snapshot(child, out);
    }
}

fn decode_snapshot(cursor: &mut Cursor) -> Option<DirInfo> {
    let filter_len = cursor.read_u32()? as usize;
    cursor.take(filter_len)?;

    let mut node = DirInfo::root();

    let file_count = cursor.read_u32()?;
    for _ in 0..file_count {
        let name = cursor.read_string()?;
        let mtime = cursor.read_i64()?;
        let size = cursor.read_u64()?;
        node.children.insert(name.clone(), DirInfo::file(name, FileMeta::new(size, mtime)));
    }

    let symlink_count = cursor.read_u32()?;
    for _ in 0..symlink_count {
        let name = cursor.read_string()?;
        let mtime = cursor.read_i64()?;
        let target = cursor.read_string()?;
        let kind_tag = cursor.read_u32()?;
        let kind = if kind_tag == 1 { LinkKind::DirLink } else { LinkKind::FileLink };
        node.children.insert(
            name.clone(),
            DirInfo::symlink(name, target, kind, FileMeta::new(0, mtime)),
        );
    }

    let dir_count = cursor.read_u32()?;
    for _ in 0..dir_count {
        let name = cursor.read_string()?;
        let child = decode_snapshot(cursor)?;
        node.children.insert(name.clone(), DirInfo { name, ..child });
    }

    Some(node)
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Minimal forward-only byte cursor for the hand-rolled codec above.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.pos + len > self.bytes.len() {
            return None;
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Some(slice)
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_i64(&mut self) -> Option<i64> {
        Some(i64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_uuid(&mut self) -> Option<Uuid> {
        Some(Uuid::from_bytes(self.take(16)?.try_into().ok()?))
    }

    fn read_string(&mut self) -> Option<String> {
        let len = self.read_u32()? as usize;
        String::from_utf8(self.take(len)?.to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_tree() -> DirInfo {
        let mut root = DirInfo::root();
        root.children.insert("a.txt".into(), DirInfo::file("a.txt", FileMeta::new(10, 1000)));
        let mut sub = DirInfo::directory("sub");
        sub.children.insert("b.txt".into(), DirInfo::file("b.txt", FileMeta::new(20, 2000)));
        sub.children.insert(
            "link".into(),
            DirInfo::symlink("link", "b.txt", LinkKind::FileLink, FileMeta::new(0, 3000)),
        );
        root.children.insert("sub".into(), sub);
        root
    }

    #[test]
    fn snapshot_round_trips_through_encode_decode() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        encode_snapshot(&tree, &mut buf);
        let decoded = decode_snapshot(&mut Cursor::new(&buf)).unwrap();

        assert_eq!(decoded.children.len(), 2);
        assert_eq!(decoded.children["a.txt"].meta.unwrap().size, 10);
        let sub = &decoded.children["sub"];
        assert_eq!(sub.children["b.txt"].meta.unwrap().mtime_utc_seconds, 2000);
        assert!(sub.children["link"].kind.is_symlink());
    }

    #[tokio::test]
    async fn state_db_file_round_trips_through_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".ffs_db");

        let mut db = StateDbFile::new();
        let partner = Uuid::new_v4();
        db.partners.insert(partner, sample_tree());
        db.save(&path).await.unwrap();

        let loaded = StateDbFile::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.this_uuid, db.this_uuid);
        assert_eq!(loaded.partners[&partner].children.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let loaded = StateDbFile::load(&dir.path().join("nope")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn bad_magic_is_treated_as_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".ffs_db");
        tokio::fs::write(&path, b"not a real state db at all").await.unwrap();
        let loaded = StateDbFile::load(&path).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn load_sync_state_matches_transitively() {
        let left_dir = tempdir().unwrap();
        let right_dir = tempdir().unwrap();

        save_sync_state(left_dir.path(), right_dir.path(), &sample_tree(), &DirInfo::root()).await.unwrap();

        match load_sync_state(left_dir.path(), right_dir.path()).await.unwrap() {
            LoadedState::Matched { left, .. } => assert_eq!(left.children.len(), 2),
            LoadedState::Mismatch(reason) => panic!("expected a match, got mismatch: {reason}"),
        }
    }

    #[tokio::test]
    async fn load_sync_state_reports_mismatch_when_uuids_dont_cross_reference() {
        let left_dir = tempdir().unwrap();
        let right_dir = tempdir().unwrap();

        // Two independent DBs that never reference each other's UUID.
        let left_db = StateDbFile::new();
        left_db.save(&db_path_for(left_dir.path())).await.unwrap();
        let right_db = StateDbFile::new();
        right_db.save(&db_path_for(right_dir.path())).await.unwrap();

        match load_sync_state(left_dir.path(), right_dir.path()).await.unwrap() {
            LoadedState::Mismatch(_) => {}
            LoadedState::Matched { .. } => panic!("expected a mismatch"),
        }
    }

    #[tokio::test]
    async fn load_sync_state_with_no_files_is_a_fresh_match() {
        let left_dir = tempdir().unwrap();
        let right_dir = tempdir().unwrap();
        match load_sync_state(left_dir.path(), right_dir.path()).await.unwrap() {
            LoadedState::Matched { left, right } => {
                assert_eq!(left.children.len(), 0);
                assert_eq!(right.children.len(), 0);
            }
            LoadedState::Mismatch(reason) => panic!("expected a fresh match, got: {reason}"),
        }
    }
}
