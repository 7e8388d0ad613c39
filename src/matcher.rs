//! Matcher (C4): joins two `DirInfo` trees on relative path into a flat
//! list of `CompareLine`s, in preorder (parent before children) with each
//! level's siblings ordered lexicographically under the case policy — the
//! order the executor's passes rely on (§5).

use std::collections::BTreeSet;

use crate::model::{CompareLine, DirInfo, EntryKind, Side};
use crate::path::{CasePolicy, PolicyKey, RelPath};

/// Join `left` and `right` into one `CompareLine` per distinct RelPath
/// present on either side. A name present as a Directory on one side and
/// as a File/Symlink on the other (a type clash) is split into two lines:
/// a LeftOnly-shaped line and a RightOnly-shaped line, each carrying its
/// own kind, rather than one line with mismatched kinds on each side.
pub fn match_trees(left: &DirInfo, right: &DirInfo, policy: CasePolicy) -> Vec<CompareLine> {
    let mut lines = Vec::new();
    match_level(&RelPath::from_components(vec![]), left, right, policy, &mut lines);
    lines
}

fn match_level(
    prefix: &RelPath,
    left: &DirInfo,
    right: &DirInfo,
    policy: CasePolicy,
    out: &mut Vec<CompareLine>,
) {
    // Union of child names, ordered lexicographically under the case
    // policy so siblings are processed deterministically.
    let mut keys: BTreeSet<PolicyKey> = BTreeSet::new();
    for name in left.children.keys().chain(right.children.keys()) {
        keys.insert(PolicyKey::new(RelPath::from_components(vec![name.clone()]), policy));
    }

    for key in keys {
        let name = key.path.components()[0].clone();
        let left_child = find_by_policy(left, &name, policy);
        let right_child = find_by_policy(right, &name, policy);
        let rel_path = prefix.join(&name);

        match (left_child, right_child) {
            (Some(l), Some(r)) => {
                if is_type_clash(&l.kind, &r.kind) {
                    emit_left_only(&rel_path, l, out);
                    emit_right_only(&rel_path, r, out);
                } else {
                    let line = CompareLine::new(
                        rel_path.clone(),
                        Side::new(l.kind.clone(), l.meta),
                        Side::new(r.kind.clone(), r.meta),
                    );
                    out.push(line);
                    if l.kind.is_directory() && r.kind.is_directory() {
                        match_level(&rel_path, l, r, policy, out);
                    }
                }
            }
            (Some(l), None) => {
                emit_left_only(&rel_path, l, out);
                if l.kind.is_directory() {
                    match_level(&rel_path, l, &empty_dir(), policy, out);
                }
            }
            (None, Some(r)) => {
                emit_right_only(&rel_path, r, out);
                if r.kind.is_directory() {
                    match_level(&rel_path, &empty_dir(), r, policy, out);
                }
            }
            (None, None) => unreachable!("key came from the union of both sides"),
        }
    }
}

fn is_type_clash(left: &EntryKind, right: &EntryKind) -> bool {
    left.is_directory() != right.is_directory()
}

fn emit_left_only(rel_path: &RelPath, node: &DirInfo, out: &mut Vec<CompareLine>) {
    out.push(CompareLine::new(
        rel_path.clone(),
        Side::new(node.kind.clone(), node.meta),
        Side::absent(),
    ));
}

fn emit_right_only(rel_path: &RelPath, node: &DirInfo, out: &mut Vec<CompareLine>) {
    out.push(CompareLine::new(
        rel_path.clone(),
        Side::absent(),
        Side::new(node.kind.clone(), node.meta),
    ));
}

fn find_by_policy<'a>(parent: &'a DirInfo, name: &str, policy: CasePolicy) -> Option<&'a DirInfo> {
    parent
        .children
        .iter()
        .find(|(child_name, _)| policy.eq(child_name, name))
        .map(|(_, node)| node)
}

fn empty_dir() -> DirInfo {
    DirInfo::root()
}
