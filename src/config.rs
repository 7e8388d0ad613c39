//! Ambient configuration surface: the input the non-core wrapper hands to
//! the orchestrator, per §6 — a list of `FolderPair`s plus a `ProgressObserver`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifyMode;
use crate::deletion::DeletionPolicy;
use crate::direction::DirectionPolicy;
use crate::filter::FilterOptions;
use crate::path::CasePolicy;

/// One side-by-side pair of folders to keep in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderPair {
    pub left_root: PathBuf,
    pub right_root: PathBuf,
    pub compare_mode: ClassifyMode,
    pub direction_policy: DirectionPolicy,
    pub deletion_policy: DeletionPolicy,
    pub filter: FilterOptions,
    pub case_policy: CasePolicy,
}

impl FolderPair {
    pub fn new(left_root: impl Into<PathBuf>, right_root: impl Into<PathBuf>) -> Self {
        Self {
            left_root: left_root.into(),
            right_root: right_root.into(),
            compare_mode: ClassifyMode::by_time_and_size_default(),
            direction_policy: DirectionPolicy::mirror_to_right(),
            deletion_policy: DeletionPolicy::Permanent,
            filter: FilterOptions::default(),
            case_policy: CasePolicy::native(),
        }
    }
}

/// The full run configuration: every pair the orchestrator will visit, in
/// order (§5: "pairs run sequentially; the orchestrator does not interleave").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub pairs: Vec<FolderPair>,
}

impl SyncConfig {
    pub fn new(pairs: Vec<FolderPair>) -> Self {
        Self { pairs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_pair_defaults_to_mirror_right_and_permanent_deletion() {
        let pair = FolderPair::new("/a", "/b");
        assert_eq!(pair.deletion_policy, DeletionPolicy::Permanent);
        assert_eq!(pair.direction_policy.left_only, crate::direction::Direction::Right);
    }
}
