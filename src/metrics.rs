//! Post-run metrics (ambient): a structured, serializable summary of what a
//! pair's sync actually did, built from its `CompareLine`s and
//! `ExecutionOutcome` once the executor has run. Distinct from
//! `statistics::Statistics`, which is the pre-run estimate the pre-flight
//! checks and progress bar use; `RunMetrics` is the post-run actuals,
//! suitable for logging or export.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::model::{CompareLine, SyncOperation};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStats {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub moved: u64,
    pub conflicts: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferStats {
    pub bytes_processed: u64,
}

/// A session's worth of post-run metrics for one folder pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub session_id: Uuid,
    pub start_time: SystemTime,
    pub duration: Duration,
    pub files: FileStats,
    pub transfer: TransferStats,
}

impl RunMetrics {
    /// Summarize a fully-classified, direction-resolved line set plus the
    /// executor's byte count, tagging the run with a fresh session id.
    ///
    /// `lines` must carry the ops as the direction resolver left them,
    /// *before* the executor runs — the executor rewrites each
    /// successfully-applied line's `op` to `Equal` in place, so tallying
    /// from a post-execution list would always report zero activity. Callers
    /// that only have a post-run list should snapshot `line.op` for every
    /// line ahead of `executor::execute` and use `from_ops` instead.
    pub fn from_lines(lines: &[CompareLine], bytes_processed: u64, duration: Duration) -> Self {
        let ops: Vec<SyncOperation> = lines.iter().map(|l| l.op.clone()).collect();
        Self::from_ops(&ops, bytes_processed, duration)
    }

    /// Same tally as `from_lines`, taking a bare op snapshot. Intended for
    /// callers that captured each line's `op` before handing the lines to
    /// `executor::execute`, which overwrites `op` to `Equal` on success.
    pub fn from_ops(ops: &[SyncOperation], bytes_processed: u64, duration: Duration) -> Self {
        let mut files = FileStats::default();
        for op in ops {
            match op {
                SyncOperation::CreateLeft | SyncOperation::CreateRight => files.created += 1,
                SyncOperation::OverwriteLeft | SyncOperation::OverwriteRight => files.updated += 1,
                SyncOperation::CopyMetaLeft | SyncOperation::CopyMetaRight => files.updated += 1,
                SyncOperation::DeleteLeft | SyncOperation::DeleteRight => files.deleted += 1,
                SyncOperation::MoveLeftTarget | SyncOperation::MoveRightTarget => files.moved += 1,
                SyncOperation::UnresolvedConflict(_) => files.conflicts += 1,
                SyncOperation::MoveLeftSource | SyncOperation::MoveRightSource | SyncOperation::DoNothing | SyncOperation::Equal => {}
            }
        }

        let metrics = Self {
            session_id: Uuid::new_v4(),
            start_time: SystemTime::now(),
            duration,
            files,
            transfer: TransferStats { bytes_processed },
        };
        metrics.log_completion();
        metrics
    }

    fn log_completion(&self) {
        info!(
            session_id = %self.session_id,
            duration_secs = self.duration.as_secs_f64(),
            created = self.files.created,
            updated = self.files.updated,
            deleted = self.files.deleted,
            moved = self.files.moved,
            conflicts = self.files.conflicts,
            bytes_processed = self.transfer.bytes_processed,
            "pair sync completed"
        );
    }

    pub fn total_files_touched(&self) -> u64 {
        self.files.created + self.files.updated + self.files.deleted + self.files.moved
    }

    pub fn summary(&self) -> String {
        format!(
            "{} created, {} updated, {} deleted, {} moved, {} conflicts, {} bytes in {:.2}s",
            self.files.created,
            self.files.updated,
            self.files.deleted,
            self.files.moved,
            self.files.conflicts,
            self.transfer.bytes_processed,
            self.duration.as_secs_f64()
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
