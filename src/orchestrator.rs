//! Orchestrator (C14): drives a `SyncConfig`'s folder pairs through the
//! rest of the core, sequentially, per §5. For each pair: scan both sides,
//! match into comparison lines, classify, apply the filter, resolve
//! direction (consulting the state DB for automatic pairs), run pre-flight
//! checks, execute, commit deletions, and persist a fresh state-DB
//! snapshot for any pair using automatic resolution. Pairs run one after
//! another; a pair that hits a fatal pre-flight condition is skipped and
//! the run continues with the next one (§4.13).

use std::time::Instant;

use crate::classifier::{init_compare_content_phase, Classifier};
use crate::config::{FolderPair, SyncConfig};
use crate::deletion::{self, DeletionHandler};
use crate::direction::{self, AutomaticSnapshots, Direction, DirectionPolicy};
use crate::error::Result;
use crate::executor;
use crate::filter::FileFilter;
use crate::log::{PairSummary, ReturnCode, Severity, SyncLog};
use crate::matcher::match_trees;
use crate::metrics::RunMetrics;
use crate::model::CompareLine;
use crate::preflight::{self, Verdict};
use crate::progress::{Phase, ProgressObserver};
use crate::scanner::{init_scan_phase, ScanOptions, Scanner};
use crate::statedb;
use crate::statistics::{self, Statistics};

const LOG_CAPACITY: usize = 10_000;

/// Run every pair in `config`, in order, returning the accumulated log.
/// Never returns `Err` for a per-pair failure — those become `Aborted`
/// summary entries in the log instead, per §4.13. Only a cooperative
/// cancellation (`SyncError::Cancelled`) from the observer unwinds the
/// whole run.
pub async fn run_sync(config: &SyncConfig, observer: &dyn ProgressObserver) -> Result<SyncLog> {
    let mut log = SyncLog::new(LOG_CAPACITY);

    let overlap_warnings = preflight::detect_overlapping_pairs(&config.pairs);
    for (_, _, reason) in &overlap_warnings {
        observer.report_warning(reason, true);
        log.push(now(), Severity::Warning, reason.clone());
    }

    for (index, pair) in config.pairs.iter().enumerate() {
        let label = format!("pair {index} ({} <-> {})", pair.left_root.display(), pair.right_root.display());
        observer.status(&format!("Starting {label}"));

        let summary = run_pair(pair, observer).await?;
        log.push_pair_summary(now(), &label, &summary);
    }

    Ok(log)
}

async fn run_pair(pair: &FolderPair, observer: &dyn ProgressObserver) -> Result<PairSummary> {
    let started_at = Instant::now();

    let scan_options = ScanOptions { skip_patterns: Vec::new(), case_policy: pair.case_policy };
    let scanner = Scanner::new(scan_options);

    init_scan_phase(observer, 0, 0);
    let (left_tree, left_existed) = scan_root_if_present(&scanner, &pair.left_root, observer).await?;
    let (right_tree, right_existed) = scan_root_if_present(&scanner, &pair.right_root, observer).await?;

    let mut lines = match_trees(&left_tree, &right_tree, pair.case_policy);

    let filter = FileFilter::new(pair.filter.clone())?;
    apply_filter(&mut lines, &filter);

    let total_bytes: u64 = lines
        .iter()
        .filter(|l| l.selected)
        .filter_map(|l| l.left.meta.or(l.right.meta))
        .map(|m| m.size)
        .sum();
    init_compare_content_phase(observer, total_bytes);
    let classifier = Classifier::new(pair.compare_mode);
    classifier.classify_all(&mut lines, &pair.left_root, &pair.right_root, observer).await?;

    let automatic = policy_uses_automatic(&pair.direction_policy);
    let snapshots = if automatic {
        match statedb::load_sync_state(&pair.left_root, &pair.right_root).await? {
            statedb::LoadedState::Matched { left, right } => Some((left, right)),
            statedb::LoadedState::Mismatch(reason) => {
                observer.report_warning(&format!("state database mismatch: {reason}"), true);
                None
            }
        }
    } else {
        None
    };
    let automatic_snapshots = match &snapshots {
        Some((left, right)) => AutomaticSnapshots::Available(left, right),
        None => AutomaticSnapshots::Unavailable,
    };
    direction::resolve_directions(&mut lines, &pair.direction_policy, automatic_snapshots);

    for line in lines.iter_mut().filter(|l| !l.selected) {
        line.op = crate::model::SyncOperation::DoNothing;
    }

    let stats = statistics::compute_statistics(&lines);

    if let Verdict::Skip(reason) = preflight::run_preflight_checks(pair, &lines, &stats, observer).await {
        return Ok(PairSummary {
            elapsed_seconds: started_at.elapsed().as_secs_f64(),
            objects_processed: 0,
            bytes_processed: 0,
            return_code: ReturnCode::Aborted,
        });
    }
    if let Some(summary) = ensure_target_base_dirs(pair, left_existed, right_existed, observer, started_at).await? {
        return Ok(summary);
    }
    report_fallback_warnings(pair, observer).await;

    let run_timestamp = deletion::format_run_timestamp(chrono::Utc::now());
    let left_handler = DeletionHandler::new(pair.left_root.clone(), pair.deletion_policy.clone(), run_timestamp.clone()).await;
    let right_handler = DeletionHandler::new(pair.right_root.clone(), pair.deletion_policy.clone(), run_timestamp).await;

    init_sync_phase(observer, &stats);
    let op_snapshot: Vec<crate::model::SyncOperation> = lines.iter().map(|l| l.op.clone()).collect();
    let outcome = executor::execute(&mut lines, &pair.left_root, &pair.right_root, &left_handler, &right_handler, observer).await?;

    left_handler.try_commit().await?;
    right_handler.try_commit().await?;

    RunMetrics::from_ops(&op_snapshot, outcome.bytes_processed, started_at.elapsed());

    if automatic {
        let left_final = scanner.scan(&pair.left_root, observer).await?;
        let right_final = scanner.scan(&pair.right_root, observer).await?;
        statedb::save_sync_state(&pair.left_root, &pair.right_root, &left_final, &right_final).await?;
    }

    let return_code = if outcome.had_errors {
        ReturnCode::FinishedWithErrors
    } else if stats.conflicts > 0 {
        ReturnCode::FinishedWithWarnings
    } else {
        ReturnCode::Success
    };

    Ok(PairSummary {
        elapsed_seconds: started_at.elapsed().as_secs_f64(),
        objects_processed: outcome.objects_processed,
        bytes_processed: outcome.bytes_processed,
        return_code,
    })
}

/// Scan `root`, or report it as absent without touching the observer's
/// error-resolution path: a base directory that simply hasn't been created
/// yet (the common case on a first-time sync into an empty destination)
/// is not a scan error, it's an empty tree. Returns whether `root` existed
/// at scan time, which `ensure_target_base_dirs` later uses to tell "never
/// existed" apart from "vanished between scan and execution".
async fn scan_root_if_present(scanner: &Scanner, root: &std::path::Path, observer: &dyn ProgressObserver) -> Result<(crate::model::DirInfo, bool)> {
    if tokio::fs::metadata(root).await.is_err() {
        return Ok((crate::model::DirInfo::root(), false));
    }
    Ok((scanner.scan(root, observer).await?, true))
}

/// §4.13 step 2: once pre-flight has cleared the pair for execution,
/// ensure both base directories are actually there for the executor to
/// write into. A side that was missing at scan time gets created, but
/// only because its counterpart exists — a first-time sync into an empty
/// destination is the normal case, not an error. A side that *did* exist
/// at scan time but has since disappeared (a volume unmounted mid-run)
/// aborts the pair instead of silently recreating it out from under
/// whatever else might be using that path.
async fn ensure_target_base_dirs(
    pair: &FolderPair,
    left_existed_at_scan: bool,
    right_existed_at_scan: bool,
    observer: &dyn ProgressObserver,
    started_at: Instant,
) -> Result<Option<PairSummary>> {
    let left_exists_now = tokio::fs::metadata(&pair.left_root).await.is_ok();
    let right_exists_now = tokio::fs::metadata(&pair.right_root).await.is_ok();

    if left_existed_at_scan && !left_exists_now {
        return Ok(Some(abort_vanished_root(&pair.left_root, observer, started_at)));
    }
    if right_existed_at_scan && !right_exists_now {
        return Ok(Some(abort_vanished_root(&pair.right_root, observer, started_at)));
    }

    if !left_exists_now && right_exists_now {
        tokio::fs::create_dir_all(&pair.left_root)
            .await
            .map_err(|e| crate::error::SyncError::path_error(&pair.left_root, format!("failed to create missing base directory: {e}")))?;
    }
    if !right_exists_now && left_exists_now {
        tokio::fs::create_dir_all(&pair.right_root)
            .await
            .map_err(|e| crate::error::SyncError::path_error(&pair.right_root, format!("failed to create missing base directory: {e}")))?;
    }

    Ok(None)
}

fn abort_vanished_root(root: &std::path::Path, observer: &dyn ProgressObserver, started_at: Instant) -> PairSummary {
    let reason = format!("'{}' was present when this pair was compared and has since disappeared; aborting", root.display());
    observer.report_fatal_error(&reason);
    PairSummary {
        elapsed_seconds: started_at.elapsed().as_secs_f64(),
        objects_processed: 0,
        bytes_processed: 0,
        return_code: ReturnCode::Aborted,
    }
}

/// Surface a deletion handler's construction-time fallback (e.g. RecycleBin
/// requested but unavailable) as a run-time warning; the pre-flight pass
/// already probes for this ahead of construction, so this only fires for
/// per-pair conditions that can change between the probe and the handler's
/// actual construction (a volume becoming unavailable mid-run).
async fn report_fallback_warnings(pair: &FolderPair, observer: &dyn ProgressObserver) {
    let run_timestamp = deletion::format_run_timestamp(chrono::Utc::now());
    let probe_left = DeletionHandler::new(pair.left_root.clone(), pair.deletion_policy.clone(), run_timestamp.clone()).await;
    if let Some(warning) = probe_left.fallback_warning() {
        observer.report_warning(warning, true);
    }
}

fn init_sync_phase(observer: &dyn ProgressObserver, stats: &Statistics) {
    observer.init_phase(Phase::Sync, stats.total_objects(), stats.bytes_to_process);
}

/// Mark every line `selected` per the pair's filter: a line passes when its
/// relative path survives the glob rules and, for sides carrying a size,
/// that size survives the min/max bounds.
fn apply_filter(lines: &mut [CompareLine], filter: &FileFilter) {
    for line in lines.iter_mut() {
        let path = line.rel_path.to_path_buf();
        let size = line.left.meta.or(line.right.meta).map(|m| m.size);
        line.selected = filter.should_include(&path) && size.map(|s| filter.should_include_size(s)).unwrap_or(true);
    }
}

fn policy_uses_automatic(policy: &DirectionPolicy) -> bool {
    [policy.left_only, policy.right_only, policy.left_newer, policy.right_newer, policy.different]
        .iter()
        .any(|d| matches!(d, Direction::Automatic))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
