//! Scanner (C3): recursive, single-threaded traversal producing a `DirInfo`
//! tree for one side of a folder pair.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::fsops;
use crate::model::{DirInfo, EntryKind};
use crate::path::CasePolicy;
use crate::progress::{ErrorResolution, Phase, ProgressObserver};

/// Names skipped unconditionally, mirroring the hardwired system-reserved
/// entries a real sync tool must never touch, regardless of user filters.
const HARDWIRED_SKIP_NAMES: &[&str] = &[
    "system volume information",
    "$recycle.bin",
    "recycler",
    ".ffs_db",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// User-supplied skip patterns (glob), applied in addition to the
    /// hardwired system-reserved names. Matching against these patterns
    /// is delegated to `filter::FileFilter`, which lives outside C3.
    pub skip_patterns: Vec<String>,
    pub case_policy: CasePolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            skip_patterns: Vec::new(),
            case_policy: CasePolicy::native(),
        }
    }
}

pub struct Scanner {
    options: ScanOptions,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Scan `root`, reporting one progress tick per object and calling
    /// `observer.init_phase(Scan, ...)` is the caller's responsibility
    /// (the orchestrator knows the grand total across both sides first).
    pub async fn scan(&self, root: &Path, observer: &dyn ProgressObserver) -> Result<DirInfo> {
        observer.status(&format!("Scanning {}", root.display()));
        let mut node = DirInfo::root();
        self.scan_level(root, &mut node, observer).await?;
        Ok(node)
    }

    fn scan_level<'a>(
        &'a self,
        dir: &'a Path,
        node: &'a mut DirInfo,
        observer: &'a dyn ProgressObserver,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            observer.request_ui_refresh()?;

            let entries = loop {
                match fsops::read_dir_entries(dir).await {
                    Ok(entries) => break entries,
                    Err(e) => match observer.report_error(&e.to_string()) {
                        ErrorResolution::Retry => continue,
                        ErrorResolution::Ignore => break Vec::new(),
                        ErrorResolution::Abort => return Err(e),
                    },
                }
            };

            for entry in entries {
                if self.is_hardwired_skip(&entry.short_name) {
                    continue;
                }

                let mut child = DirInfo {
                    name: entry.short_name.clone(),
                    kind: entry.kind.clone(),
                    meta: entry.meta,
                    children: Default::default(),
                };

                if let EntryKind::Directory = entry.kind {
                    let child_path = dir.join(&entry.short_name);
                    self.scan_level(&child_path, &mut child, observer).await?;
                }

                observer.on_processed(1, child.meta.map(|m| m.size).unwrap_or(0));
                node.children.insert(entry.short_name, child);
            }
            Ok(())
        })
    }

    fn is_hardwired_skip(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        HARDWIRED_SKIP_NAMES.iter().any(|s| *s == lower)
    }
}

pub fn init_scan_phase(observer: &dyn ProgressObserver, total_objects: u64, total_bytes: u64) {
    observer.init_phase(Phase::Scan, total_objects, total_bytes);
}
