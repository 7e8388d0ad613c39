//! Error Log (C13): a bounded append-only log of severity-tagged entries,
//! plus the orchestrator's per-pair summary line. Rendering to a file is
//! outside the core; this module only exposes the entry stream.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    FatalError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_utc_seconds: i64,
    pub severity: Severity,
    pub text: String,
}

/// Final status of one folder pair's run, rolled into the summary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnCode {
    Success = 0,
    FinishedWithWarnings = 1,
    FinishedWithErrors = 2,
    Aborted = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSummary {
    pub elapsed_seconds: f64,
    pub objects_processed: u64,
    pub bytes_processed: u64,
    pub return_code: ReturnCode,
}

/// Bounded append-only log: oldest entries are dropped once `capacity` is
/// exceeded, so a very long run cannot grow the log without limit.
pub struct SyncLog {
    capacity: usize,
    entries: Vec<LogEntry>,
}

impl SyncLog {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::new() }
    }

    pub fn push(&mut self, now_utc_seconds: i64, severity: Severity, text: impl Into<String>) {
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(LogEntry { timestamp_utc_seconds: now_utc_seconds, severity, text: text.into() });
    }

    pub fn push_pair_summary(&mut self, now_utc_seconds: i64, pair_label: &str, summary: &PairSummary) {
        let severity = match summary.return_code {
            ReturnCode::Success => Severity::Info,
            ReturnCode::FinishedWithWarnings => Severity::Warning,
            ReturnCode::FinishedWithErrors => Severity::Error,
            ReturnCode::Aborted => Severity::FatalError,
        };
        let text = format!(
            "{pair_label}: {:?} in {:.1}s, {} objects, {} bytes",
            summary.return_code, summary.elapsed_seconds, summary.objects_processed, summary.bytes_processed
        );
        self.push(now_utc_seconds, severity, text);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The run-wide return code: the worst of any pair's summary, per the
    /// precedence `Aborted > FinishedWithErrors > FinishedWithWarnings > Success`.
    pub fn worst_return_code(&self) -> ReturnCode {
        let mut worst = ReturnCode::Success;
        for entry in &self.entries {
            let candidate = match entry.severity {
                Severity::FatalError => ReturnCode::Aborted,
                Severity::Error => ReturnCode::FinishedWithErrors,
                Severity::Warning => ReturnCode::FinishedWithWarnings,
                Severity::Info => continue,
            };
            if rank(candidate) > rank(worst) {
                worst = candidate;
            }
        }
        worst
    }
}

fn rank(code: ReturnCode) -> u8 {
    match code {
        ReturnCode::Success => 0,
        ReturnCode::FinishedWithWarnings => 1,
        ReturnCode::FinishedWithErrors => 2,
        ReturnCode::Aborted => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_drops_oldest_entries_past_capacity() {
        let mut log = SyncLog::new(2);
        log.push(1, Severity::Info, "a");
        log.push(2, Severity::Info, "b");
        log.push(3, Severity::Info, "c");
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].text, "b");
    }

    #[test]
    fn worst_return_code_takes_the_highest_severity_summary() {
        let mut log = SyncLog::new(10);
        log.push_pair_summary(
            1,
            "pair-1",
            &PairSummary { elapsed_seconds: 1.0, objects_processed: 5, bytes_processed: 50, return_code: ReturnCode::Success },
        );
        log.push_pair_summary(
            2,
            "pair-2",
            &PairSummary {
                elapsed_seconds: 2.0,
                objects_processed: 1,
                bytes_processed: 0,
                return_code: ReturnCode::FinishedWithErrors,
            },
        );
        assert_eq!(log.worst_return_code(), ReturnCode::FinishedWithErrors);
    }
}
