//! Progress / Error Callback (C11): a single observer interface called by
//! the scanner, classifier, and executor, plus a channel-based reference
//! implementation callers can poll or stream from.
//!
//! Cancellation is cooperative (§5): the core only observes it at
//! `request_ui_refresh`, `on_processed`, and `status`. Everything else on
//! the trait is a one-way notification.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// The three phases the orchestrator drives an observer through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Scan,
    CompareContent,
    Sync,
}

/// The caller's resolution to a recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorResolution {
    Retry,
    Ignore,
    Abort,
}

/// The single abstract observer described in §4.10. Implementors must be
/// cheap and non-blocking; `request_ui_refresh` is the only method allowed
/// to signal cancellation.
pub trait ProgressObserver: Send + Sync {
    fn init_phase(&self, phase: Phase, total_objects: u64, total_bytes: u64);

    /// Frequency-limited call expected roughly every 50-100ms during bulk
    /// copy; `delta_objects`/`delta_bytes` are increments, not totals.
    fn on_processed(&self, delta_objects: u64, delta_bytes: u64);

    fn status(&self, text: &str);

    fn report_info(&self, text: &str);

    /// `warn_again` carries the caller's current "don't show this again"
    /// state in and returns the (possibly updated) state out.
    fn report_warning(&self, text: &str, warn_again: bool) -> bool;

    fn report_error(&self, text: &str) -> ErrorResolution;

    fn report_fatal_error(&self, text: &str);

    /// Corrects previously reported totals mid-run (deltas may be
    /// negative when an estimate was too high).
    fn update_total(&self, delta_objects: i64, delta_bytes: i64);

    /// The cooperative-cancellation suspension point. Returns
    /// `Err(SyncError::Cancelled)` if the caller requested an abort.
    fn request_ui_refresh(&self) -> Result<()>;
}

/// An observer that does nothing and never cancels; useful for headless
/// batch runs and in tests that don't care about progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressObserver;

impl ProgressObserver for NullProgressObserver {
    fn init_phase(&self, _phase: Phase, _total_objects: u64, _total_bytes: u64) {}
    fn on_processed(&self, _delta_objects: u64, _delta_bytes: u64) {}
    fn status(&self, _text: &str) {}
    fn report_info(&self, _text: &str) {}
    fn report_warning(&self, _text: &str, warn_again: bool) -> bool {
        warn_again
    }
    fn report_error(&self, _text: &str) -> ErrorResolution {
        ErrorResolution::Ignore
    }
    fn report_fatal_error(&self, _text: &str) {}
    fn update_total(&self, _delta_objects: i64, _delta_bytes: i64) {}
    fn request_ui_refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Progress events streamed by [`ChannelProgressObserver`] to a
/// [`ProgressChannel`] receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProgressEvent {
    PhaseStarted { phase: Phase, total_objects: u64, total_bytes: u64 },
    Processed { objects_done: u64, bytes_done: u64, objects_total: u64, bytes_total: u64 },
    Status { text: String },
    Info { text: String },
    Warning { text: String },
    Error { text: String },
    FatalError { text: String },
}

#[derive(Debug)]
struct ChannelState {
    objects_total: AtomicU64,
    bytes_total: AtomicU64,
    objects_done: AtomicU64,
    bytes_done: AtomicU64,
    cancelled: AtomicBool,
    started_at: Mutex<Instant>,
}

/// Reference `ProgressObserver` implementation: publishes every call as a
/// [`ProgressEvent`] over an unbounded channel and keeps running totals an
/// external caller can poll via [`ChannelProgressObserver::snapshot`].
pub struct ChannelProgressObserver {
    sender: mpsc::UnboundedSender<ProgressEvent>,
    session_id: Uuid,
    state: Arc<ChannelState>,
    error_policy: ErrorResolution,
}

pub struct ProgressChannel {
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressChannel {
    /// Create a linked observer/channel pair. `error_policy` is the
    /// resolution `report_error` returns — headless callers typically pick
    /// `Ignore` or `Abort`; interactive callers plug in a UI-driven
    /// observer instead of this reference one.
    pub fn new(error_policy: ErrorResolution) -> (ChannelProgressObserver, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let observer = ChannelProgressObserver {
            sender,
            session_id: Uuid::new_v4(),
            state: Arc::new(ChannelState {
                objects_total: AtomicU64::new(0),
                bytes_total: AtomicU64::new(0),
                objects_done: AtomicU64::new(0),
                bytes_done: AtomicU64::new(0),
                cancelled: AtomicBool::new(false),
                started_at: Mutex::new(Instant::now()),
            }),
            error_policy,
        };
        (observer, ProgressChannel { receiver })
    }

    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }
}

impl ChannelProgressObserver {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Request cooperative cancellation; takes effect at the next
    /// `request_ui_refresh`/`on_processed` call inside the core.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            objects_done: self.state.objects_done.load(Ordering::Relaxed),
            objects_total: self.state.objects_total.load(Ordering::Relaxed),
            bytes_done: self.state.bytes_done.load(Ordering::Relaxed),
            bytes_total: self.state.bytes_total.load(Ordering::Relaxed),
            elapsed: self.state.started_at.lock().unwrap().elapsed(),
        }
    }

    fn send(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn init_phase(&self, phase: Phase, total_objects: u64, total_bytes: u64) {
        self.state.objects_total.store(total_objects, Ordering::Relaxed);
        self.state.bytes_total.store(total_bytes, Ordering::Relaxed);
        self.state.objects_done.store(0, Ordering::Relaxed);
        self.state.bytes_done.store(0, Ordering::Relaxed);
        *self.state.started_at.lock().unwrap() = Instant::now();
        self.send(ProgressEvent::PhaseStarted { phase, total_objects, total_bytes });
    }

    fn on_processed(&self, delta_objects: u64, delta_bytes: u64) {
        let objects_done = self.state.objects_done.fetch_add(delta_objects, Ordering::Relaxed) + delta_objects;
        let bytes_done = self.state.bytes_done.fetch_add(delta_bytes, Ordering::Relaxed) + delta_bytes;
        self.send(ProgressEvent::Processed {
            objects_done,
            bytes_done,
            objects_total: self.state.objects_total.load(Ordering::Relaxed),
            bytes_total: self.state.bytes_total.load(Ordering::Relaxed),
        });
    }

    fn status(&self, text: &str) {
        self.send(ProgressEvent::Status { text: text.to_string() });
    }

    fn report_info(&self, text: &str) {
        self.send(ProgressEvent::Info { text: text.to_string() });
    }

    fn report_warning(&self, text: &str, warn_again: bool) -> bool {
        self.send(ProgressEvent::Warning { text: text.to_string() });
        warn_again
    }

    fn report_error(&self, text: &str) -> ErrorResolution {
        self.send(ProgressEvent::Error { text: text.to_string() });
        self.error_policy
    }

    fn report_fatal_error(&self, text: &str) {
        self.send(ProgressEvent::FatalError { text: text.to_string() });
    }

    fn update_total(&self, delta_objects: i64, delta_bytes: i64) {
        adjust(&self.state.objects_total, delta_objects);
        adjust(&self.state.bytes_total, delta_bytes);
    }

    fn request_ui_refresh(&self) -> Result<()> {
        if self.state.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn adjust(counter: &AtomicU64, delta: i64) {
    if delta >= 0 {
        counter.fetch_add(delta as u64, Ordering::Relaxed);
    } else {
        counter.fetch_sub((-delta) as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub objects_done: u64,
    pub objects_total: u64,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn completion_fraction(&self) -> f64 {
        if self.objects_total == 0 {
            1.0
        } else {
            self.objects_done as f64 / self.objects_total as f64
        }
    }

    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_done as f64 / secs
        } else {
            0.0
        }
    }
}

/// Format bytes as a human-readable string (e.g. `1.50 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }
    if unit_index == 0 {
        format!("{bytes} {}", UNITS[unit_index])
    } else {
        format!("{size:.2} {}", UNITS[unit_index])
    }
}

pub fn format_bytes_per_second(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_second as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_observer_streams_phase_and_progress() {
        let (observer, mut channel) = ProgressChannel::new(ErrorResolution::Ignore);
        observer.init_phase(Phase::Sync, 10, 1000);
        observer.on_processed(3, 300);

        let ev1 = channel.recv().await.unwrap();
        assert!(matches!(ev1, ProgressEvent::PhaseStarted { total_objects: 10, total_bytes: 1000, .. }));

        let ev2 = channel.recv().await.unwrap();
        match ev2 {
            ProgressEvent::Processed { objects_done, bytes_done, .. } => {
                assert_eq!(objects_done, 3);
                assert_eq!(bytes_done, 300);
            }
            _ => panic!("expected Processed event"),
        }
    }

    #[test]
    fn cancel_causes_ui_refresh_to_abort() {
        let (observer, _channel) = ProgressChannel::new(ErrorResolution::Ignore);
        assert!(observer.request_ui_refresh().is_ok());
        observer.cancel();
        assert!(observer.request_ui_refresh().is_err());
    }

    #[test]
    fn update_total_applies_negative_correction() {
        let (observer, _channel) = ProgressChannel::new(ErrorResolution::Ignore);
        observer.init_phase(Phase::Sync, 10, 1000);
        observer.update_total(-2, -100);
        let snap = observer.snapshot();
        assert_eq!(snap.objects_total, 8);
        assert_eq!(snap.bytes_total, 900);
    }

    #[test]
    fn format_bytes_matches_expected_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
    }

    #[test]
    fn null_observer_never_cancels() {
        let n = NullProgressObserver;
        assert!(n.request_ui_refresh().is_ok());
        assert_eq!(n.report_error("x"), ErrorResolution::Ignore);
    }
}
