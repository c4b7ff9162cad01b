// Session metrics module
//
// Lightweight counters for what the organizer did during a session

use crate::task::TaskStats;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Session metrics
///
/// Uses atomic counters so a shared reference is enough to record from any
/// component. Metrics are collected for the lifetime of the controller and
/// logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Thumbnails rendered and stored on an item
    pub thumbnails_rendered: AtomicUsize,

    /// Thumbnails the provider could not produce
    pub thumbnails_failed: AtomicUsize,

    /// Files written to an export target
    pub items_exported: AtomicUsize,

    /// Exports aborted by a file operation failure
    pub export_failures: AtomicUsize,

    /// Total export time in milliseconds
    pub total_export_time_ms: AtomicU64,

    /// Number of state updates performed
    pub state_updates: AtomicU64,

    /// Number of state changes broadcast
    pub state_broadcasts: AtomicU64,

    /// Session start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            thumbnails_rendered: AtomicUsize::new(0),
            thumbnails_failed: AtomicUsize::new(0),
            items_exported: AtomicUsize::new(0),
            export_failures: AtomicUsize::new(0),
            total_export_time_ms: AtomicU64::new(0),
            state_updates: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_thumbnail_rendered(&self) {
        self.thumbnails_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_thumbnail_failed(&self) {
        self.thumbnails_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_exported(&self) {
        self.items_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export_failure(&self) {
        self.export_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the wall time of one export run
    pub fn record_export_time(&self, duration: Duration) {
        self.total_export_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record one state update and the number of changes it broadcast
    pub fn record_state_update(&self, broadcasts: usize) {
        self.state_updates.fetch_add(1, Ordering::Relaxed);
        self.state_broadcasts
            .fetch_add(broadcasts as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    ///
    /// Pass counts come from the thumbnail task, which keeps them itself.
    pub fn log_summary(&self, thumbnail_passes: &TaskStats) {
        let uptime = self.uptime();
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Thumbnails: {} rendered, {} failed",
            self.thumbnails_rendered.load(Ordering::Relaxed),
            self.thumbnails_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Thumbnail passes: {} started, {} completed, {} cancelled, {} failed",
            thumbnail_passes.passes_started,
            thumbnail_passes.passes_completed,
            thumbnail_passes.passes_cancelled,
            thumbnail_passes.passes_failed
        );
        tracing::info!(
            "Export: {} files, {} failures, {:.2}s",
            self.items_exported.load(Ordering::Relaxed),
            self.export_failures.load(Ordering::Relaxed),
            self.total_export_time_ms.load(Ordering::Relaxed) as f64 / 1000.0
        );
        tracing::info!(
            "State updates: {}, broadcasts: {}",
            self.state_updates.load(Ordering::Relaxed),
            self.state_broadcasts.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
