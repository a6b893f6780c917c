//! Conversion progress accounting
//!
//! Workers bump append-only atomic counters; a reporter task reads them on a
//! fixed interval and logs completion and input throughput. Nothing here
//! feeds back into pipeline decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared conversion counters
#[derive(Debug)]
pub struct Progress {
    total: u64,
    completed: AtomicU64,
    /// Bytes of source input consumed by finished conversions
    bytes_in: AtomicU64,
    started: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub completed: u64,
    pub bytes_in: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Input bytes per second since the batch started
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_in as f64 / secs
        } else {
            0.0
        }
    }
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total: total as u64,
            completed: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Count one finished chapter (successful or not)
    pub fn record(&self, input_bytes: u64) {
        self.bytes_in.fetch_add(input_bytes, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.completed.load(Ordering::Acquire) >= self.total
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed.load(Ordering::Acquire),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Log progress every `every` until all chapters are counted
pub async fn report_progress(progress: Arc<Progress>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately
    interval.tick().await;

    while !progress.is_finished() {
        interval.tick().await;
        let snap = progress.snapshot();
        tracing::info!(
            "Converted {}/{} chapters ({:.1} MB/s input)",
            snap.completed,
            snap.total,
            snap.throughput() / (1024.0 * 1024.0)
        );
    }
}
