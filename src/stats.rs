//! Pipeline statistics.
//!
//! Each stage owns its own [`PipelineStats`] and is the only writer; other
//! activities only take [`StatsSnapshot`]s for reporting. Counters are plain
//! atomics, with no synchronisation across stages beyond that.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Frame and byte counters for one pipeline stage
#[derive(Debug)]
pub struct PipelineStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    skipped: AtomicU64,
    started: Instant,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStats {
    /// Start counting from now
    pub fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Count one transferred frame of `bytes` bytes; returns the new frame total.
    pub fn record_frame(&self, bytes: u64) -> u64 {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one frame the stage had to skip
    pub fn record_skip(&self) -> u64 {
        self.skipped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames(),
            bytes: self.bytes(),
            skipped: self.skipped(),
            elapsed: self.elapsed(),
        }
    }
}

/// Point-in-time copy of a stage's counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub bytes: u64,
    pub skipped: u64,
    pub elapsed: Duration,
}

impl StatsSnapshot {
    /// Average frames per second since the stage started
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.frames as f64 / secs } else { 0.0 }
    }

    /// Average bitrate in megabits per second
    pub fn mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { (self.bytes * 8) as f64 / (secs * 1_000_000.0) } else { 0.0 }
    }

    /// Total bytes in mebibytes
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Log a periodic throughput line every `every` frames (0 disables).
pub fn report_progress(
    label: &str,
    stats: &PipelineStats,
    frames: u64,
    every: u64,
    buffered: usize,
    capacity: usize,
) {
    if every == 0 || frames % every != 0 {
        return;
    }
    let snapshot = stats.snapshot();
    info!(
        frames = snapshot.frames,
        buffered,
        capacity,
        "{} {} frames, {:.1} fps, {:.2} Mbps, buffer {}/{}",
        label,
        snapshot.frames,
        snapshot.fps(),
        snapshot.mbps(),
        buffered,
        capacity
    );
}

/// Log the end-of-run summary for a stage
pub fn log_summary(label: &str, snapshot: &StatsSnapshot) {
    info!(
        frames = snapshot.frames,
        bytes = snapshot.bytes,
        skipped = snapshot.skipped,
        "{}: {} frames, {:.2} MB, {:.1} fps average, {:.2} Mbps average over {:.1}s",
        label,
        snapshot.frames,
        snapshot.megabytes(),
        snapshot.fps(),
        snapshot.mbps(),
        snapshot.elapsed.as_secs_f64()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_accounting_includes_headers() {
        let stats = PipelineStats::new();
        let frame_size = 1_000u64;
        for _ in 0..25 {
            stats.record_frame(frame_size + crate::wire::HEADER_LEN as u64);
        }
        assert_eq!(stats.frames(), 25);
        assert_eq!(stats.bytes(), 25 * 1_008);
    }

    #[test]
    fn rates_handle_zero_elapsed() {
        let snapshot = StatsSnapshot { frames: 10, bytes: 10, skipped: 0, elapsed: Duration::ZERO };
        assert_eq!(snapshot.fps(), 0.0);
        assert_eq!(snapshot.mbps(), 0.0);
    }

    #[test]
    fn rates_are_per_second() {
        let snapshot = StatsSnapshot {
            frames: 300,
            bytes: 1_250_000,
            skipped: 2,
            elapsed: Duration::from_secs(10),
        };
        assert!((snapshot.fps() - 30.0).abs() < f64::EPSILON);
        assert!((snapshot.mbps() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn record_returns_running_totals() {
        let stats = PipelineStats::new();
        assert_eq!(stats.record_frame(10), 1);
        assert_eq!(stats.record_frame(10), 2);
        assert_eq!(stats.record_skip(), 1);
        assert_eq!(stats.snapshot().skipped, 1);
    }
}
