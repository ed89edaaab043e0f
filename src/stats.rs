//! Session statistics
//!
//! Counts what one retrieval run saw on the wire and how the repair pass went.

use std::time::{Duration, Instant};

use tracing::info;

use crate::reader::ReadCounters;

#[derive(Debug, Clone)]
pub struct SessionStats {
    start_time: Option<Instant>,
    elapsed: Option<Duration>,

    // Streaming
    frames_streamed: u64,
    bytes_streamed: u64,
    short_reads: u64,
    truncated_bytes: u64,
    duplicates: u64,

    // Reconciliation and repair
    gap_ranges: usize,
    missing: usize,
    repaired: usize,
    repair_failures: usize,
}

impl SessionStats {
    pub fn new() -> Self {
        SessionStats {
            start_time: None,
            elapsed: None,
            frames_streamed: 0,
            bytes_streamed: 0,
            short_reads: 0,
            truncated_bytes: 0,
            duplicates: 0,
            gap_ranges: 0,
            missing: 0,
            repaired: 0,
            repair_failures: 0,
        }
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.elapsed = None;
    }

    /// Freeze the elapsed time.
    pub fn finish(&mut self) {
        self.elapsed = self.start_time.map(|st| st.elapsed());
    }

    pub fn record_stream(&mut self, counters: ReadCounters) {
        self.frames_streamed = counters.frames;
        self.bytes_streamed = counters.bytes;
        self.short_reads = counters.short_reads;
        self.truncated_bytes = counters.truncated_bytes;
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub fn record_gaps(&mut self, gap_ranges: usize, missing: usize) {
        self.gap_ranges = gap_ranges;
        self.missing = missing;
    }

    pub fn record_repairs(&mut self, repaired: usize, failed: usize) {
        self.repaired = repaired;
        self.repair_failures = failed;
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed.or_else(|| self.start_time.map(|st| st.elapsed()))
    }

    pub fn frames_streamed(&self) -> u64 {
        self.frames_streamed
    }

    pub fn bytes_streamed(&self) -> u64 {
        self.bytes_streamed
    }

    pub fn short_reads(&self) -> u64 {
        self.short_reads
    }

    pub fn truncated_bytes(&self) -> u64 {
        self.truncated_bytes
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn gap_ranges(&self) -> usize {
        self.gap_ranges
    }

    pub fn missing(&self) -> usize {
        self.missing
    }

    pub fn repaired(&self) -> usize {
        self.repaired
    }

    pub fn repair_failures(&self) -> usize {
        self.repair_failures
    }

    pub fn log_summary(&self) {
        info!(
            frames = self.frames_streamed,
            bytes = self.bytes_streamed,
            short_reads = self.short_reads,
            truncated_bytes = self.truncated_bytes,
            duplicates = self.duplicates,
            gap_ranges = self.gap_ranges,
            missing = self.missing,
            repaired = self.repaired,
            repair_failures = self.repair_failures,
            elapsed = ?self.elapsed(),
            "session summary"
        );
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}
