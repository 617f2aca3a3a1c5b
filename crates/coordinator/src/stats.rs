//! Pipeline counters

use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, Ordering};

/// Diagnostic counters shared by both coordinators.
///
/// Every update is mirrored to the `metrics` facade.
#[derive(Debug, Default)]
pub struct PipelineStats {
    samples_pushed: AtomicU64,
    samples_dropped: AtomicU64,
    emit_cycles: AtomicU64,
    rows_emitted: AtomicU64,
    sentinels_emitted: AtomicU64,
    sink_errors: AtomicU64,
    batches_dropped: AtomicU64,
}

/// Plain copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub samples_pushed: u64,
    pub samples_dropped: u64,
    pub emit_cycles: u64,
    pub rows_emitted: u64,
    pub sentinels_emitted: u64,
    pub sink_errors: u64,
    /// Drained batches discarded because the sink writer was behind
    pub batches_dropped: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_push(&self, occupancy: usize) {
        self.samples_pushed.fetch_add(1, Ordering::Relaxed);
        counter!("daq_samples_pushed_total").increment(1);
        gauge!("daq_ring_occupancy").set(occupancy as f64);
    }

    pub(crate) fn record_drop(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
        counter!("daq_samples_dropped_total").increment(1);
    }

    pub(crate) fn record_emit_cycle(&self, occupancy: usize) {
        self.emit_cycles.fetch_add(1, Ordering::Relaxed);
        gauge!("daq_ring_occupancy").set(occupancy as f64);
    }

    pub(crate) fn record_row(&self) {
        self.rows_emitted.fetch_add(1, Ordering::Relaxed);
        counter!("daq_rows_emitted_total").increment(1);
    }

    pub(crate) fn record_sentinel(&self) {
        self.sentinels_emitted.fetch_add(1, Ordering::Relaxed);
        counter!("daq_sentinels_emitted_total").increment(1);
    }

    pub(crate) fn record_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
        counter!("daq_sink_errors_total").increment(1);
    }

    pub(crate) fn record_batch_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        counter!("daq_batches_dropped_total").increment(1);
    }

    /// Copy current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_pushed: self.samples_pushed.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            emit_cycles: self.emit_cycles.load(Ordering::Relaxed),
            rows_emitted: self.rows_emitted.load(Ordering::Relaxed),
            sentinels_emitted: self.sentinels_emitted.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
        }
    }
}
