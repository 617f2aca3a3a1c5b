//! Emission Coordinator Implementation

use crate::{Batch, BatchSender, PipelineStats};
use ring_buffer::RingBuffer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use trigger::Event;

/// Default rows drained per emission cycle
pub const DEFAULT_BATCH_SIZE: usize = 2;

/// Result of one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Slots that held a row
    pub rows: usize,
    /// Slots that will become sentinels
    pub sentinels: usize,
    /// Whether the writer accepted the batch
    pub queued: bool,
}

/// Task that drains a fixed batch of rows per emit event
pub struct EmissionCoordinator {
    events: mpsc::Receiver<Event>,
    ring: Arc<RingBuffer>,
    batches: BatchSender,
    /// Pop attempts per cycle, regardless of occupancy
    batch_size: usize,
    stats: Arc<PipelineStats>,
}

impl EmissionCoordinator {
    /// Create a new emission coordinator
    pub fn new(
        events: mpsc::Receiver<Event>,
        ring: Arc<RingBuffer>,
        batches: BatchSender,
        batch_size: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        info!("Emission coordinator created: batch_size={}", batch_size);
        Self {
            events,
            ring,
            batches,
            batch_size,
            stats,
        }
    }

    /// Drain exactly `batch_size` slots and hand them to the sink writer.
    ///
    /// An empty slot (buffer empty or lock timeout) becomes a sentinel, so the
    /// cycle never waits for data. Handing off never waits for the sink.
    pub async fn emit_batch(&mut self) -> DrainOutcome {
        let mut batch: Batch = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            batch.push(self.ring.pop().await);
        }

        let rows = batch.iter().filter(|slot| slot.is_some()).count();
        self.stats.record_emit_cycle(self.ring.size());
        let queued = self.batches.submit(batch);

        debug!(
            "Emission cycle: {} rows, {} sentinels, queued={}",
            rows,
            self.batch_size - rows,
            queued
        );
        DrainOutcome {
            rows,
            sentinels: self.batch_size - rows,
            queued,
        }
    }

    /// Run the emission loop until the event channel closes
    pub async fn run(mut self) {
        info!("Starting emission coordinator");

        while let Some(event) = self.events.recv().await {
            match event {
                Event::EmitReady => {
                    self.emit_batch().await;
                }
                other => debug!("Ignoring {:?} on emission channel", other),
            }
        }

        info!("Event channel closed, emission coordinator stopped");
    }
}
