//! Sampling Coordinator Implementation

use crate::PipelineStats;
use channel_reader::{ChannelId, ChannelReader, INVALID_SAMPLE};
use ring_buffer::{Row, RingBuffer};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trigger::TaskWaiter;

/// Task that reads one row per fast-trigger wake-up and stores it
pub struct SamplingCoordinator<R: ChannelReader> {
    waiter: TaskWaiter,
    reader: R,
    /// Fixed channel order, one column per entry
    channels: Vec<ChannelId>,
    ring: Arc<RingBuffer>,
    stats: Arc<PipelineStats>,
}

impl<R: ChannelReader> SamplingCoordinator<R> {
    /// Create a new sampling coordinator
    pub fn new(
        waiter: TaskWaiter,
        reader: R,
        channels: Vec<ChannelId>,
        ring: Arc<RingBuffer>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        info!("Sampling coordinator created with {} channels", channels.len());
        Self {
            waiter,
            reader,
            channels,
            ring,
            stats,
        }
    }

    /// Channels sampled each cycle, in column order
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Perform one sample-and-store cycle.
    ///
    /// Returns `false` if the row was dropped on buffer contention. Dropped
    /// rows are counted, never retried.
    pub async fn sample_once(&mut self) -> bool {
        let row = self.reader.read_row(&self.channels);
        let row = self.fit_width(row);

        if self.ring.push(row).await {
            self.stats.record_push(self.ring.size());
            true
        } else {
            self.stats.record_drop();
            debug!("Sample dropped on ring contention");
            false
        }
    }

    /// Run the sampling loop forever
    pub async fn run(mut self) {
        info!("Starting sampling coordinator");

        loop {
            // Wake-ups coalesce, so a burst of ticks yields one cycle
            self.waiter.wait().await;
            self.sample_once().await;
        }
    }

    /// Keep column identity if a reader returns the wrong number of samples
    fn fit_width(&self, row: Row) -> Row {
        if row.width() == self.channels.len() {
            return row;
        }

        warn!(
            "Reader returned {} samples for {} channels",
            row.width(),
            self.channels.len()
        );
        let mut samples = row.into_samples();
        samples.resize(self.channels.len(), INVALID_SAMPLE);
        Row::new(samples)
    }
}
