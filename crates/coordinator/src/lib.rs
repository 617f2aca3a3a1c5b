//! Sampling and Emission Coordinators
//!
//! Two long-running tasks share one [`RingBuffer`](ring_buffer::RingBuffer):
//! the sampler stores one row per wake-up from the fast trigger, the emitter
//! drains a fixed batch per event from the slow trigger. Neither ever waits
//! on the other; contention and overrun lose data instead of adding latency.
//! Drained batches go to a [`SinkWriter`] thread, so sink I/O never runs on
//! the async workers.

mod emitter;
mod error;
mod sampler;
mod stats;
mod writer;

pub use emitter::{DrainOutcome, EmissionCoordinator, DEFAULT_BATCH_SIZE};
pub use error::CoordinatorError;
pub use sampler::SamplingCoordinator;
pub use stats::{PipelineStats, StatsSnapshot};
pub use writer::{
    write_batch, Batch, BatchOutcome, BatchSender, SinkWriter, DEFAULT_PENDING_BATCHES,
};
