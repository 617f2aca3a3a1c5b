//! Trigger Sources and Signalling
//!
//! Periodic timer threads stand in for hardware timer interrupts. Their
//! handlers may only use the two primitives in this crate: waking a task
//! through a [`TaskNotifier`], or offering an [`Event`] to an [`EventQueue`].
//! Neither blocks. A signal sent before the receiving task has registered
//! is dropped and counted.

mod error;
mod notify;
mod queue;
mod timer;

pub use error::TriggerError;
pub use notify::{TaskNotifier, TaskWaiter};
pub use queue::{EventQueue, DEFAULT_EVENT_CAPACITY};
pub use timer::{PeriodicTrigger, TriggerHandle};

/// Tag carried from a trigger handler to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A new row should be sampled
    SampleReady,
    /// A batch of rows should be emitted
    EmitReady,
}
