//! Bounded event channel from trigger handlers to a task

use crate::{Event, TriggerError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::info;

/// Default number of events that may wait in the queue
pub const DEFAULT_EVENT_CAPACITY: usize = 10;

/// Fixed-capacity FIFO of [`Event`] tags.
///
/// Sending never blocks: when the queue is full, or no receiver has been
/// registered yet, the event is dropped and counted.
pub struct EventQueue {
    sender: OnceLock<mpsc::Sender<Event>>,
    capacity: usize,
    delivered: AtomicU64,
    dropped_full: AtomicU64,
    dropped_unbound: AtomicU64,
}

impl EventQueue {
    /// Create an event queue with given capacity
    pub fn new(capacity: usize) -> Result<Self, TriggerError> {
        if capacity == 0 {
            return Err(TriggerError::ZeroCapacity);
        }

        Ok(Self {
            sender: OnceLock::new(),
            capacity,
            delivered: AtomicU64::new(0),
            dropped_full: AtomicU64::new(0),
            dropped_unbound: AtomicU64::new(0),
        })
    }

    /// Register the receiving task. Only one receiver may register.
    pub fn register(&self) -> Result<mpsc::Receiver<Event>, TriggerError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.sender
            .set(tx)
            .map_err(|_| TriggerError::AlreadyRegistered("event queue"))?;

        info!("Event queue receiver registered: capacity={}", self.capacity);
        Ok(rx)
    }

    /// Offer an event without blocking. Safe to call from a trigger handler.
    ///
    /// Returns `false` if the event was dropped.
    pub fn send_from_isr(&self, event: Event) -> bool {
        let Some(tx) = self.sender.get() else {
            self.dropped_unbound.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_full.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped_unbound.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events accepted into the queue
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Events dropped because the queue was full
    pub fn dropped_full(&self) -> u64 {
        self.dropped_full.load(Ordering::Relaxed)
    }

    /// Events dropped because no receiver was registered or it had gone away
    pub fn dropped_unbound(&self) -> u64 {
        self.dropped_unbound.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(EventQueue::new(0), Err(TriggerError::ZeroCapacity)));
    }

    #[test]
    fn test_send_before_register_is_dropped() {
        let queue = EventQueue::new(4).unwrap();
        assert!(!queue.send_from_isr(Event::EmitReady));
        assert_eq!(queue.dropped_unbound(), 1);
        assert_eq!(queue.delivered(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let queue = EventQueue::new(2).unwrap();
        let mut rx = queue.register().unwrap();

        assert!(queue.send_from_isr(Event::EmitReady));
        assert!(queue.send_from_isr(Event::SampleReady));
        assert!(!queue.send_from_isr(Event::EmitReady));
        assert_eq!(queue.dropped_full(), 1);

        assert_eq!(rx.recv().await, Some(Event::EmitReady));
        assert_eq!(rx.recv().await, Some(Event::SampleReady));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_receiver_dropped() {
        let queue = EventQueue::new(2).unwrap();
        let rx = queue.register().unwrap();
        drop(rx);

        assert!(!queue.send_from_isr(Event::EmitReady));
        assert_eq!(queue.dropped_unbound(), 1);
    }

    #[test]
    fn test_single_registration() {
        let queue = EventQueue::new(1).unwrap();
        let _rx = queue.register().unwrap();
        assert!(matches!(
            queue.register(),
            Err(TriggerError::AlreadyRegistered(_))
        ));
    }
}
