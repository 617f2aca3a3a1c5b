//! Lock-Guarded Ring Buffer Implementation

use crate::Row;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};

/// Default buffer capacity (500 rows = 2.5 s at 200 Hz)
pub const DEFAULT_CAPACITY: usize = 500;

/// Default bound on waiting for the buffer lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2);

/// Slot storage and indices, only ever touched with the lock held
struct Slots {
    storage: Box<[Option<Row>]>,
    /// Next write slot
    head: usize,
    /// Next read slot
    tail: usize,
    /// Rows currently stored
    count: usize,
}

impl Slots {
    fn new(capacity: usize) -> Self {
        let storage: Vec<Option<Row>> = (0..capacity).map(|_| None).collect();
        Self {
            storage: storage.into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Write at head. Returns true when the oldest row was evicted.
    fn write(&mut self, row: Row) -> bool {
        let capacity = self.storage.len();
        // When full, head == tail, so this replaces the oldest row in place.
        self.storage[self.head] = Some(row);
        self.head = (self.head + 1) % capacity;

        if self.count == capacity {
            self.tail = (self.tail + 1) % capacity;
            true
        } else {
            self.count += 1;
            false
        }
    }

    fn take(&mut self) -> Option<Row> {
        if self.count == 0 {
            return None;
        }

        let row = self.storage[self.tail].take();
        self.tail = (self.tail + 1) % self.storage.len();
        self.count -= 1;
        row
    }

    fn snapshot(&self) -> RingSnapshot {
        let capacity = self.storage.len();
        let rows = (0..self.count)
            .filter_map(|i| self.storage[(self.tail + i) % capacity].clone())
            .collect();

        RingSnapshot {
            head: self.head,
            tail: self.tail,
            count: self.count,
            rows,
        }
    }
}

/// Point-in-time copy of the buffer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSnapshot {
    pub head: usize,
    pub tail: usize,
    pub count: usize,
    /// Stored rows, oldest first
    pub rows: Vec<Row>,
}

/// Fixed-capacity ring of rows with overwrite-oldest semantics.
///
/// Every operation takes the lock with a bounded wait. A push never fails for
/// lack of space: on a full buffer the oldest row is evicted. A push fails only
/// when the lock cannot be obtained in time, in which case nothing changes.
pub struct RingBuffer {
    slots: Mutex<Slots>,
    capacity: usize,
    lock_timeout: Duration,
    /// Mirror of `count`, updated under the lock but read without it
    occupancy: AtomicUsize,
    total_pushed: AtomicU64,
    total_evicted: AtomicU64,
    contention_timeouts: AtomicU64,
}

impl RingBuffer {
    /// Create a new ring buffer with given capacity
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Ring buffer capacity must be > 0");
        info!("Creating ring buffer: capacity={}", capacity);
        Self {
            slots: Mutex::new(Slots::new(capacity)),
            capacity,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            occupancy: AtomicUsize::new(0),
            total_pushed: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
            contention_timeouts: AtomicU64::new(0),
        }
    }

    /// Create a buffer with default capacity (500 rows)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Set the bound on waiting for the lock
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Push a row, evicting the oldest one if the buffer is full.
    ///
    /// Returns `false` only if the lock was not obtained within the timeout.
    pub async fn push(&self, row: Row) -> bool {
        let Ok(mut slots) = timeout(self.lock_timeout, self.slots.lock()).await else {
            self.contention_timeouts.fetch_add(1, Ordering::Relaxed);
            debug!("Push dropped: lock not acquired within {:?}", self.lock_timeout);
            return false;
        };

        let evicted = slots.write(row);
        self.occupancy.store(slots.count, Ordering::Release);
        drop(slots);

        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.total_evicted.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    /// Pop the oldest row.
    ///
    /// `None` means either the buffer was empty or the lock was not obtained
    /// in time. Callers cannot tell the two apart.
    pub async fn pop(&self) -> Option<Row> {
        let Ok(mut slots) = timeout(self.lock_timeout, self.slots.lock()).await else {
            self.contention_timeouts.fetch_add(1, Ordering::Relaxed);
            debug!("Pop skipped: lock not acquired within {:?}", self.lock_timeout);
            return None;
        };

        let row = slots.take();
        self.occupancy.store(slots.count, Ordering::Release);
        row
    }

    /// Number of rows currently stored (advisory, for diagnostics only)
    pub fn size(&self) -> usize {
        self.occupancy.load(Ordering::Acquire)
    }

    /// Check if buffer is empty (advisory)
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Check if buffer is full (advisory)
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.size() as f64 / self.capacity as f64
    }

    /// Total rows accepted since creation
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed.load(Ordering::Relaxed)
    }

    /// Total rows discarded by overwrite
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted.load(Ordering::Relaxed)
    }

    /// Total operations abandoned on lock timeout
    pub fn contention_timeouts(&self) -> u64 {
        self.contention_timeouts.load(Ordering::Relaxed)
    }

    /// Copy out indices and rows under the lock, with the same bounded wait
    pub async fn snapshot(&self) -> Option<RingSnapshot> {
        let slots = timeout(self.lock_timeout, self.slots.lock()).await.ok()?;
        Some(slots.snapshot())
    }
}
