//! Periodic timer threads

use crate::TriggerError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A periodic trigger source running on its own thread.
///
/// The handler runs once per period. It must complete in bounded time and
/// must not block; ticks that are missed because the handler overran are
/// skipped, never replayed in a burst.
#[derive(Debug, Clone)]
pub struct PeriodicTrigger {
    name: String,
    period: Duration,
}

impl PeriodicTrigger {
    /// Create a trigger with the given name and period
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
        }
    }

    /// Trigger period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start firing `handler` every period
    pub fn start<F>(self, mut handler: F) -> Result<TriggerHandle, TriggerError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.period.is_zero() {
            return Err(TriggerError::ZeroPeriod(self.name));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));
        let missed = Arc::new(AtomicU64::new(0));

        let period = self.period;
        let thread_stop = Arc::clone(&stop);
        let thread_ticks = Arc::clone(&ticks);
        let thread_missed = Arc::clone(&missed);

        let thread = thread::Builder::new()
            .name(format!("trigger-{}", self.name))
            .spawn(move || {
                let mut next = Instant::now() + period;

                while !thread_stop.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < next {
                        // Spurious unparks just loop back here
                        thread::park_timeout(next - now);
                        continue;
                    }

                    handler();
                    thread_ticks.fetch_add(1, Ordering::Relaxed);

                    next += period;
                    let after = Instant::now();
                    if next <= after {
                        let behind = (after - next).as_nanos() / period.as_nanos() + 1;
                        let skipped = u32::try_from(behind).unwrap_or(u32::MAX);
                        next += period * skipped;
                        thread_missed.fetch_add(u64::from(skipped), Ordering::Relaxed);
                    }
                }
            })
            .map_err(|e| TriggerError::Spawn {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        info!("Trigger '{}' started: period={:?}", self.name, period);

        Ok(TriggerHandle {
            name: self.name,
            stop,
            ticks,
            missed,
            thread: Some(thread),
        })
    }
}

/// Handle to a running trigger. Dropping it stops the trigger.
pub struct TriggerHandle {
    name: String,
    stop: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    missed: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl TriggerHandle {
    /// Trigger name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of times the handler has fired
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Number of ticks skipped because the handler overran
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    /// Stop the trigger and wait for its thread. Returns the final tick count.
    pub fn stop(mut self) -> u64 {
        self.halt();
        self.ticks()
    }

    fn halt(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        thread.thread().unpark();
        if thread.join().is_err() {
            debug!("Trigger '{}' handler panicked", self.name);
        }
        info!("Trigger '{}' stopped after {} ticks", self.name, self.ticks());
    }
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        self.halt();
    }
}
