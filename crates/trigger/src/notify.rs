//! Coalescing task notification

use crate::TriggerError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;
use tracing::info;

/// Payload-free wake-up for a single task.
///
/// Holds at most one pending wake: any number of notifications delivered
/// before the task waits again collapse into one.
#[derive(Default)]
pub struct TaskNotifier {
    target: OnceLock<Arc<Notify>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl TaskNotifier {
    /// Create a notifier with no registered task
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the task that will receive wake-ups. Only one task may register.
    pub fn register(&self) -> Result<TaskWaiter, TriggerError> {
        let notify = Arc::new(Notify::new());
        self.target
            .set(Arc::clone(&notify))
            .map_err(|_| TriggerError::AlreadyRegistered("task notifier"))?;

        info!("Task registered for notifications");
        Ok(TaskWaiter { notify })
    }

    /// Wake the registered task. Safe to call from a trigger handler.
    ///
    /// Returns `false` if no task is registered yet; the signal is dropped.
    pub fn notify_from_isr(&self) -> bool {
        match self.target.get() {
            Some(notify) => {
                notify.notify_one();
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Whether a task has registered
    pub fn is_registered(&self) -> bool {
        self.target.get().is_some()
    }

    /// Notifications handed to the task (before coalescing)
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Notifications dropped because no task was registered
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving end of a [`TaskNotifier`]
pub struct TaskWaiter {
    notify: Arc<Notify>,
}

impl TaskWaiter {
    /// Suspend until notified. Returns immediately if a wake is pending.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_notify_before_register_is_dropped() {
        let notifier = TaskNotifier::new();
        assert!(!notifier.notify_from_isr());
        assert_eq!(notifier.dropped(), 1);
        assert!(!notifier.is_registered());
    }

    #[test]
    fn test_single_registration() {
        let notifier = TaskNotifier::new();
        assert!(notifier.register().is_ok());
        assert!(matches!(
            notifier.register(),
            Err(TriggerError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_coalesce() {
        let notifier = TaskNotifier::new();
        let waiter = notifier.register().unwrap();

        for _ in 0..3 {
            assert!(notifier.notify_from_isr());
        }
        assert_eq!(notifier.delivered(), 3);

        // One pending wake, then nothing
        assert!(timeout(Duration::from_millis(10), waiter.wait()).await.is_ok());
        assert!(timeout(Duration::from_millis(10), waiter.wait()).await.is_err());
    }

    #[tokio::test]
    async fn test_wake_from_other_thread() {
        let notifier = Arc::new(TaskNotifier::new());
        let waiter = notifier.register().unwrap();

        let remote = Arc::clone(&notifier);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            remote.notify_from_isr();
        });

        assert!(timeout(Duration::from_secs(1), waiter.wait()).await.is_ok());
    }
}
