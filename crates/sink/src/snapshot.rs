//! Emitted-row log and periodic file snapshot

use crate::SinkError;
use ring_buffer::Row;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default number of emitted rows kept for snapshots
pub const DEFAULT_SNAPSHOT_ROWS: usize = 1000;

/// Window of the most recently emitted rows
pub struct EmittedLog {
    rows: Mutex<VecDeque<Row>>,
    max_rows: usize,
    /// Records skipped because a snapshot held the lock
    skipped: AtomicU64,
}

impl EmittedLog {
    /// Create a log keeping up to `max_rows` rows
    pub fn new(max_rows: usize) -> Self {
        Self {
            rows: Mutex::new(VecDeque::with_capacity(max_rows)),
            max_rows,
            skipped: AtomicU64::new(0),
        }
    }

    /// Record an emitted row without waiting.
    ///
    /// Returns `false` if the log was busy and the row was not recorded.
    pub fn record(&self, row: &Row) -> bool {
        if self.max_rows == 0 {
            return false;
        }

        let mut rows = match self.rows.try_lock() {
            Ok(rows) => rows,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        // Enforce retention
        while rows.len() >= self.max_rows {
            rows.pop_front();
        }
        rows.push_back(row.clone());
        true
    }

    /// Copy of the logged rows, oldest first
    pub fn rows(&self) -> Vec<Row> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.iter().cloned().collect()
    }

    /// Number of logged rows
    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if nothing has been logged
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records skipped due to contention
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Rewrites a file with the emitted-row window on its own period
pub struct SnapshotWriter {
    path: PathBuf,
    log: Arc<EmittedLog>,
    period: Duration,
}

impl SnapshotWriter {
    /// Create a snapshot writer
    pub fn new(path: impl AsRef<Path>, log: Arc<EmittedLog>, period: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            log,
            period,
        }
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current window once, one space-separated line per row.
    /// Returns the number of rows written.
    pub async fn write_once(&self) -> Result<usize, SinkError> {
        let rows = self.log.rows();

        let mut content = String::new();
        for row in &rows {
            let line: Vec<String> = row.samples().iter().map(|s| s.to_string()).collect();
            content.push_str(&line.join(" "));
            content.push('\n');
        }

        tokio::fs::write(&self.path, content).await?;
        Ok(rows.len())
    }

    /// Run the snapshot loop until `stop` fires (or its sender is dropped),
    /// then write the final window once more.
    pub async fn run(self, mut stop: oneshot::Receiver<()>) {
        info!(
            "Starting snapshot writer: {} every {:?}",
            self.path.display(),
            self.period
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.write_logged().await,
                _ = &mut stop => break,
            }
        }

        self.write_logged().await;
        info!("Snapshot writer stopped");
    }

    async fn write_logged(&self) {
        match self.write_once().await {
            Ok(count) => debug!("Snapshot wrote {} rows", count),
            Err(e) => warn!("Snapshot to {} failed: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention() {
        let log = EmittedLog::new(3);
        for i in 0..5 {
            assert!(log.record(&Row::new(vec![i])));
        }

        let rows = log.rows();
        assert_eq!(rows, vec![Row::new(vec![2]), Row::new(vec![3]), Row::new(vec![4])]);
    }

    #[test]
    fn test_zero_rows_disables_log() {
        let log = EmittedLog::new(0);
        assert!(!log.record(&Row::new(vec![1])));
        assert!(log.is_empty());
    }

    #[test]
    fn test_record_skips_when_busy() {
        let log = EmittedLog::new(4);
        let guard = log.rows.lock().unwrap();
        assert!(!log.record(&Row::new(vec![1])));
        drop(guard);

        assert_eq!(log.skipped(), 1);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_write_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_log.dat");

        let log = Arc::new(EmittedLog::new(10));
        log.record(&Row::new(vec![1, 2]));
        log.record(&Row::new(vec![3, 4]));

        let writer = SnapshotWriter::new(&path, Arc::clone(&log), Duration::from_millis(20));
        assert_eq!(writer.write_once().await.unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1 2\n3 4\n");
    }

    #[tokio::test]
    async fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("data_log.dat");
        let writer = SnapshotWriter::new(path, Arc::new(EmittedLog::new(1)), Duration::from_secs(1));

        assert!(matches!(writer.write_once().await, Err(SinkError::Io(_))));
    }

    #[tokio::test]
    async fn test_run_writes_final_window_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_log.dat");
        let log = Arc::new(EmittedLog::new(10));
        let writer = SnapshotWriter::new(&path, Arc::clone(&log), Duration::from_secs(3600));

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(writer.run(stop_rx));
        tokio::task::yield_now().await;
        log.record(&Row::new(vec![8, 9]));

        stop_tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "8 9\n");
    }
}
