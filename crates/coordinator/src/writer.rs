//! Sink writer thread
//!
//! Sink I/O is blocking (serial writes with a timeout, stdout flushes). It
//! runs on a dedicated thread so a slow sink can never occupy a runtime
//! worker that the sampling task needs.

use crate::{CoordinatorError, PipelineStats};
use ring_buffer::Row;
use sink::{EmittedLog, Sink};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Default number of drained batches that may wait for the writer
pub const DEFAULT_PENDING_BATCHES: usize = 4;

/// Drained slots of one emission cycle, in pop order
pub type Batch = Vec<Option<Row>>;

/// Result of writing one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows handed to the sink
    pub rows: usize,
    /// Sentinels handed to the sink
    pub sentinels: usize,
    /// Emissions the sink rejected
    pub failed: usize,
}

/// Write one batch in order: a row line per filled slot, a sentinel per
/// empty one. A sink error skips that slot only.
pub fn write_batch<S: Sink + ?Sized>(
    sink: &mut S,
    batch: &[Option<Row>],
    log: Option<&EmittedLog>,
    stats: &PipelineStats,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for slot in batch {
        let result = match slot {
            Some(row) => {
                outcome.rows += 1;
                stats.record_row();
                if let Some(log) = log {
                    log.record(row);
                }
                sink.emit_row(row)
            }
            None => {
                outcome.sentinels += 1;
                stats.record_sentinel();
                sink.emit_no_data()
            }
        };

        if let Err(e) = result {
            outcome.failed += 1;
            stats.record_sink_error();
            warn!("Emission skipped: {}", e);
        }
    }

    outcome
}

/// Sending half held by the emission coordinator
#[derive(Clone)]
pub struct BatchSender {
    tx: mpsc::Sender<Batch>,
    stats: Arc<PipelineStats>,
}

impl BatchSender {
    /// Queue a batch without waiting.
    ///
    /// Returns `false` if the writer is behind (or gone) and the batch was
    /// dropped.
    pub fn submit(&self, batch: Batch) -> bool {
        match self.tx.try_send(batch) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.stats.record_batch_dropped();
                debug!("Sink writer behind, batch dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_batch_dropped();
                warn!("Sink writer stopped, batch dropped");
                false
            }
        }
    }
}

/// Thread owning the sink
pub struct SinkWriter {
    thread: JoinHandle<()>,
}

impl SinkWriter {
    /// Start the writer thread. At most `pending` batches wait for it.
    ///
    /// The thread exits once every [`BatchSender`] is dropped and the queue
    /// is drained.
    pub fn spawn<S>(
        mut sink: S,
        pending: usize,
        log: Option<Arc<EmittedLog>>,
        stats: Arc<PipelineStats>,
    ) -> Result<(BatchSender, Self), CoordinatorError>
    where
        S: Sink + 'static,
    {
        if pending == 0 {
            return Err(CoordinatorError::ZeroPending);
        }

        let (tx, mut rx) = mpsc::channel::<Batch>(pending);
        let thread_stats = Arc::clone(&stats);

        let thread = thread::Builder::new()
            .name("sink-writer".to_string())
            .spawn(move || {
                let mut written = 0u64;
                while let Some(batch) = rx.blocking_recv() {
                    write_batch(&mut sink, &batch, log.as_deref(), &thread_stats);
                    written += 1;
                }
                info!("Sink writer stopped after {} batches", written);
            })
            .map_err(|e| CoordinatorError::Spawn(e.to_string()))?;

        info!("Sink writer started: {} pending batches", pending);
        Ok((BatchSender { tx, stats }, Self { thread }))
    }

    /// Wait for the writer to finish. Blocks until every sender is dropped
    /// and the queued batches are written.
    pub fn join(self) -> Result<(), CoordinatorError> {
        self.thread
            .join()
            .map_err(|_| CoordinatorError::WriterPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sink::{MemorySink, SinkError, NO_DATA};
    use std::sync::mpsc as std_mpsc;

    struct UnavailableSink;

    impl Sink for UnavailableSink {
        fn emit_row(&mut self, _row: &Row) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("serial".into()))
        }

        fn emit_no_data(&mut self) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("serial".into()))
        }

        fn diagnostic(&mut self, _message: &str) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("serial".into()))
        }
    }

    /// Blocks inside the first write until released
    struct GatedSink {
        inner: MemorySink,
        entered: std_mpsc::Sender<()>,
        release: std_mpsc::Receiver<()>,
        gated: bool,
    }

    impl GatedSink {
        fn wait_gate(&mut self) {
            if self.gated {
                self.gated = false;
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
        }
    }

    impl Sink for GatedSink {
        fn emit_row(&mut self, row: &Row) -> Result<(), SinkError> {
            self.wait_gate();
            self.inner.emit_row(row)
        }

        fn emit_no_data(&mut self) -> Result<(), SinkError> {
            self.wait_gate();
            self.inner.emit_no_data()
        }

        fn diagnostic(&mut self, message: &str) -> Result<(), SinkError> {
            self.inner.diagnostic(message)
        }
    }

    #[test]
    fn test_write_batch_in_order() {
        let mut sink = MemorySink::new();
        let stats = PipelineStats::new();
        let batch = vec![Some(Row::new(vec![1, 2])), None];

        let outcome = write_batch(&mut sink, &batch, None, &stats);

        assert_eq!(outcome, BatchOutcome { rows: 1, sentinels: 1, failed: 0 });
        assert_eq!(sink.lines(), vec!["1,2", NO_DATA]);
    }

    #[test]
    fn test_sink_failure_is_skipped() {
        let stats = PipelineStats::new();
        let batch = vec![Some(Row::new(vec![1])), None];

        let outcome = write_batch(&mut UnavailableSink, &batch, None, &stats);

        assert_eq!(outcome.failed, 2);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sink_errors, 2);
        assert_eq!(snapshot.rows_emitted, 1);
        assert_eq!(snapshot.sentinels_emitted, 1);
    }

    #[test]
    fn test_emitted_rows_logged() {
        let log = EmittedLog::new(10);
        let batch = vec![Some(Row::new(vec![5, 6])), None];

        write_batch(&mut MemorySink::new(), &batch, Some(&log), &PipelineStats::new());

        assert_eq!(log.rows(), vec![Row::new(vec![5, 6])]);
    }

    #[test]
    fn test_zero_pending_rejected() {
        let result = SinkWriter::spawn(MemorySink::new(), 0, None, Arc::new(PipelineStats::new()));
        assert!(matches!(result, Err(CoordinatorError::ZeroPending)));
    }

    #[test]
    fn test_writer_drains_queue_before_exit() {
        let sink = MemorySink::new();
        let (batches, writer) =
            SinkWriter::spawn(sink.clone(), 4, None, Arc::new(PipelineStats::new())).unwrap();

        assert!(batches.submit(vec![Some(Row::new(vec![1]))]));
        assert!(batches.submit(vec![None]));
        drop(batches);
        writer.join().unwrap();

        assert_eq!(sink.lines(), vec!["1", NO_DATA]);
    }

    #[test]
    fn test_full_queue_drops_batch() {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let memory = MemorySink::new();
        let sink = GatedSink {
            inner: memory.clone(),
            entered: entered_tx,
            release: release_rx,
            gated: true,
        };
        let stats = Arc::new(PipelineStats::new());
        let (batches, writer) = SinkWriter::spawn(sink, 1, None, Arc::clone(&stats)).unwrap();

        // First batch is taken by the writer, which then blocks in the sink
        assert!(batches.submit(vec![Some(Row::new(vec![1]))]));
        entered_rx.recv().unwrap();
        // One batch fits in the queue, the next is dropped
        assert!(batches.submit(vec![Some(Row::new(vec![2]))]));
        assert!(!batches.submit(vec![Some(Row::new(vec![3]))]));

        release_tx.send(()).unwrap();
        drop(batches);
        writer.join().unwrap();

        assert_eq!(memory.lines(), vec!["1", "2"]);
        assert_eq!(stats.snapshot().batches_dropped, 1);
    }
}
