//! Pipeline wiring

use crate::{NodeError, OutputKind, Settings};
use channel_reader::{ChannelReader, SimulatedReader};
use coordinator::{
    EmissionCoordinator, PipelineStats, SamplingCoordinator, SinkWriter, StatsSnapshot,
};
use metrics::counter;
use ring_buffer::RingBuffer;
use sink::{open_serial, EmittedLog, LineSink, Sink, SnapshotWriter};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use trigger::{Event, EventQueue, PeriodicTrigger, TaskNotifier, TriggerHandle};

/// Final counters collected at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stats: StatsSnapshot,
    /// Fast trigger ticks
    pub sample_ticks: u64,
    /// Slow trigger ticks
    pub emit_ticks: u64,
    /// Trigger signals dropped (no receiver yet, or event queue full)
    pub signals_dropped: u64,
    /// Rows overwritten while still unread
    pub rows_evicted: u64,
    /// Ring operations abandoned on lock timeout
    pub contention_timeouts: u64,
}

/// Drop counters of both trigger paths
#[derive(Clone)]
pub struct SignalCounters {
    notifier: Arc<TaskNotifier>,
    events: Arc<EventQueue>,
}

impl SignalCounters {
    /// Signals dropped so far on either path
    pub fn dropped(&self) -> u64 {
        self.notifier.dropped() + self.events.dropped_full() + self.events.dropped_unbound()
    }
}

/// A running pipeline: two triggers, two coordinators, one ring, one sink
/// writer thread
pub struct Pipeline {
    ring: Arc<RingBuffer>,
    stats: Arc<PipelineStats>,
    signals: SignalCounters,
    log: Option<Arc<EmittedLog>>,
    sample_trigger: TriggerHandle,
    emit_trigger: TriggerHandle,
    tasks: Vec<JoinHandle<()>>,
    writer: SinkWriter,
    snapshot: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl Pipeline {
    /// Start the pipeline. Must be called inside a Tokio runtime.
    ///
    /// Triggers start before the coordinators register, so the first ticks
    /// may find no receiver; those signals are dropped.
    pub fn start<R, S>(settings: &Settings, reader: R, sink: S) -> Result<Self, NodeError>
    where
        R: ChannelReader + 'static,
        S: Sink + 'static,
    {
        settings.validate()?;

        let ring = Arc::new(
            RingBuffer::new(settings.buffer.capacity).with_lock_timeout(settings.lock_timeout()),
        );
        let stats = Arc::new(PipelineStats::new());
        let notifier = Arc::new(TaskNotifier::new());
        let events = Arc::new(EventQueue::new(settings.emission.event_capacity)?);

        let isr_notifier = Arc::clone(&notifier);
        let sample_trigger = PeriodicTrigger::new("sample", settings.sample_period()).start(
            move || {
                isr_notifier.notify_from_isr();
            },
        )?;

        let isr_events = Arc::clone(&events);
        let emit_trigger = PeriodicTrigger::new("emit", settings.emit_period()).start(move || {
            isr_events.send_from_isr(Event::EmitReady);
        })?;

        let log = settings
            .snapshot
            .path
            .as_ref()
            .map(|_| Arc::new(EmittedLog::new(settings.snapshot.rows)));

        let (batches, writer) = SinkWriter::spawn(
            sink,
            settings.emission.pending_batches,
            log.clone(),
            Arc::clone(&stats),
        )?;

        let sampler = SamplingCoordinator::new(
            notifier.register()?,
            reader,
            settings.sampling.channels.clone(),
            Arc::clone(&ring),
            Arc::clone(&stats),
        );

        let emitter = EmissionCoordinator::new(
            events.register()?,
            Arc::clone(&ring),
            batches,
            settings.emission.batch_size,
            Arc::clone(&stats),
        );

        let snapshot = match (&settings.snapshot.path, &log) {
            (Some(path), Some(emitted)) => {
                let snapshot_writer = SnapshotWriter::new(
                    path,
                    Arc::clone(emitted),
                    Duration::from_millis(settings.snapshot.period_ms),
                );
                let (stop_tx, stop_rx) = oneshot::channel();
                Some((stop_tx, tokio::spawn(snapshot_writer.run(stop_rx))))
            }
            _ => None,
        };

        let tasks = vec![tokio::spawn(sampler.run()), tokio::spawn(emitter.run())];

        info!(
            "Pipeline started: {} channels, capacity={}, batch={}, sample every {:?}, emit every {:?}",
            settings.sampling.channels.len(),
            settings.buffer.capacity,
            settings.emission.batch_size,
            settings.sample_period(),
            settings.emit_period()
        );

        Ok(Self {
            ring,
            stats,
            signals: SignalCounters { notifier, events },
            log,
            sample_trigger,
            emit_trigger,
            tasks,
            writer,
            snapshot,
        })
    }

    /// Start with the simulated reader, reporting channels that fail to attach
    pub fn start_simulated<S>(settings: &Settings, mut sink: S) -> Result<Self, NodeError>
    where
        S: Sink + 'static,
    {
        let mut reader = SimulatedReader::new(settings.sampling.sample_bits)?;
        for &address in &settings.sampling.offline_bus_addresses {
            reader = reader.with_offline(address);
        }

        let failures = reader.attach_all(&settings.sampling.channels);
        report_init_failures(&mut sink, &failures);

        Self::start(settings, reader, sink)
    }

    /// Shared ring buffer
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    /// Live counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Emitted-row log, when snapshots are enabled
    pub fn emitted_log(&self) -> Option<&Arc<EmittedLog>> {
        self.log.as_ref()
    }

    /// Trigger drop counters, still readable after shutdown
    pub fn signal_counters(&self) -> SignalCounters {
        self.signals.clone()
    }

    /// Trigger signals dropped so far
    pub fn signals_dropped(&self) -> u64 {
        self.signals.dropped()
    }

    /// Stop triggers, then the tasks and the sink writer, and collect final
    /// counters. The snapshot file holds the final window on return.
    pub async fn shutdown(self) -> ShutdownReport {
        let sample_ticks = self.sample_trigger.stop();
        let emit_ticks = self.emit_trigger.stop();
        // Triggers are joined, so no further signal can be dropped
        let signals_dropped = self.signals.dropped();

        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // Aborted tasks report cancellation, which is expected here
            let _ = task.await;
        }

        // The emitter held the last batch sender; the writer drains and exits
        let writer = self.writer;
        match tokio::task::spawn_blocking(move || writer.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Sink writer: {}", e),
            Err(e) => warn!("Sink writer join failed: {}", e),
        }

        if let Some((stop, handle)) = self.snapshot {
            let _ = stop.send(());
            if let Err(e) = handle.await {
                warn!("Snapshot writer failed: {}", e);
            }
        }

        counter!("daq_signals_dropped_total").absolute(signals_dropped);

        let report = ShutdownReport {
            stats: self.stats.snapshot(),
            sample_ticks,
            emit_ticks,
            signals_dropped,
            rows_evicted: self.ring.total_evicted(),
            contention_timeouts: self.ring.contention_timeouts(),
        };
        info!("Pipeline stopped: {:?}", report);
        report
    }
}

/// Report boot-time failures through the sink, once each
pub fn report_init_failures<S: Sink, E: Display>(sink: &mut S, failures: &[E]) {
    for failure in failures {
        warn!("Initialization failure: {}", failure);
        if let Err(e) = sink.diagnostic(&format!("init failed: {}", failure)) {
            warn!("Could not report initialization failure: {}", e);
        }
    }
}

/// Open the configured output. A serial port that cannot be opened falls
/// back to stdout with a diagnostic line.
pub fn open_sink(settings: &Settings) -> Box<dyn Sink> {
    let device = match (settings.output.kind, &settings.output.device) {
        (OutputKind::Serial, Some(device)) => device,
        _ => return Box::new(LineSink::new(std::io::stdout())),
    };

    match open_serial(device, settings.output.baud_rate) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            let mut fallback: Box<dyn Sink> = Box::new(LineSink::new(std::io::stdout()));
            report_init_failures(&mut fallback, &[e]);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_reader::ChannelId;
    use ring_buffer::Row;
    use sink::{MemorySink, NO_DATA};

    fn fast_settings() -> Settings {
        let mut settings = Settings::default();
        settings.sampling.period_ms = 2;
        settings.emission.period_ms = 4;
        settings.buffer.capacity = 16;
        settings
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_emits_rows() {
        let sink = MemorySink::new();
        let pipeline = Pipeline::start_simulated(&fast_settings(), sink.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let report = pipeline.shutdown().await;

        assert!(report.sample_ticks > 0);
        assert!(report.emit_ticks > 0);
        assert!(report.stats.samples_pushed > 0);
        assert!(report.stats.rows_emitted > 0);
        // Every queued emission cycle hands exactly `batch_size` lines to the sink
        assert_eq!(
            report.stats.rows_emitted + report.stats.sentinels_emitted,
            (report.stats.emit_cycles - report.stats.batches_dropped) * 2
        );
        assert_eq!(
            sink.lines().len() as u64,
            report.stats.rows_emitted + report.stats.sentinels_emitted
        );

        let lines = sink.lines();
        assert!(lines.iter().any(|l| l != NO_DATA));
        for line in lines.iter().filter(|l| l.as_str() != NO_DATA) {
            assert_eq!(line.split(',').count(), 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_emission_without_samples_emits_sentinels() {
        let mut settings = fast_settings();
        // Sampling effectively never fires
        settings.sampling.period_ms = 60_000;
        let sink = MemorySink::new();
        let pipeline = Pipeline::start_simulated(&settings, sink.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = pipeline.shutdown().await;

        assert_eq!(report.stats.rows_emitted, 0);
        assert!(report.stats.sentinels_emitted >= 2);
        assert!(sink.lines().iter().all(|l| l == NO_DATA));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_init_failure_reported_and_degraded() {
        let mut settings = fast_settings();
        settings.sampling.channels = vec![ChannelId::Adc { pin: 34 }, ChannelId::Bus { address: 0x48 }];
        settings.sampling.offline_bus_addresses = vec![0x48];
        let sink = MemorySink::new();

        let pipeline = Pipeline::start_simulated(&settings, sink.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        pipeline.shutdown().await;

        let lines = sink.lines();
        assert!(lines[0].starts_with("# init failed"));
        assert_eq!(lines.iter().filter(|l| l.starts_with('#')).count(), 1);
        for line in lines.iter().skip(1).filter(|l| l.as_str() != NO_DATA) {
            assert!(line.ends_with(",-1"), "unexpected line {}", line);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_snapshot_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_log.dat");
        let mut settings = fast_settings();
        settings.snapshot.path = Some(path.clone());
        settings.snapshot.period_ms = 10;

        let reader = |channels: &[ChannelId]| -> Row { channels.iter().map(|_| 7).collect() };
        let pipeline = Pipeline::start(&settings, reader, MemorySink::new()).unwrap();
        let log = Arc::clone(pipeline.emitted_log().unwrap());
        tokio::time::sleep(Duration::from_millis(150)).await;
        pipeline.shutdown().await;

        // The final window is on disk once shutdown returns
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!log.is_empty());
        assert_eq!(content.lines().count(), log.len());
        assert!(content.lines().all(|l| l == "7 7"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_signals_dropped_counted_after_triggers_stop() {
        let mut settings = fast_settings();
        // A one-slot event queue overflows whenever the emitter lags a tick
        settings.emission.period_ms = 1;
        settings.emission.event_capacity = 1;
        let pipeline = Pipeline::start_simulated(&settings, MemorySink::new()).unwrap();
        let counters = pipeline.signal_counters();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = pipeline.shutdown().await;

        // Nothing can drop once the triggers are joined, so the report is final
        assert_eq!(report.signals_dropped, counters.dropped());
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.buffer.capacity = 0;
        assert!(matches!(
            Pipeline::start_simulated(&settings, MemorySink::new()),
            Err(NodeError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_stdout_sink_by_default() {
        let mut sink = open_sink(&Settings::default());
        assert!(sink.emit_no_data().is_ok());
    }
}
