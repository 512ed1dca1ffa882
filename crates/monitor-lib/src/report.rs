//! Report loop
//!
//! Drives the pipeline: tick → collect due node samples → VM discovery →
//! assemble → publish → sleep → advance beat. One logical task, strictly
//! sequential; the only cancellation point is the sleep between ticks.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::collector::{ProcessSource, VmDiscovery};
use crate::error::AgentError;
use crate::publish::{Publisher, Transport};
use crate::registry::CollectorRegistry;
use crate::scheduler::BeatScheduler;
use crate::wire::BatchAssembler;

/// The top-level run loop and error boundary.
///
/// Any publish failure is fatal for the run: the loop breaks out,
/// disconnects and propagates the error. Restart policy belongs to the
/// process supervisor.
pub struct ReportLoop<T: Transport, S: ProcessSource> {
    registry: CollectorRegistry,
    scheduler: BeatScheduler,
    discovery: VmDiscovery<S>,
    assembler: BatchAssembler,
    publisher: Publisher<T>,
    quantum: Duration,
}

impl<T: Transport, S: ProcessSource> ReportLoop<T, S> {
    pub fn new(
        registry: CollectorRegistry,
        discovery: VmDiscovery<S>,
        assembler: BatchAssembler,
        publisher: Publisher<T>,
        quantum: Duration,
    ) -> Result<Self, AgentError> {
        let scheduler = BeatScheduler::new(&registry.cadences())?;
        Ok(Self {
            registry,
            scheduler,
            discovery,
            assembler,
            publisher,
            quantum,
        })
    }

    /// Connect, report until interrupted or a publish fails, disconnect.
    ///
    /// The disconnect runs on every exit path, normal or error-triggered.
    pub async fn run(mut self, shutdown: broadcast::Receiver<()>) -> Result<(), AgentError> {
        if let Err(e) = self.publisher.connect().await {
            self.publisher.disconnect().await;
            return Err(e);
        }

        info!(
            collectors = self.registry.len(),
            cycle = self.scheduler.cycle(),
            quantum_secs = self.quantum.as_secs(),
            agent = %self.assembler.prefix(),
            "Reporting started"
        );

        let result = self.drive(shutdown).await;
        self.publisher.disconnect().await;
        result
    }

    async fn drive(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), AgentError> {
        loop {
            let beat = self.scheduler.beat();
            if let Err(e) = self.tick(beat).await {
                warn!(beat, error = %e, "Publish failed, stopping the run");
                return Err(e);
            }

            // Fixed quantum, deliberately not compensated for collection
            // time: cadence correctness rides on the beat count, not on
            // wall-clock phase. Effective period = processing time + sleep.
            tokio::select! {
                _ = tokio::time::sleep(self.quantum) => {}
                _ = shutdown.recv() => {
                    info!("Interrupt received, stopping the reporter");
                    return Ok(());
                }
            }

            self.scheduler.advance();
        }
    }

    /// One tick: collect, assemble, publish. An empty batch is valid and
    /// skipped silently; no publish call is made.
    async fn tick(&mut self, beat: u64) -> Result<(), AgentError> {
        let mut samples = self.registry.collect_due(beat);
        samples.extend(self.discovery.collect(Utc::now().timestamp()));

        let lines = self.assembler.render(&samples);
        if lines.is_empty() {
            debug!(beat, "Nothing due this beat");
            return Ok(());
        }

        self.publisher.publish(&lines).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{InterfaceCounters, ProcessRecord, ProcessStats};
    use crate::models::MetricSample;
    use crate::registry::SampleFn;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct EmptySource;

    impl ProcessSource for EmptySource {
        fn processes(&mut self) -> Vec<ProcessRecord> {
            Vec::new()
        }

        fn stats(&mut self, pid: u32) -> Result<ProcessStats, AgentError> {
            Err(AgentError::ProcessNotFound(pid))
        }

        fn interfaces(&mut self) -> Vec<(String, InterfaceCounters)> {
            Vec::new()
        }
    }

    struct RecordingTransport {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn open(&mut self) -> Result<(), AgentError> {
            Ok(())
        }

        async fn send(&mut self, body: &str) -> Result<(), AgentError> {
            self.sent.lock().unwrap().push(body.to_string());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    fn constant(name: &'static str) -> SampleFn {
        Box::new(move || MetricSample::new(name, 1.0, 0))
    }

    fn report_loop(
        registry: CollectorRegistry,
    ) -> (ReportLoop<RecordingTransport, EmptySource>, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport { sent: sent.clone() };
        let report = ReportLoop::new(
            registry,
            VmDiscovery::new(EmptySource),
            BatchAssembler::new("agent"),
            Publisher::new(transport, 100),
            Duration::from_secs(1),
        )
        .unwrap();
        (report, sent)
    }

    #[tokio::test]
    async fn test_cadence_multiplexing_over_five_beats() {
        let mut registry = CollectorRegistry::new();
        registry.register("cpu.usage", constant("cpu.usage"), 1).unwrap();
        registry.register("memory.usage", constant("memory.usage"), 5).unwrap();

        let (mut report, sent) = report_loop(registry);
        report.publisher.connect().await.unwrap();

        for _ in 1..=5 {
            let beat = report.scheduler.beat();
            report.tick(beat).await.unwrap();
            report.scheduler.advance();
        }

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 5);

        let all_lines: Vec<&str> = sent.iter().flat_map(|b| b.lines()).collect();
        let cpu = all_lines.iter().filter(|l| l.contains("cpu.usage")).count();
        let memory = all_lines.iter().filter(|l| l.contains("memory.usage")).count();
        assert_eq!(cpu, 5);
        assert_eq!(memory, 1);

        // Beat 3: cpu only.
        assert_eq!(sent[2].lines().count(), 1);
        assert!(sent[2].contains("cpu.usage"));
    }

    #[tokio::test]
    async fn test_empty_tick_makes_no_publish_call() {
        let mut registry = CollectorRegistry::new();
        registry.register("memory.usage", constant("memory.usage"), 5).unwrap();

        let (mut report, sent) = report_loop(registry);
        report.publisher.connect().await.unwrap();

        // Beat 3: nothing due, no VMs discovered.
        report.tick(3).await.unwrap();
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_disconnects_on_shutdown_signal() {
        let mut registry = CollectorRegistry::new();
        registry.register("cpu.usage", constant("cpu.usage"), 1).unwrap();

        let (report, sent) = report_loop(registry);
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        report.run(rx).await.unwrap();

        // The first tick ran before the shutdown was observed at the sleep
        // boundary.
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_surfaces_connect_failure() {
        struct RefusingTransport;

        #[async_trait]
        impl Transport for RefusingTransport {
            async fn open(&mut self) -> Result<(), AgentError> {
                Err(AgentError::Connect("connection refused".into()))
            }

            async fn send(&mut self, _body: &str) -> Result<(), AgentError> {
                unreachable!("send must not be reached when connect fails")
            }

            async fn close(&mut self) -> Result<(), AgentError> {
                Ok(())
            }
        }

        let report = ReportLoop::new(
            CollectorRegistry::new(),
            VmDiscovery::new(EmptySource),
            BatchAssembler::new("agent"),
            Publisher::new(RefusingTransport, 100),
            Duration::from_millis(1),
        )
        .unwrap();

        let (_tx, rx) = broadcast::channel(1);
        let result = report.run(rx).await;
        assert!(matches!(result, Err(AgentError::Connect(_))));
    }

    #[tokio::test]
    async fn test_publish_failure_stops_the_run() {
        struct FailingTransport;

        #[async_trait]
        impl Transport for FailingTransport {
            async fn open(&mut self) -> Result<(), AgentError> {
                Ok(())
            }

            async fn send(&mut self, _body: &str) -> Result<(), AgentError> {
                Err(AgentError::Publish("broker went away".into()))
            }

            async fn close(&mut self) -> Result<(), AgentError> {
                Ok(())
            }
        }

        let mut registry = CollectorRegistry::new();
        registry.register("cpu.usage", constant("cpu.usage"), 1).unwrap();

        let report = ReportLoop::new(
            registry,
            VmDiscovery::new(EmptySource),
            BatchAssembler::new("agent"),
            Publisher::new(FailingTransport, 100),
            Duration::from_secs(3600),
        )
        .unwrap();

        let (_tx, rx) = broadcast::channel(1);
        // The long quantum is never reached: the first tick's publish fails
        // and the run returns instead of sleeping.
        let result = report.run(rx).await;
        assert!(matches!(result, Err(AgentError::Publish(_))));
    }
}
