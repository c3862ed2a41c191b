use actix::Addr;
use log::{error, info};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task;

use crate::app::hub::BroadcastHub;
use crate::classifier::Classifier;
use crate::pipeline::capture::{capture_loop, flush_worker};
use crate::pipeline::source::SourceFactory;

/// Pause between stop and start during a restart, gives the datalink
/// channel time to actually close before it is reopened.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Outcome of a lifecycle operation. Lifecycle no-ops (starting a running
/// capture, stopping an idle one) are results, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureControl {
    Started,
    AlreadyRunning,
    Stopped,
    NotRunning,
    Error(String),
}

struct CaptureHandle {
    run_flag: watch::Sender<bool>,
    capture_thread: thread::JoinHandle<()>,
    worker: task::JoinHandle<()>,
}

/// Owns the capture pipeline's lifecycle: one blocking capture thread,
/// one async flush worker, one shared run flag. Constructed once at
/// startup and handed around by reference, there is no global state.
pub struct CaptureSupervisor<F: SourceFactory> {
    source_factory: F,
    classifier: Arc<Classifier>,
    hub: Addr<BroadcastHub>,
    batch_interval: Duration,
    queue_capacity: usize,
    handle: Mutex<Option<CaptureHandle>>,
}

impl<F: SourceFactory> CaptureSupervisor<F> {
    pub fn new(
        source_factory: F,
        classifier: Arc<Classifier>,
        hub: Addr<BroadcastHub>,
        batch_interval: Duration,
        queue_capacity: usize,
    ) -> Self {
        Self {
            source_factory,
            classifier,
            hub,
            batch_interval,
            queue_capacity,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the capture pipeline unless it is already live. A handle
    /// whose thread died on its own (e.g. the wire went away) is reaped
    /// first, so start doubles as recovery.
    pub async fn start(&self) -> CaptureControl {
        let mut guard = self.handle.lock().await;

        if let Some(handle) = guard.as_ref() {
            if !handle.capture_thread.is_finished() {
                return CaptureControl::AlreadyRunning;
            }
        }

        if let Some(stale) = guard.take() {
            info!("reaping a capture pipeline that exited on its own");
            reap(stale).await;
        }

        let source = match self.source_factory.open() {
            Ok(source) => source,
            Err(e) => {
                error!("failed to open capture source: {:?}", e);
                return CaptureControl::Error(format!("failed to open capture source: {:?}", e));
            }
        };

        let (flag_tx, flag_rx) = watch::channel(true);
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let worker = tokio::spawn(flush_worker(
            rx,
            flag_rx.clone(),
            self.classifier.clone(),
            self.hub.clone(),
        ));

        let batch_interval = self.batch_interval;
        let capture_thread = match thread::Builder::new()
            .name("capture".to_owned())
            .spawn(move || capture_loop(source, flag_rx, tx, batch_interval))
        {
            Ok(handle) => handle,
            Err(e) => {
                worker.abort();
                error!("failed to spawn capture thread: {}", e);
                return CaptureControl::Error(format!("failed to spawn capture thread: {}", e));
            }
        };

        *guard = Some(CaptureHandle {
            run_flag: flag_tx,
            capture_thread,
            worker,
        });

        info!("capture pipeline started");
        CaptureControl::Started
    }

    /// Cooperative stop: clear the run flag, join the capture thread,
    /// await the worker. Reports whether anything was actually stopped.
    pub async fn stop(&self) -> CaptureControl {
        let mut guard = self.handle.lock().await;

        let handle = match guard.take() {
            Some(handle) => handle,
            None => return CaptureControl::NotRunning,
        };

        let was_live = !handle.capture_thread.is_finished();

        let CaptureHandle {
            run_flag,
            capture_thread,
            worker,
        } = handle;

        if run_flag.send(false).is_err() {
            // both receivers gone means the pipeline is already down
            info!("capture pipeline had no live run flag receivers");
        }

        match task::spawn_blocking(move || capture_thread.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                error!("capture thread panicked during shutdown");
                return CaptureControl::Error("capture thread panicked".to_owned());
            }
            Err(e) => {
                error!("failed to join capture thread: {}", e);
                return CaptureControl::Error(format!("failed to join capture thread: {}", e));
            }
        }

        if let Err(e) = worker.await {
            if !e.is_cancelled() {
                error!("flush worker failed during shutdown: {}", e);
                return CaptureControl::Error(format!("flush worker failed: {}", e));
            }
        }

        info!("capture pipeline stopped");
        if was_live {
            CaptureControl::Stopped
        } else {
            CaptureControl::NotRunning
        }
    }

    /// Stop, settle, start. Not atomic: a failure in either half is
    /// returned as-is rather than masked.
    pub async fn restart(&self) -> CaptureControl {
        match self.stop().await {
            CaptureControl::Stopped | CaptureControl::NotRunning => {}
            other => return other,
        }

        tokio::time::sleep(SETTLE_DELAY).await;
        self.start().await
    }
}

async fn reap(stale: CaptureHandle) {
    let CaptureHandle {
        run_flag,
        capture_thread,
        worker,
    } = stale;

    let _ = run_flag.send(false);
    if let Ok(Err(_)) = task::spawn_blocking(move || capture_thread.join()).await {
        error!("stale capture thread had panicked");
    }
    worker.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ModelArtifact, FEATURE_COUNT};
    use crate::pipeline::source::{CaptureError, PacketSource};
    use actix::Actor;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that captures nothing, it only lets the loop poll its flag.
    struct IdleSource;

    impl PacketSource for IdleSource {
        fn recv(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
            thread::sleep(Duration::from_millis(2));
            Ok(None)
        }
    }

    struct CountingFactory {
        opens: Arc<AtomicUsize>,
    }

    impl SourceFactory for CountingFactory {
        fn open(&self) -> Result<Box<dyn PacketSource>, CaptureError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(IdleSource))
        }
    }

    struct FailingFactory;

    impl SourceFactory for FailingFactory {
        fn open(&self) -> Result<Box<dyn PacketSource>, CaptureError> {
            Err(CaptureError::NoSuchInterface("eth-nope".to_owned()))
        }
    }

    fn classifier() -> Arc<Classifier> {
        Arc::new(
            Classifier::new(ModelArtifact {
                labels: vec!["BENIGN".to_owned()],
                centroids: vec![[0.0; FEATURE_COUNT]],
                feature_means: [0.0; FEATURE_COUNT],
                feature_stds: [1.0; FEATURE_COUNT],
            })
            .unwrap(),
        )
    }

    fn supervisor<F: SourceFactory>(factory: F) -> CaptureSupervisor<F> {
        CaptureSupervisor::new(
            factory,
            classifier(),
            BroadcastHub::default().start(),
            Duration::from_secs(10),
            16,
        )
    }

    #[actix_rt::test]
    async fn stop_on_idle_supervisor_is_not_running() {
        let supervisor = supervisor(CountingFactory {
            opens: Arc::new(AtomicUsize::new(0)),
        });

        assert_eq!(supervisor.stop().await, CaptureControl::NotRunning);
    }

    #[actix_rt::test]
    async fn second_start_is_already_running_and_spawns_nothing() {
        let opens = Arc::new(AtomicUsize::new(0));
        let supervisor = supervisor(CountingFactory {
            opens: opens.clone(),
        });

        assert_eq!(supervisor.start().await, CaptureControl::Started);
        assert_eq!(supervisor.start().await, CaptureControl::AlreadyRunning);
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        assert_eq!(supervisor.stop().await, CaptureControl::Stopped);
    }

    #[actix_rt::test]
    async fn start_stop_roundtrip() {
        let supervisor = supervisor(CountingFactory {
            opens: Arc::new(AtomicUsize::new(0)),
        });

        assert_eq!(supervisor.start().await, CaptureControl::Started);
        assert_eq!(supervisor.stop().await, CaptureControl::Stopped);
        assert_eq!(supervisor.stop().await, CaptureControl::NotRunning);
    }

    #[actix_rt::test]
    async fn failed_source_surfaces_as_error() {
        let supervisor = supervisor(FailingFactory);

        match supervisor.start().await {
            CaptureControl::Error(message) => {
                assert!(message.contains("failed to open capture source"))
            }
            other => panic!("expected an error outcome, got {:?}", other),
        }

        // the failed start left nothing behind
        assert_eq!(supervisor.stop().await, CaptureControl::NotRunning);
    }

    #[actix_rt::test]
    async fn restart_from_idle_starts_the_pipeline() {
        let opens = Arc::new(AtomicUsize::new(0));
        let supervisor = supervisor(CountingFactory {
            opens: opens.clone(),
        });

        assert_eq!(supervisor.restart().await, CaptureControl::Started);
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        assert_eq!(supervisor.stop().await, CaptureControl::Stopped);
    }
}
