//! SinkHandle - one sink behind its own bounded queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{Bulletin, BulletinSink};
use observability::metrics as race_metrics;

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Bulletin>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker for `sink`
    pub fn spawn<S: BulletinSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a bulletin without waiting
    ///
    /// Returns false when the queue is full (bulletin dropped) or the worker
    /// is gone.
    pub fn try_send(&self, bulletin: Bulletin) -> bool {
        match self.tx.try_send(bulletin) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(b)) => {
                self.metrics.record_dropped();
                race_metrics::record_bulletin_dispatched(&self.name, false);
                warn!(
                    sink = %self.name,
                    seq = b.seq,
                    kind = b.kind(),
                    "queue full, bulletin dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Deliver what is queued, then close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "worker task panicked");
        }
        debug!(sink = %self.name, "sink handle shutdown complete");
    }
}

#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: BulletinSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Bulletin>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "sink worker started");

    while let Some(bulletin) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&bulletin).await {
            Ok(()) => {
                metrics.record_delivered(bulletin.seq);
                race_metrics::record_bulletin_dispatched(&name, true);
            }
            Err(e) => {
                metrics.record_failed();
                race_metrics::record_bulletin_dispatched(&name, false);
                error!(
                    sink = %name,
                    seq = bulletin.seq,
                    kind = bulletin.kind(),
                    error = %e,
                    "write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close failed on shutdown");
    }

    debug!(sink = %name, "sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BulletinBody, ContractError, LifecycleSignal};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    struct MockSink {
        name: String,
        writes: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str, writes: Arc<AtomicU64>) -> Self {
            Self {
                name: name.to_string(),
                writes,
                should_fail: false,
                delay_ms: 0,
            }
        }
    }

    impl BulletinSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _bulletin: &Bulletin) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn bulletin(seq: u64) -> Bulletin {
        Bulletin::new(seq, BulletinBody::Lifecycle(LifecycleSignal::ShowVideo))
    }

    #[tokio::test]
    async fn test_sink_handle_delivers_in_order() {
        let writes = Arc::new(AtomicU64::new(0));
        let handle = SinkHandle::spawn(MockSink::new("test", writes.clone()), 10);

        for seq in 1..=5 {
            assert!(handle.try_send(bulletin(seq)));
        }

        let metrics = handle.metrics().clone();
        handle.shutdown().await;
        assert_eq!(writes.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.last_seq(), 5);
    }

    #[tokio::test]
    async fn test_slow_sink_drops_instead_of_blocking() {
        let writes = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            delay_ms: 100,
            ..MockSink::new("slow", writes.clone())
        };
        let handle = SinkHandle::spawn(sink, 2);

        let accepted = (1..=10).filter(|&seq| handle.try_send(bulletin(seq))).count();

        assert!(accepted < 10);
        assert_eq!(handle.metrics().dropped(), 10 - accepted as u64);

        handle.shutdown().await;
        assert_eq!(writes.load(Ordering::Relaxed), accepted as u64);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let sink = MockSink {
            should_fail: true,
            ..MockSink::new("failing", Arc::new(AtomicU64::new(0)))
        };
        let handle = SinkHandle::spawn(sink, 10);

        for seq in 1..=3 {
            handle.try_send(bulletin(seq));
        }

        let metrics = handle.metrics().clone();
        handle.shutdown().await;
        assert_eq!(metrics.failed(), 3);
        assert_eq!(metrics.delivered(), 0);
    }
}
