//! Ingestion Pipeline main entry

use std::collections::BTreeMap;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{SensorEvent, SensorSource};
use observability::metrics;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{BackpressureConfig, IngestionMetrics};

/// Ingestion Pipeline
///
/// Merges every registered sensor source into one bounded channel. Sources
/// only hold a sender while they run, so the receiver closes once all of
/// them have finished.
pub struct IngestionPipeline {
    /// Registered sources
    sources: BTreeMap<String, Box<dyn SensorSource>>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Handed out to sources on start
    tx: Option<Sender<SensorEvent>>,

    rx: Option<Receiver<SensorEvent>>,
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_config(BackpressureConfig::new(channel_capacity))
    }

    /// Create with custom backpressure configuration
    pub fn with_config(config: BackpressureConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity);
        Self {
            sources: BTreeMap::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx: Some(tx),
            rx: Some(rx),
        }
    }

    /// Register a sensor source under its own id
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source),
        fields(source_id = %source.source_id())
    )]
    pub fn register_source(&mut self, source: Box<dyn SensorSource>) {
        let source_id = source.source_id().to_string();
        debug!(source_id = %source_id, "registered sensor source");
        self.sources.insert(source_id, source);
    }

    /// Start every registered source
    ///
    /// Sources registered afterwards are never started.
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&mut self) {
        let Some(tx) = self.tx.take() else {
            warn!("ingestion pipeline already started");
            return;
        };

        info!(count = self.sources.len(), "starting all sensor sources");
        for (source_id, source) in &self.sources {
            if source.is_listening() {
                continue;
            }
            let tx = tx.clone();
            let metrics = self.metrics.clone();
            let id: Arc<str> = Arc::from(source_id.as_str());
            source.listen(Arc::new(move |event| forward(&tx, &metrics, &id, event)));
        }
    }

    /// Stop all sources
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        for (source_id, source) in &self.sources {
            if source.is_listening() {
                debug!(source_id = %source_id, "stopping source");
                source.stop();
            }
        }
    }

    /// Merged event stream
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<SensorEvent>> {
        self.rx.take()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Whether any source is still producing
    pub fn any_listening(&self) -> bool {
        self.sources.values().any(|s| s.is_listening())
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn forward(
    tx: &Sender<SensorEvent>,
    ingestion: &IngestionMetrics,
    source_id: &str,
    event: SensorEvent,
) {
    ingestion.record_received();
    metrics::record_sensor_event(source_id, event.kind());

    match tx.try_send(event) {
        Ok(()) => {
            ingestion.update_queue_len(tx.len());
            trace!(source_id, kind = event.kind(), "sensor event queued");
        }
        Err(TrySendError::Full(dropped)) => {
            ingestion.record_dropped();
            warn!(source_id, kind = dropped.kind(), "sensor channel full, event dropped");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(source_id, "sensor channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplaySource;
    use contracts::TimedSensorEvent;

    fn replay(name: &str, events: Vec<SensorEvent>) -> Box<dyn SensorSource> {
        let timed = events
            .into_iter()
            .enumerate()
            .map(|(i, event)| TimedSensorEvent {
                at_ms: i as u64 * 10,
                event,
            })
            .collect();
        Box::new(ReplaySource::from_events(name, timed, 1.0, false))
    }

    #[test]
    fn test_take_receiver_once() {
        let mut pipeline = IngestionPipeline::new(16);
        assert_eq!(pipeline.source_count(), 0);
        assert!(pipeline.take_receiver().is_some());
        assert!(pipeline.take_receiver().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_merges_sources_and_closes() {
        let mut pipeline = IngestionPipeline::new(16);
        pipeline.register_source(replay("a.jsonl", vec![SensorEvent::GateUp, SensorEvent::GateDown]));
        pipeline.register_source(replay(
            "b.jsonl",
            vec![SensorEvent::SensorHealth {
                lane: 1,
                healthy: false,
            }],
        ));
        let rx = pipeline.take_receiver().unwrap();
        pipeline.start_all();

        let mut received = Vec::new();
        while let Ok(event) = rx.recv().await {
            received.push(event);
        }

        assert_eq!(received.len(), 3);
        assert_eq!(pipeline.metrics().snapshot().events_received, 3);
        assert!(!pipeline.any_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_channel_drops_newest() {
        let mut pipeline = IngestionPipeline::new(1);
        pipeline.register_source(replay(
            "burst.jsonl",
            vec![SensorEvent::GateUp, SensorEvent::GateDown, SensorEvent::GateUp],
        ));
        let rx = pipeline.take_receiver().unwrap();
        pipeline.start_all();

        // let the replay run to completion before draining
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(rx.recv().await.unwrap(), SensorEvent::GateUp);
        assert!(rx.recv().await.is_err());

        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.events_received, 3);
        assert_eq!(snapshot.events_dropped, 2);
    }
}
