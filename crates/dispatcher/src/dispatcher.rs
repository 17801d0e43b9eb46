//! Dispatcher - main loop for fan-out to sinks

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{Bulletin, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkStats;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<Bulletin>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<Bulletin>) -> Self {
        Self { config, input_rx }
    }

    /// Open every sink and start its worker
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            handles.push(create_sink_handle(sink_config).await?);
        }
        Ok(handles)
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Fans bulletins out to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<Bulletin>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<Bulletin>) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Counters for all sinks
    pub fn stats(&self) -> Vec<(String, SinkStats)> {
        Self::collect_stats(&self.handles)
    }

    /// Run until the input channel closes
    ///
    /// Every sink drains its queue before this returns. The final counters
    /// are returned for reporting.
    #[instrument(name = "dispatcher_run", skip(self), fields(sinks = self.handles.len()))]
    pub async fn run(mut self) -> Vec<(String, SinkStats)> {
        info!(sinks = self.handles.len(), "dispatcher started");

        let mut bulletin_count: u64 = 0;

        while let Some(bulletin) = self.input_rx.recv().await {
            bulletin_count += 1;
            self.dispatch(&bulletin);

            if bulletin_count.is_multiple_of(100) {
                debug!(bulletins = bulletin_count, "dispatcher progress");
            }
        }

        info!(bulletins = bulletin_count, "dispatcher input closed, shutting down");

        let metrics: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().clone()))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }

        info!("dispatcher shutdown complete");
        metrics
            .into_iter()
            .map(|(name, m)| (name, m.snapshot()))
            .collect()
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<Vec<(String, SinkStats)>> {
        tokio::spawn(self.run())
    }

    fn dispatch(&self, bulletin: &Bulletin) {
        for handle in &self.handles {
            handle.try_send(bulletin.clone());
        }
    }

    fn collect_stats(handles: &[SinkHandle]) -> Vec<(String, SinkStats)> {
        handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<Bulletin>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BulletinBody, LifecycleSignal};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lifecycle(seq: u64) -> Bulletin {
        Bulletin::new(seq, BulletinBody::Lifecycle(LifecycleSignal::ShowVideo))
    }

    #[tokio::test]
    async fn test_dispatcher_fanout() {
        let (input_tx, input_rx) = mpsc::channel(10);

        let handles = vec![
            SinkHandle::spawn(LogSink::new("sink1"), 10),
            SinkHandle::spawn(LogSink::new("sink2"), 10),
        ];
        let handle = Dispatcher::with_handles(handles, input_rx).spawn();

        for seq in 1..=5 {
            input_tx.send(lifecycle(seq)).await.unwrap();
        }
        drop(input_tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.len(), 2);
        for (_, s) in stats {
            assert_eq!(s.delivered, 5);
            assert_eq!(s.last_seq, 5);
        }
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let (input_tx, input_rx) = mpsc::channel(10);

        let configs = vec![
            SinkConfig {
                name: "console".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 50,
                params: HashMap::new(),
            },
            SinkConfig {
                name: "archive".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 50,
                params: HashMap::from([("path".to_string(), path.display().to_string())]),
            },
        ];

        let dispatcher = create_dispatcher(configs, input_rx).await.unwrap();
        assert_eq!(dispatcher.sink_count(), 2);
        let handle = dispatcher.spawn();

        input_tx.send(lifecycle(1)).await.unwrap();
        drop(input_tx);
        handle.await.unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_bad_network_params_fail_build() {
        let (_tx, input_rx) = mpsc::channel(1);
        let configs = vec![SinkConfig {
            name: "net".to_string(),
            sink_type: SinkType::Network,
            queue_capacity: 10,
            params: HashMap::new(),
        }];

        let result = create_dispatcher(configs, input_rx).await;
        assert!(matches!(result, Err(DispatcherError::SinkCreation { .. })));
    }
}
