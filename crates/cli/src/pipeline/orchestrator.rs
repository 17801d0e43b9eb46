//! Pipeline orchestrator - coordinates all components.
//!
//! sensor source -> ingestion -> race runner -> dispatcher -> sinks, with
//! the runner writing results to the configured store.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{Bulletin, RaceBlueprint, RaceStatus, SensorSource, SensorSourceKind};
use ingestion::{IngestionPipeline, MockTrack, RawTrackSource, ReplaySource};
use race_engine::{
    EngineConfig, RaceInput, RaceRunner, RaceStateMachine, RunnerConfig, SystemTimeSource,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{PipelineStats, StopReason};
use crate::commands::open_roster;
use crate::error::CliError;

/// Source id used for the simulated track
const MOCK_SOURCE_ID: &str = "mock-track";

/// Source id used for the timer board
const RAW_SOURCE_ID: &str = "track-board";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The race blueprint
    pub blueprint: RaceBlueprint,

    /// Stop after this many completed races (None = unlimited)
    pub max_races: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Recording to replay instead of the configured source
    pub replay_path: Option<PathBuf>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source ends, the race limit or timeout is hit, or
    /// `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Store and roster
        let (store, roster) = open_roster(blueprint).await?;
        let store = Arc::new(store);

        // Source first so a bad recording fails before anything is spawned
        let source = self.build_source().await?;

        // Dispatcher
        info!("Setting up dispatcher...");
        let (bulletin_tx, bulletin_rx) = mpsc::channel::<Bulletin>(self.config.buffer_size);
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - bulletins will be dropped");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), bulletin_rx)
            .await
            .context("Failed to create dispatcher")?;
        let active_sinks = dispatcher.sink_count();
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        // Race runner owns the only bulletin sender
        let machine = RaceStateMachine::new(
            EngineConfig::from_blueprint(blueprint),
            roster,
            Arc::new(SystemTimeSource::new()),
        );
        let (race, runner) = RaceRunner::spawn(
            machine,
            store,
            bulletin_tx,
            RunnerConfig {
                inbox_capacity: self.config.buffer_size,
            },
        );

        // Ingestion
        let mut ingestion = IngestionPipeline::new(self.config.buffer_size);
        ingestion.register_source(source);
        ingestion.start_all();
        let events = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;

        let max_races = self.config.max_races;
        let deadline = self.config.timeout.map(|t| start_time + t);
        let mut snapshots = race.subscribe();
        let mut events_forwarded = 0u64;
        tokio::pin!(shutdown);

        info!(max_races = ?max_races, timeout = ?self.config.timeout, "Race day running");

        let stop_reason = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping...");
                    break StopReason::Signal;
                }

                _ = deadline_reached(deadline) => {
                    warn!(timeout = ?self.config.timeout, "Run timed out");
                    break StopReason::Timeout;
                }

                changed = snapshots.changed(), if max_races.is_some() => {
                    if changed.is_err() {
                        break StopReason::RunnerStopped;
                    }
                    let completed = snapshots.borrow_and_update().races_completed;
                    if max_races.is_some_and(|max| completed >= max) {
                        info!(races = completed, "Reached race limit");
                        break StopReason::MaxRaces;
                    }
                }

                event = events.recv() => match event {
                    Ok(event) => {
                        if let Err(e) = race.send(RaceInput::Sensor(event)).await {
                            warn!(error = %e, "Race runner rejected sensor event");
                            break StopReason::RunnerStopped;
                        }
                        events_forwarded += 1;
                    }
                    Err(_) => {
                        info!("Sensor source finished");
                        break StopReason::SourceEnded;
                    }
                },
            }
        };

        // Let a race still on the track time out before stopping
        if stop_reason == StopReason::SourceEnded && race.snapshot().status == RaceStatus::Racing {
            let grace = Duration::from_millis(blueprint.timing.dnf_timeout_ms)
                + Duration::from_secs(1);
            info!(grace_ms = grace.as_millis() as u64, "Waiting for the race in progress");
            let finished = tokio::time::timeout(
                grace,
                race.wait_for(|s| s.status != RaceStatus::Racing),
            )
            .await;
            if !matches!(finished, Ok(Ok(_))) {
                warn!("Race in progress did not finish");
            }
        }

        // Shutdown
        info!(reason = %stop_reason, "Shutting down pipeline...");
        ingestion.stop_all();
        let ingestion_stats = ingestion.metrics().snapshot();
        drop(snapshots);
        drop(race);

        let report = runner
            .shutdown()
            .await
            .map_err(|e| CliError::shutdown(e.to_string()))?;

        // Runner is gone, so the dispatcher sees its input close and flushes
        let sinks = match tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await {
            Ok(Ok(sinks)) => sinks,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Dispatcher flush timed out");
                Vec::new()
            }
        };

        let stats = PipelineStats {
            stop_reason,
            races_completed: report.races_completed,
            events_forwarded,
            ingestion: ingestion_stats,
            unsaved_results: report.unsaved_results,
            bulletins_sent: report.bulletins_sent,
            bulletins_dropped: report.bulletins_dropped,
            sinks,
            summary: report.summary,
            duration: start_time.elapsed(),
        };

        info!(
            races = stats.races_completed,
            unsaved = stats.unsaved_results.len(),
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    /// Replay when a recording is given on the command line or configured,
    /// then the timer board when configured, the simulated track otherwise
    async fn build_source(&self) -> Result<Box<dyn SensorSource>> {
        let blueprint = &self.config.blueprint;
        let sensor = &blueprint.sensor;

        let replay_path = self.config.replay_path.clone().or_else(|| match sensor.source {
            SensorSourceKind::Replay => sensor.replay_path.clone(),
            SensorSourceKind::Mock | SensorSourceKind::Raw => None,
        });

        match replay_path {
            None if sensor.source == SensorSourceKind::Raw => {
                let addr = sensor.raw_bind.ok_or_else(|| {
                    CliError::source_setup("raw source requires sensor.raw_bind")
                })?;
                let source = RawTrackSource::bind_udp(RAW_SOURCE_ID, addr)
                    .await
                    .map_err(|e| CliError::source_setup(e.to_string()))?;
                info!(addr = ?source.local_addr(), "Running in RAW mode");
                Ok(Box::new(source))
            }
            Some(path) => {
                let source = ReplaySource::open(&path, sensor.replay_speed, sensor.replay_loop)
                    .await
                    .map_err(|e| CliError::source_setup(e.to_string()))?;
                info!(
                    path = %path.display(),
                    events = source.len(),
                    speed = sensor.replay_speed,
                    looping = sensor.replay_loop,
                    "Running in REPLAY mode"
                );
                Ok(Box::new(source))
            }
            None => {
                let lanes = blueprint.track.operational();
                info!(lanes = ?lanes, seed = ?sensor.mock.seed, "Running in MOCK mode");
                let mut track = MockTrack::new(MOCK_SOURCE_ID, lanes, sensor.mock.clone());
                if let Some(max) = self.config.max_races {
                    track = track.with_max_races(max);
                }
                Ok(Box::new(track))
            }
        }
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::collections::HashMap;
    use std::io::Write;

    fn blueprint(toml: &str) -> RaceBlueprint {
        config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
            .unwrap()
    }

    const TWO_LANES: &str = r#"
[track]
lanes = 2

[event]
event_id = 1
name = "Test Night"
multiplier = 1

[[cars]]
car_id = 1
name = "Comet"

[[cars]]
car_id = 2
name = "Pebble"
"#;

    #[tokio::test(start_paused = true)]
    async fn test_replay_run_saves_results() {
        let mut recording = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(recording, r#"{{"at_ms":0,"event":{{"kind":"GATE_UP"}}}}"#).unwrap();
        writeln!(recording, r#"{{"at_ms":1000,"event":{{"kind":"GATE_DOWN"}}}}"#).unwrap();
        writeln!(
            recording,
            r#"{{"at_ms":3500,"event":{{"kind":"LANE_TRIGGER","lane":0,"timestamp_micros":2500000}}}}"#
        )
        .unwrap();
        writeln!(
            recording,
            r#"{{"at_ms":3800,"event":{{"kind":"LANE_TRIGGER","lane":1,"timestamp_micros":2800000}}}}"#
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let bulletins = dir.path().join("bulletins.jsonl");
        let mut bp = blueprint(TWO_LANES);
        bp.sinks.push(SinkConfig {
            name: "file".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 64,
            params: HashMap::from([(
                "path".to_string(),
                bulletins.display().to_string(),
            )]),
        });

        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: bp,
            max_races: None,
            timeout: Some(Duration::from_secs(60)),
            buffer_size: 32,
            metrics_port: None,
            replay_path: Some(recording.path().to_path_buf()),
        });

        let stats = pipeline.run(std::future::pending()).await.unwrap();
        assert_eq!(stats.stop_reason, StopReason::SourceEnded);
        assert_eq!(stats.races_completed, 1);
        assert_eq!(stats.events_forwarded, 4);
        assert!(stats.unsaved_results.is_empty());
        assert_eq!(stats.summary.results, 2);
        assert_eq!(stats.sinks.len(), 1);
        assert!(stats.sinks[0].1.delivered > 0);

        let written = std::fs::read_to_string(&bulletins).unwrap();
        assert!(written.lines().count() as u64 >= stats.sinks[0].1.delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal_stops_mock_run() {
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(TWO_LANES),
            max_races: None,
            timeout: None,
            buffer_size: 32,
            metrics_port: None,
            replay_path: None,
        });

        let stats = pipeline
            .run(tokio::time::sleep(Duration::from_millis(500)))
            .await
            .unwrap();
        assert_eq!(stats.stop_reason, StopReason::Signal);
        assert_eq!(stats.races_completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_run() {
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(TWO_LANES),
            max_races: None,
            timeout: Some(Duration::from_millis(200)),
            buffer_size: 32,
            metrics_port: None,
            replay_path: None,
        });

        let stats = pipeline.run(std::future::pending()).await.unwrap();
        assert_eq!(stats.stop_reason, StopReason::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_raw_source_listens_until_timeout() {
        let mut bp = blueprint(TWO_LANES);
        bp.sensor.source = SensorSourceKind::Raw;
        bp.sensor.raw_bind = Some("127.0.0.1:0".parse().unwrap());

        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: bp,
            max_races: None,
            timeout: Some(Duration::from_millis(200)),
            buffer_size: 32,
            metrics_port: None,
            replay_path: None,
        });

        let stats = pipeline.run(std::future::pending()).await.unwrap();
        assert_eq!(stats.stop_reason, StopReason::Timeout);
        assert_eq!(stats.events_forwarded, 0);
    }

    #[tokio::test]
    async fn test_missing_recording_fails_setup() {
        let pipeline = Pipeline::new(PipelineConfig {
            blueprint: blueprint(TWO_LANES),
            max_races: None,
            timeout: None,
            buffer_size: 32,
            metrics_port: None,
            replay_path: Some(PathBuf::from("/nonexistent/night.jsonl")),
        });

        let err = pipeline.run(std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("sensor source"));
    }
}
