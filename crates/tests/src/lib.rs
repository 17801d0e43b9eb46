//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - contract round trips between config, store and scoring
//! - the race runner against real stores
//! - mock and replay e2e runs (no track hardware needed)

#[cfg(test)]
mod contract_tests {
    use contracts::{ConfigVersion, ResultStore};
    use store::InMemoryResultStore;

    const CONFIG: &str = r#"
[track]
lanes = 4
operational_lanes = [0, 1, 3]

[event]
event_id = 7
name = "Pack Derby"
multiplier = 2

[[cars]]
car_id = 1
name = "Comet"

[[cars]]
car_id = 2
name = "Pebble"
nickname = "Rocky"
"#;

    #[test]
    fn test_contracts_compile() {
        let _ = ConfigVersion::V1;
    }

    #[tokio::test]
    async fn test_blueprint_seeds_store_roster() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            CONFIG,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let store = InMemoryResultStore::with_roster(&blueprint.seed_roster());

        let roster = store.load_roster(7).await.unwrap();
        assert_eq!(roster.event.multiplier, 2);
        assert_eq!(roster.cars.len(), 2);
        assert_eq!(roster.car(2).unwrap().nickname.as_deref(), Some("Rocky"));
        assert!(store.load_roster(8).await.is_err());
    }
}

#[cfg(test)]
mod runner_tests {
    use std::sync::Arc;

    use chrono::Utc;
    use contracts::{
        is_dnf, Bulletin, BulletinBody, Car, LifecycleSignal, RaceEvent, RaceSnapshot, RaceStatus,
        Roster, SensorEvent,
    };
    use race_engine::{
        EngineConfig, ManualTimeSource, RaceHandle, RaceRunner, RaceStateMachine, RunnerConfig,
        RunnerTask,
    };
    use store::InMemoryResultStore;
    use tokio::sync::mpsc;

    fn roster(cars: u64) -> Roster {
        Roster {
            event: RaceEvent {
                event_id: 1,
                name: "Runner Night".into(),
                multiplier: 2,
            },
            cars: (1..=cars)
                .map(|id| Car::new(id, format!("car-{id}"), 1))
                .collect(),
            results: Vec::new(),
        }
    }

    struct Harness {
        handle: RaceHandle,
        task: RunnerTask,
        bulletins: mpsc::Receiver<Bulletin>,
        store: Arc<InMemoryResultStore>,
        time: Arc<ManualTimeSource>,
    }

    fn spawn(lanes: usize, cars: u64) -> Harness {
        let roster = roster(cars);
        let store = Arc::new(InMemoryResultStore::with_roster(&roster));
        let time = Arc::new(ManualTimeSource::new(Utc::now()));
        let machine = RaceStateMachine::new(EngineConfig::with_lanes(lanes), roster, time.clone());
        let (bulletin_tx, bulletins) = mpsc::channel(256);
        let (handle, task) =
            RaceRunner::spawn(machine, store.clone(), bulletin_tx, RunnerConfig::default());
        Harness {
            handle,
            task,
            bulletins,
            store,
            time,
        }
    }

    fn trigger(lane: usize, seconds: f64) -> SensorEvent {
        SensorEvent::LaneTrigger {
            lane,
            timestamp_micros: (seconds * 1_000_000.0) as u64,
        }
    }

    async fn release(handle: &RaceHandle) -> RaceSnapshot {
        handle.sensor(SensorEvent::GateUp).await.unwrap();
        handle.sensor(SensorEvent::GateDown).await.unwrap();
        handle
            .wait_for(|s| s.status == RaceStatus::Racing)
            .await
            .unwrap()
    }

    fn drain(rx: &mut mpsc::Receiver<Bulletin>) -> Vec<Bulletin> {
        let mut out = Vec::new();
        while let Ok(b) = rx.try_recv() {
            out.push(b);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_fills_lanes_and_announces() {
        let mut h = spawn(2, 4);
        let snapshot = h.handle.wait_for(|s| !s.is_idle()).await.unwrap();
        assert_eq!(snapshot.status, RaceStatus::Ready);
        assert!(snapshot.lanes.iter().all(|l| l.racing.is_some()));
        assert!(snapshot.lanes.iter().all(|l| l.on_deck.is_some()));

        let report = h.task.shutdown().await.unwrap();
        assert_eq!(report.races_completed, 0);

        let bulletins = drain(&mut h.bulletins);
        assert_eq!(
            bulletins[0].body,
            BulletinBody::Lifecycle(LifecycleSignal::InitializeInstantReplayStream)
        );
        // sequence numbers are strictly increasing from 1
        for (i, b) in bulletins.iter().enumerate() {
            assert_eq!(b.seq, i as u64 + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_results_persisted() {
        let mut h = spawn(2, 4);
        release(&h.handle).await;

        h.handle.sensor(trigger(1, 2.5)).await.unwrap();
        h.handle.sensor(trigger(0, 2.75)).await.unwrap();

        let snapshot = h
            .handle
            .wait_for(|s| s.status == RaceStatus::Ended)
            .await
            .unwrap();
        assert_eq!(snapshot.races_completed, 1);
        assert_eq!(snapshot.standings_this_race.len(), 2);
        assert_eq!(snapshot.standings_this_race[0].lane, 1);
        assert_eq!(snapshot.standings_this_race[1].place, 2);
        assert_eq!(snapshot.standings.len(), 2);

        let report = h.task.shutdown().await.unwrap();
        assert!(report.unsaved_results.is_empty());
        assert_eq!(report.summary.races, 1);
        assert_eq!(report.summary.results, 2);

        let saved = h.store.results().await;
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|r| r.event_id == 1));

        let bulletins = drain(&mut h.bulletins);
        let completed: Vec<_> = bulletins
            .iter()
            .filter_map(|b| match &b.body {
                BulletinBody::RaceCompleted(outcome) => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].results.len(), 2);
        assert!(bulletins
            .iter()
            .any(|b| b.body == BulletinBody::Lifecycle(LifecycleSignal::ShowInstantReplay)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_marks_results_unsaved() {
        let mut h = spawn(2, 2);
        h.store.set_fail_saves(true);
        release(&h.handle).await;

        h.handle.sensor(trigger(0, 3.0)).await.unwrap();
        h.handle.sensor(trigger(1, 3.5)).await.unwrap();

        let snapshot = h
            .handle
            .wait_for(|s| s.unsaved_results.len() == 2)
            .await
            .unwrap();
        assert_eq!(snapshot.status, RaceStatus::Ended);

        let report = h.task.shutdown().await.unwrap();
        assert_eq!(report.unsaved_results.len(), 2);
        assert_eq!(report.summary.unsaved, 2);
        assert!(h.store.results().await.is_empty());

        let unsaved = drain(&mut h.bulletins)
            .into_iter()
            .filter(|b| matches!(b.body, BulletinBody::ResultUnsaved { .. }))
            .count();
        assert_eq!(unsaved, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfinished_lane_times_out_as_dnf() {
        let h = spawn(2, 2);
        release(&h.handle).await;

        h.handle.sensor(trigger(0, 2.9)).await.unwrap();
        h.handle
            .wait_for(|s| s.standings_this_race.len() == 1)
            .await
            .unwrap();

        h.time.advance(6_001);
        let snapshot = h
            .handle
            .wait_for(|s| s.status == RaceStatus::Ended)
            .await
            .unwrap();

        let dnf = snapshot
            .standings_this_race
            .iter()
            .find(|s| s.lane == 1)
            .unwrap();
        assert!(is_dnf(dnf.time));
        // DNF results do not rank
        assert_eq!(snapshot.standings.len(), 1);

        let report = h.task.shutdown().await.unwrap();
        assert_eq!(report.summary.dnfs, 1);
        assert_eq!(h.store.results().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_and_settle_arm_next_race() {
        let h = spawn(2, 4);
        let first = release(&h.handle).await;

        h.handle.sensor(trigger(0, 2.6)).await.unwrap();
        h.handle.sensor(trigger(1, 2.7)).await.unwrap();
        h.handle
            .wait_for(|s| s.status == RaceStatus::Ended)
            .await
            .unwrap();

        // gate raised during the settle delay; ready once the delay passes
        h.handle.sensor(SensorEvent::GateUp).await.unwrap();
        let next = h
            .handle
            .wait_for(|s| s.status == RaceStatus::Ready && s.races_completed == 1)
            .await
            .unwrap();
        assert!(next.generation > first.generation);
        assert!(next.gate_ready);
        assert!(!next.recovery_ready);

        // gate stays armed across the reset
        h.handle.sensor(SensorEvent::GateDown).await.unwrap();
        h.handle
            .wait_for(|s| s.status == RaceStatus::Racing)
            .await
            .unwrap();

        let report = h.task.shutdown().await.unwrap();
        assert_eq!(report.races_completed, 1);
        assert_eq!(report.final_snapshot.status, RaceStatus::Racing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_release_without_arming_is_ignored() {
        let h = spawn(2, 2);
        h.handle.sensor(SensorEvent::GateDown).await.unwrap();
        h.handle.sensor(trigger(0, 2.0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let snapshot = h.handle.snapshot();
        assert_eq!(snapshot.status, RaceStatus::Ready);
        assert!(snapshot.standings_this_race.is_empty());
        h.task.shutdown().await.unwrap();
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        Bulletin, Car, MockTrackConfig, RaceEvent, RaceStatus, ResultStore, Roster, SensorEvent,
        SinkConfig, SinkType, TimedSensorEvent,
    };
    use dispatcher::create_dispatcher;
    use ingestion::{IngestionPipeline, MockTrack, ReplaySource};
    use race_engine::{
        EngineConfig, RaceInput, RaceRunner, RaceStateMachine, RunnerConfig, SystemTimeSource,
    };
    use scoring::compute_standings;
    use store::{InMemoryResultStore, JsonResultStore};
    use tokio::sync::mpsc;

    fn roster(cars: u64) -> Roster {
        Roster {
            event: RaceEvent {
                event_id: 3,
                name: "E2E Derby".into(),
                multiplier: 4,
            },
            cars: (1..=cars)
                .map(|id| Car::new(id, format!("car-{id}"), 3))
                .collect(),
            results: Vec::new(),
        }
    }

    fn file_sink(path: &std::path::Path) -> SinkConfig {
        SinkConfig {
            name: "bulletins".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 128,
            params: HashMap::from([("path".to_string(), path.display().to_string())]),
        }
    }

    /// MockTrack -> IngestionPipeline -> RaceRunner -> Dispatcher + store
    #[tokio::test(start_paused = true)]
    async fn test_e2e_mock_track() {
        let dir = tempfile::tempdir().unwrap();
        let bulletin_path = dir.path().join("bulletins.jsonl");

        // two full heats of four
        let roster = roster(8);
        let store = Arc::new(InMemoryResultStore::with_roster(&roster));

        let (bulletin_tx, bulletin_rx) = mpsc::channel::<Bulletin>(128);
        let dispatcher = create_dispatcher(vec![file_sink(&bulletin_path)], bulletin_rx)
            .await
            .unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let machine = RaceStateMachine::new(
            EngineConfig::with_lanes(4),
            roster,
            Arc::new(SystemTimeSource::new()),
        );
        let (race, runner) =
            RaceRunner::spawn(machine, store.clone(), bulletin_tx, RunnerConfig::default());

        let track = MockTrack::new(
            "mock",
            vec![0, 1, 2, 3],
            MockTrackConfig {
                duplicate_probability: 0.5,
                dnf_probability: 0.0,
                seed: Some(11),
                ..MockTrackConfig::default()
            },
        )
        .with_max_races(2);

        let mut ingestion = IngestionPipeline::new(64);
        ingestion.register_source(Box::new(track));
        ingestion.start_all();
        let events = ingestion.take_receiver().unwrap();

        let feeder = {
            let race = race.clone();
            tokio::spawn(async move {
                let mut forwarded = 0u64;
                while let Ok(event) = events.recv().await {
                    race.send(RaceInput::Sensor(event)).await.unwrap();
                    forwarded += 1;
                }
                forwarded
            })
        };

        race.wait_for(|s| s.races_completed == 2).await.unwrap();
        let forwarded = feeder.await.unwrap();
        assert!(forwarded >= 2 * (2 + 4));

        let report = runner.shutdown().await.unwrap();
        drop(race);
        assert_eq!(report.races_completed, 2);
        assert!(report.unsaved_results.is_empty());
        assert_eq!(report.bulletins_dropped, 0);

        let sinks = dispatcher_handle.await.unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].1.delivered, report.bulletins_sent);
        assert_eq!(sinks[0].1.last_seq, report.bulletins_sent);

        // four lanes, two races, duplicates ignored
        let saved = store.results().await;
        assert_eq!(saved.len(), 8);
        let mut ids: Vec<_> = saved.iter().map(|r| r.result_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);

        let lines = std::fs::read_to_string(&bulletin_path).unwrap();
        assert_eq!(lines.lines().count() as u64, report.bulletins_sent);
        let first: serde_json::Value = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
        assert_eq!(first["seq"], 1);
    }

    fn script() -> Vec<TimedSensorEvent> {
        let trigger = |at_ms, lane, timestamp_micros| TimedSensorEvent {
            at_ms,
            event: SensorEvent::LaneTrigger {
                lane,
                timestamp_micros,
            },
        };
        vec![
            TimedSensorEvent {
                at_ms: 0,
                event: SensorEvent::GateUp,
            },
            TimedSensorEvent {
                at_ms: 1_000,
                event: SensorEvent::GateDown,
            },
            trigger(3_900, 1, 2_900_000),
            trigger(3_910, 1, 2_910_000),
            trigger(4_100, 0, 3_100_000),
        ]
    }

    /// ReplaySource -> RaceRunner -> JSON store, then standings and export
    #[tokio::test(start_paused = true)]
    async fn test_e2e_replay_into_json_store() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("race.json");

        let roster = roster(2);
        let store = Arc::new(JsonResultStore::open_or_seed(&store_path, &roster).await.unwrap());

        let (bulletin_tx, _bulletin_rx) = mpsc::channel::<Bulletin>(128);
        let machine = RaceStateMachine::new(
            EngineConfig::with_lanes(2),
            store.load_roster(3).await.unwrap(),
            Arc::new(SystemTimeSource::new()),
        );
        let (race, runner) =
            RaceRunner::spawn(machine, store.clone(), bulletin_tx, RunnerConfig::default());

        let mut ingestion = IngestionPipeline::new(16);
        ingestion.register_source(Box::new(ReplaySource::from_events(
            "night.jsonl",
            script(),
            2.0,
            false,
        )));
        ingestion.start_all();
        let events = ingestion.take_receiver().unwrap();
        while let Ok(event) = events.recv().await {
            race.send(RaceInput::Sensor(event)).await.unwrap();
        }

        let snapshot = race
            .wait_for(|s| s.status == RaceStatus::Ended)
            .await
            .unwrap();
        assert_eq!(snapshot.standings_this_race[0].lane, 1);

        let report = runner.shutdown().await.unwrap();
        assert_eq!(report.races_completed, 1);

        // a fresh open sees what the runner persisted
        let reopened = JsonResultStore::open(&store_path).await.unwrap();
        let persisted = reopened.load_roster(3).await.unwrap();
        assert_eq!(persisted.results.len(), 2);

        let standings = compute_standings(&persisted.cars, &persisted.results);
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].car_id, persisted.results[0].car_id);
        approx::assert_abs_diff_eq!(standings[1].delta_time, 0.2, epsilon = 1e-9);

        let mut csv = Vec::new();
        assert_eq!(store::export_csv(&persisted, &mut csv).unwrap(), 2);
        assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 3);
    }
}
