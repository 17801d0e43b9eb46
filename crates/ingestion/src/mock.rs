//! Mock track
//!
//! Plays races against the engine without hardware: raise the gate, release
//! it, fire one trigger per lane at a random finish time, then cool down.
//! Some triggers are repeated and some lanes never fire, so duplicate
//! handling and DNF assignment get exercised too.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{
    Lane, MockTrackConfig, SensorEvent, SensorEventCallback, SensorSource, TimedSensorEvent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Simulated track
pub struct MockTrack {
    source_id: String,
    lanes: Vec<Lane>,
    config: MockTrackConfig,
    max_races: Option<u64>,
    listening: Arc<AtomicBool>,
    races_started: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MockTrack {
    /// Create a mock track triggering `lanes`
    pub fn new(source_id: impl Into<String>, lanes: Vec<Lane>, config: MockTrackConfig) -> Self {
        Self {
            source_id: source_id.into(),
            lanes,
            config,
            max_races: None,
            listening: Arc::new(AtomicBool::new(false)),
            races_started: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    /// Stop after this many races
    pub fn with_max_races(mut self, max_races: u64) -> Self {
        self.max_races = Some(max_races);
        self
    }

    /// Races played so far
    pub fn races_started(&self) -> u64 {
        self.races_started.load(Ordering::Relaxed)
    }
}

/// Script one race, offsets relative to gate-up
///
/// Lanes are visited in the order given so a seeded generator always
/// produces the same script.
pub fn plan_race(rng: &mut impl Rng, lanes: &[Lane], config: &MockTrackConfig) -> Vec<TimedSensorEvent> {
    let release_ms = config.staging_ms;
    let mut events = vec![
        TimedSensorEvent {
            at_ms: 0,
            event: SensorEvent::GateUp,
        },
        TimedSensorEvent {
            at_ms: release_ms,
            event: SensorEvent::GateDown,
        },
    ];

    let min_micros = (config.min_time_s * 1_000_000.0) as u64;
    let max_micros = ((config.max_time_s * 1_000_000.0) as u64).max(min_micros);

    for &lane in lanes {
        if rng.random_bool(config.dnf_probability) {
            trace!(lane, "mock lane will not finish");
            continue;
        }
        let micros = rng.random_range(min_micros..=max_micros);
        events.push(TimedSensorEvent {
            at_ms: release_ms + micros / 1000,
            event: SensorEvent::LaneTrigger {
                lane,
                timestamp_micros: micros,
            },
        });

        if rng.random_bool(config.duplicate_probability) {
            let bounce = rng.random_range(2_000..=40_000);
            events.push(TimedSensorEvent {
                at_ms: release_ms + (micros + bounce) / 1000,
                event: SensorEvent::LaneTrigger {
                    lane,
                    timestamp_micros: micros + bounce,
                },
            });
        }
    }

    events.sort_by_key(|e| e.at_ms);
    events
}

impl SensorSource for MockTrack {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: SensorEventCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!(source_id = %self.source_id, "mock track already listening");
            return;
        }

        let source_id = self.source_id.clone();
        let lanes = self.lanes.clone();
        let config = self.config.clone();
        let max_races = self.max_races;
        let listening = self.listening.clone();
        let races_started = self.races_started.clone();

        let handle = tokio::spawn(async move {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            info!(source_id = %source_id, lanes = ?lanes, seed = ?config.seed, "mock track started");

            while listening.load(Ordering::Relaxed) {
                if max_races.is_some_and(|max| races_started.load(Ordering::Relaxed) >= max) {
                    break;
                }

                let script = plan_race(&mut rng, &lanes, &config);
                let race = races_started.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(source_id = %source_id, race, events = script.len(), "mock race scripted");

                let start = Instant::now();
                for timed in script {
                    tokio::time::sleep_until(start + Duration::from_millis(timed.at_ms)).await;
                    if !listening.load(Ordering::Relaxed) {
                        break;
                    }
                    callback(timed.event);
                }

                tokio::time::sleep(Duration::from_millis(config.cooldown_ms)).await;
            }

            listening.store(false, Ordering::SeqCst);
            debug!(source_id = %source_id, "mock track stopped");
        });

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MockTrackConfig {
        MockTrackConfig {
            duplicate_probability: 0.0,
            dnf_probability: 0.0,
            seed: Some(7),
            ..MockTrackConfig::default()
        }
    }

    #[test]
    fn test_plan_is_reproducible() {
        let a = plan_race(&mut StdRng::seed_from_u64(42), &[0, 1, 2, 3], &config());
        let b = plan_race(&mut StdRng::seed_from_u64(42), &[0, 1, 2, 3], &config());
        assert_eq!(a, b);
    }

    #[test]
    fn test_plan_shape() {
        let cfg = config();
        let script = plan_race(&mut StdRng::seed_from_u64(1), &[0, 2], &cfg);

        assert_eq!(script[0].event, SensorEvent::GateUp);
        assert_eq!(script[1].event, SensorEvent::GateDown);
        assert_eq!(script[1].at_ms, cfg.staging_ms);
        assert_eq!(script.len(), 4);

        for timed in &script[2..] {
            let SensorEvent::LaneTrigger { lane, timestamp_micros } = timed.event else {
                panic!("expected trigger, got {:?}", timed.event);
            };
            assert!(lane == 0 || lane == 2);
            assert!((2_700_000..=4_500_000).contains(&timestamp_micros));
            assert_eq!(timed.at_ms, cfg.staging_ms + timestamp_micros / 1000);
        }
        assert!(script.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));
    }

    #[test]
    fn test_plan_duplicates_and_dnfs() {
        let all_dup = MockTrackConfig {
            duplicate_probability: 1.0,
            ..config()
        };
        let script = plan_race(&mut StdRng::seed_from_u64(3), &[0, 1], &all_dup);
        let triggers = script
            .iter()
            .filter(|e| matches!(e.event, SensorEvent::LaneTrigger { .. }))
            .count();
        assert_eq!(triggers, 4);

        let all_dnf = MockTrackConfig {
            dnf_probability: 1.0,
            ..config()
        };
        let script = plan_race(&mut StdRng::seed_from_u64(3), &[0, 1], &all_dnf);
        assert_eq!(script.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_track_plays_races() {
        let track = MockTrack::new("mock", vec![0, 1], config()).with_max_races(2);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        track.listen(Arc::new(move |e| {
            let _ = tx.send(e);
        }));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(track.races_started(), 2);
        assert_eq!(
            events.iter().filter(|e| **e == SensorEvent::GateDown).count(),
            2
        );
        assert_eq!(events.len(), 8);
        assert!(!track.is_listening());
    }
}
