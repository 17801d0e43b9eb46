//! RaceBlueprint - Config Loader output
//!
//! Describes a complete race-day setup: track, timing, event, roster seed,
//! result store, sensor source and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use validator::Validate;

use crate::{Car, CarId, EventId, Lane, RaceEvent, Roster};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete race configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RaceBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    #[validate(nested)]
    pub track: TrackConfig,

    #[serde(default)]
    #[validate(nested)]
    pub timing: TimingConfig,

    #[validate(nested)]
    pub event: EventConfig,

    /// Roster seed for in-memory and freshly created stores
    #[serde(default)]
    pub cars: Vec<CarConfig>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    #[validate(nested)]
    pub sensor: SensorConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Track layout
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackConfig {
    /// Physical lane count
    #[validate(range(min = 1, max = 8))]
    pub lanes: usize,

    /// Lanes in use; empty means every lane
    #[serde(default)]
    pub operational_lanes: Vec<Lane>,
}

impl TrackConfig {
    /// Resolved, sorted list of operational lanes
    pub fn operational(&self) -> Vec<Lane> {
        if self.operational_lanes.is_empty() {
            return (0..self.lanes).collect();
        }
        let mut lanes = self.operational_lanes.clone();
        lanes.sort_unstable();
        lanes.dedup();
        lanes
    }
}

/// Engine timing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TimingConfig {
    /// Clock tick interval while racing
    #[serde(default = "default_tick_interval_ms")]
    #[validate(range(min = 1))]
    pub tick_interval_ms: u64,

    /// Lanes still unfinished this long after release are DNF
    #[serde(default = "default_dnf_timeout_ms")]
    #[validate(range(min = 1))]
    pub dnf_timeout_ms: u64,

    /// Delay after a race ends before recovery is allowed
    #[serde(default = "default_settle_delay_ms")]
    #[validate(range(min = 1))]
    pub settle_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            dnf_timeout_ms: default_dnf_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_dnf_timeout_ms() -> u64 {
    6000
}

fn default_settle_delay_ms() -> u64 {
    8000
}

/// Event being raced
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventConfig {
    pub event_id: EventId,

    #[serde(default)]
    pub name: String,

    /// Runs per car
    #[validate(range(min = 1))]
    pub multiplier: u32,
}

impl EventConfig {
    pub fn to_event(&self) -> RaceEvent {
        RaceEvent {
            event_id: self.event_id,
            name: self.name.clone(),
            multiplier: self.multiplier,
        }
    }
}

/// Roster entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarConfig {
    pub car_id: CarId,
    pub name: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// Result store selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Document path (json store)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    Json,
}

/// Sensor source selection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SensorConfig {
    #[serde(default)]
    pub source: SensorSourceKind,

    /// JSON-lines recording (replay source)
    #[serde(default)]
    pub replay_path: Option<PathBuf>,

    /// Replay speed multiplier
    #[serde(default = "default_replay_speed")]
    #[validate(range(exclusive_min = 0.0))]
    pub replay_speed: f64,

    /// Restart the recording when it ends
    #[serde(default)]
    pub replay_loop: bool,

    /// UDP address the timer-board bridge sends register blocks to (raw source)
    #[serde(default)]
    pub raw_bind: Option<SocketAddr>,

    #[serde(default)]
    #[validate(nested)]
    pub mock: MockTrackConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SensorSourceKind::default(),
            replay_path: None,
            replay_speed: default_replay_speed(),
            replay_loop: false,
            raw_bind: None,
            mock: MockTrackConfig::default(),
        }
    }
}

fn default_replay_speed() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSourceKind {
    #[default]
    Mock,
    Replay,
    /// Timer-board register blocks over UDP
    Raw,
}

/// Simulated track behaviour
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MockTrackConfig {
    /// Fastest finish time (seconds)
    #[serde(default = "default_min_time_s")]
    #[validate(range(exclusive_min = 0.0))]
    pub min_time_s: f64,

    /// Slowest finish time (seconds)
    #[serde(default = "default_max_time_s")]
    #[validate(range(exclusive_min = 0.0))]
    pub max_time_s: f64,

    /// Gate-up to release delay
    #[serde(default = "default_staging_ms")]
    pub staging_ms: u64,

    /// Pause after the last trigger before the gate is raised again
    ///
    /// Must cover the engine's DNF window plus settle delay, otherwise the
    /// next release arrives while the previous race is still showing.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Chance a lane trigger is sent twice
    #[serde(default = "default_duplicate_probability")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub duplicate_probability: f64,

    /// Chance a lane never triggers
    #[serde(default = "default_dnf_probability")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub dnf_probability: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for MockTrackConfig {
    fn default() -> Self {
        Self {
            min_time_s: default_min_time_s(),
            max_time_s: default_max_time_s(),
            staging_ms: default_staging_ms(),
            cooldown_ms: default_cooldown_ms(),
            duplicate_probability: default_duplicate_probability(),
            dnf_probability: default_dnf_probability(),
            seed: None,
        }
    }
}

fn default_min_time_s() -> f64 {
    2.7
}

fn default_max_time_s() -> f64 {
    4.5
}

fn default_staging_ms() -> u64 {
    1500
}

fn default_cooldown_ms() -> u64 {
    12_000
}

fn default_duplicate_probability() -> f64 {
    0.05
}

fn default_dnf_probability() -> f64 {
    0.03
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON-lines file output
    File,
    /// Network output (UDP)
    Network,
}

impl RaceBlueprint {
    /// Build the initial roster from the configured event and cars
    pub fn seed_roster(&self) -> Roster {
        let event_id = self.event.event_id;
        Roster {
            event: self.event.to_event(),
            cars: self
                .cars
                .iter()
                .map(|c| Car {
                    car_id: c.car_id,
                    name: c.name.clone(),
                    nickname: c.nickname.clone(),
                    event_id,
                    deferred: false,
                    achievements: Vec::new(),
                })
                .collect(),
            results: Vec::new(),
        }
    }

    /// Car names used by more than one roster entry
    pub fn duplicate_car_names(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for car in &self.cars {
            *seen.entry(car.name.trim()).or_default() += 1;
        }
        let mut dups: Vec<String> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect();
        dups.sort();
        dups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> RaceBlueprint {
        RaceBlueprint {
            version: ConfigVersion::V1,
            track: TrackConfig {
                lanes: 4,
                operational_lanes: vec![],
            },
            timing: TimingConfig::default(),
            event: EventConfig {
                event_id: 7,
                name: "Pack 12 Derby".into(),
                multiplier: 3,
            },
            cars: vec![
                CarConfig {
                    car_id: 1,
                    name: "Comet".into(),
                    nickname: None,
                },
                CarConfig {
                    car_id: 2,
                    name: "Comet ".into(),
                    nickname: Some("Jr".into()),
                },
                CarConfig {
                    car_id: 3,
                    name: "Bolt".into(),
                    nickname: None,
                },
            ],
            store: StoreConfig::default(),
            sensor: SensorConfig::default(),
            sinks: vec![],
        }
    }

    #[test]
    fn test_operational_defaults_to_all_lanes() {
        let mut blueprint = sample_blueprint();
        assert_eq!(blueprint.track.operational(), vec![0, 1, 2, 3]);

        blueprint.track.operational_lanes = vec![3, 1, 1];
        assert_eq!(blueprint.track.operational(), vec![1, 3]);
    }

    #[test]
    fn test_seed_roster_carries_event() {
        let roster = sample_blueprint().seed_roster();
        assert_eq!(roster.event.multiplier, 3);
        assert_eq!(roster.cars.len(), 3);
        assert!(roster.cars.iter().all(|c| c.event_id == 7 && !c.deferred));
        assert_eq!(roster.cars[1].nickname.as_deref(), Some("Jr"));
    }

    #[test]
    fn test_duplicate_names_are_trimmed() {
        assert_eq!(sample_blueprint().duplicate_car_names(), vec!["Comet"]);
    }

    #[test]
    fn test_timing_defaults() {
        let timing = TimingConfig::default();
        assert_eq!(timing.tick_interval_ms, 50);
        assert_eq!(timing.dnf_timeout_ms, 6000);
        assert_eq!(timing.settle_delay_ms, 8000);
    }

    #[test]
    fn test_derive_rules_reject_zero_multiplier() {
        let mut blueprint = sample_blueprint();
        assert!(blueprint.validate().is_ok());
        blueprint.event.multiplier = 0;
        assert!(blueprint.validate().is_err());
    }
}
