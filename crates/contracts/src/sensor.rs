//! SensorEvent - ingestion output, race engine input.
//!
//! Transport-neutral events reported by the track hardware.

use serde::{Deserialize, Serialize};

use crate::Lane;

/// Event reported by the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorEvent {
    /// Start gate raised and latched
    GateUp,

    /// Start gate dropped, cars released
    GateDown,

    /// Finish sensor fired
    LaneTrigger {
        lane: Lane,
        /// Microseconds since gate release as counted by the track
        timestamp_micros: u64,
    },

    /// Finish sensor health changed
    SensorHealth { lane: Lane, healthy: bool },
}

impl SensorEvent {
    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SensorEvent::GateUp => "gate_up",
            SensorEvent::GateDown => "gate_down",
            SensorEvent::LaneTrigger { .. } => "lane_trigger",
            SensorEvent::SensorHealth { .. } => "sensor_health",
        }
    }
}

/// Convert a track timestamp into race seconds
#[inline]
pub fn micros_to_seconds(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Sensor event stamped with its offset from the start of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedSensorEvent {
    /// Milliseconds since the recording started
    pub at_ms: u64,
    pub event: SensorEvent,
}
