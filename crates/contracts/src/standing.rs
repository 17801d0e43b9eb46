//! Standings - per-race finish order and event-wide ranking.

use serde::{Deserialize, Serialize};

use crate::{CarId, Lane};

/// One finish within the current race
///
/// Appended in finish order as lanes report, so insertion order is
/// finish order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceStanding {
    pub lane: Lane,
    pub car_id: CarId,
    pub name: String,
    pub place: u32,
    pub time: f64,
    /// Seconds behind the first finisher
    pub delta_time: f64,
}

/// Event-wide ranking entry, derived and never persisted by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub place: u32,
    pub car_id: CarId,
    pub car_name: String,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Best non-DNF time
    pub time: f64,
    /// Seconds behind the event's best time
    pub delta_time: f64,
}
