//! RaceSnapshot - immutable view of "what is happening right now".
//!
//! Published by the race runner after every transition for the live display.

use serde::{Deserialize, Serialize};

use crate::{Achievement, CarId, Lane, RaceStanding, ResultId, Standing};

/// Race lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceStatus {
    /// Armed, waiting for gate release
    #[default]
    Ready,
    /// Gate down, timing in progress
    Racing,
    /// Results final, settling before the next race
    Ended,
}

/// Car identity as shown on the display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarView {
    pub car_id: CarId,
    pub name: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// One lane on the display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneView {
    pub lane: Lane,
    pub operational: bool,
    pub racing: Option<CarView>,
    pub on_deck: Option<CarView>,
    /// Finish time, 0 while unfinished
    pub time: f64,
    pub place: Option<u32>,
    /// Badges earned this race, `None` until evaluated
    pub achievements: Option<Vec<Achievement>>,
    /// Finish sensor health as last reported
    pub sensor_ok: bool,
}

/// Full display snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    /// Race generation, bumped on every advance
    pub generation: u64,
    pub gate_ready: bool,
    pub recovery_ready: bool,
    /// Milliseconds since gate release while racing or ended
    pub elapsed_ms: Option<u64>,
    pub lanes: Vec<LaneView>,
    pub standings_this_race: Vec<RaceStanding>,
    /// Event-wide ranking after the last completed race
    pub standings: Vec<Standing>,
    /// Results whose save failed and need manual reconciliation
    pub unsaved_results: Vec<ResultId>,
    /// Races completed since the session started
    pub races_completed: u64,
}

impl RaceSnapshot {
    /// Whether every lane has an empty racing slot (nothing left to run)
    pub fn is_idle(&self) -> bool {
        self.lanes.iter().all(|lane| lane.racing.is_none())
    }
}
