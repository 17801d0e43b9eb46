//! Bulletin - race engine output towards the presentation layer.
//!
//! Fire-and-forget notifications fanned out by the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Achievement, CarId, Lane, RaceResult, RaceStanding, ResultId, Standing};

/// Presentation lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleSignal {
    ShowVideo,
    StartRecording,
    StopRecording,
    ShowInstantReplay,
    InitializeInstantReplayStream,
}

/// Badges earned by one lane's car in a finished race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneAchievements {
    pub lane: Lane,
    pub car_id: CarId,
    pub achievements: Vec<Achievement>,
}

/// Everything that came out of one finished race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub generation: u64,
    pub results: Vec<RaceResult>,
    pub standings_this_race: Vec<RaceStanding>,
    pub achievements: Vec<LaneAchievements>,
}

/// Bulletin payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BulletinBody {
    Lifecycle(LifecycleSignal),
    RaceCompleted(RaceOutcome),
    StandingsUpdated(Vec<Standing>),
    /// A result could not be persisted
    ResultUnsaved {
        result_id: ResultId,
        car_id: CarId,
        error: String,
    },
}

impl BulletinBody {
    pub fn kind(&self) -> &'static str {
        match self {
            BulletinBody::Lifecycle(_) => "lifecycle",
            BulletinBody::RaceCompleted(_) => "race_completed",
            BulletinBody::StandingsUpdated(_) => "standings_updated",
            BulletinBody::ResultUnsaved { .. } => "result_unsaved",
        }
    }
}

/// Sequenced bulletin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bulletin {
    /// Monotonically increasing per runner
    pub seq: u64,
    pub issued_at: DateTime<Utc>,
    pub body: BulletinBody,
}

impl Bulletin {
    /// Stamp a bulletin with the current wall clock
    pub fn new(seq: u64, body: BulletinBody) -> Self {
        Self {
            seq,
            issued_at: Utc::now(),
            body,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.body.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bulletin_json_shape() {
        let bulletin = Bulletin {
            seq: 3,
            issued_at: Utc.with_ymd_and_hms(2026, 5, 2, 10, 0, 0).unwrap(),
            body: BulletinBody::Lifecycle(LifecycleSignal::ShowInstantReplay),
        };
        let value = serde_json::to_value(&bulletin).unwrap();
        assert_eq!(value["seq"], 3);
        assert_eq!(value["body"]["type"], "lifecycle");
        assert_eq!(value["body"]["data"], "showInstantReplay");
    }
}
