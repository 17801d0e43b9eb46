//! RaceResult - one car's finish in one race.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CarId, EventId, Lane};

/// Result identifier
pub type ResultId = u64;

/// Sentinel race time for did-not-finish
pub const DNF_TIME: f64 = 10.0;

/// Whether a race time denotes did-not-finish
#[inline]
pub fn is_dnf(time: f64) -> bool {
    time >= DNF_TIME
}

/// Append-only finish record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub result_id: ResultId,
    pub car_id: CarId,
    pub event_id: EventId,

    /// 0-based lane index
    pub lane: Lane,

    /// Seconds from gate release, [`DNF_TIME`] for did-not-finish
    pub time: f64,

    /// 1-based rank within the race
    pub place: u32,

    #[serde(rename = "result_date")]
    pub date: DateTime<Utc>,
}

impl RaceResult {
    pub fn is_dnf(&self) -> bool {
        is_dnf(self.time)
    }
}
