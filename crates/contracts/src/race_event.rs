//! RaceEvent - the event whose races are being run.

use serde::{Deserialize, Serialize};

/// Event identifier
pub type EventId = u64;

/// An event, immutable from the race core's point of view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceEvent {
    pub event_id: EventId,

    #[serde(default)]
    pub name: String,

    /// Number of runs every car must complete
    pub multiplier: u32,
}
