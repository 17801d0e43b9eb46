//! LaneAssignment - who is racing and who is on deck, per lane.

use serde::{Deserialize, Serialize};

use crate::CarId;

/// 0-based lane index
pub type Lane = usize;

/// Two parallel per-lane mappings
///
/// Owned by the race state machine and mutated only through `advance`
/// and the operator defer commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneAssignment {
    /// Car currently in each lane
    pub racing: Vec<Option<CarId>>,

    /// Car scheduled for the next race in each lane
    pub on_deck: Vec<Option<CarId>>,
}

impl LaneAssignment {
    /// All lanes empty
    pub fn empty(lanes: usize) -> Self {
        Self {
            racing: vec![None; lanes],
            on_deck: vec![None; lanes],
        }
    }

    pub fn lane_count(&self) -> usize {
        self.racing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.racing.iter().chain(self.on_deck.iter()).all(Option::is_none)
    }

    pub fn is_racing(&self, car_id: CarId) -> bool {
        self.racing.contains(&Some(car_id))
    }

    pub fn is_on_deck(&self, car_id: CarId) -> bool {
        self.on_deck.contains(&Some(car_id))
    }

    /// Racing or on deck in any lane
    pub fn is_assigned(&self, car_id: CarId) -> bool {
        self.is_racing(car_id) || self.is_on_deck(car_id)
    }

    pub fn racing_in(&self, lane: Lane) -> Option<CarId> {
        self.racing.get(lane).copied().flatten()
    }

    pub fn on_deck_in(&self, lane: Lane) -> Option<CarId> {
        self.on_deck.get(lane).copied().flatten()
    }

    /// Swap the racing and on-deck slot of one lane
    pub fn swap_lane(&mut self, lane: Lane) {
        if lane < self.racing.len() && lane < self.on_deck.len() {
            std::mem::swap(&mut self.racing[lane], &mut self.on_deck[lane]);
        }
    }
}
