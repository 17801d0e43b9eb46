//! ResultStore trait - persistence boundary.
//!
//! The store owns cars, events and results. The race core reads snapshots
//! and only ever appends results or flags cars.

use serde::{Deserialize, Serialize};

use crate::{Achievement, Car, CarId, ContractError, EventId, RaceEvent, RaceResult};

/// Everything the race core needs to know about one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub event: RaceEvent,
    pub cars: Vec<Car>,
    /// Results in insertion order
    #[serde(default)]
    pub results: Vec<RaceResult>,
}

impl Roster {
    pub fn car(&self, car_id: CarId) -> Option<&Car> {
        self.cars.iter().find(|c| c.car_id == car_id)
    }

    /// All results for one car, oldest first
    pub fn results_for(&self, car_id: CarId) -> Vec<RaceResult> {
        self.results
            .iter()
            .filter(|r| r.car_id == car_id)
            .cloned()
            .collect()
    }
}

/// Partial car update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarUpdate {
    /// New permanent-defer flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_perm: Option<bool>,

    /// Badges to append (duplicates are skipped)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_achievements: Vec<Achievement>,
}

impl CarUpdate {
    pub fn defer_permanently() -> Self {
        Self {
            defer_perm: Some(true),
            ..Default::default()
        }
    }

    pub fn achievements(achievements: Vec<Achievement>) -> Self {
        Self {
            add_achievements: achievements,
            ..Default::default()
        }
    }

    /// Apply to a car record
    pub fn apply(&self, car: &mut Car) {
        if let Some(deferred) = self.defer_perm {
            car.deferred = deferred;
        }
        car.award(&self.add_achievements);
    }
}

/// Result persistence interface
///
/// Implementations use interior mutability so a single store can be shared
/// between the runner and fire-and-forget save tasks.
#[trait_variant::make(ResultStore: Send)]
pub trait LocalResultStore {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Load event, cars and results for one event
    async fn load_roster(&self, event_id: EventId) -> Result<Roster, ContractError>;

    /// All results for one car, oldest first
    async fn get_results_by_car(&self, car_id: CarId) -> Result<Vec<RaceResult>, ContractError>;

    /// Append one result
    ///
    /// # Errors
    /// Returns write error; the caller reports it but never retries
    async fn save_result(&self, result: &RaceResult) -> Result<(), ContractError>;

    /// Update one car
    async fn update_car(&self, car_id: CarId, update: &CarUpdate) -> Result<(), ContractError>;
}
