//! Store selection from configuration.

use contracts::{
    CarId, CarUpdate, ContractError, EventId, RaceBlueprint, RaceResult, ResultStore, Roster,
    StoreKind,
};

use crate::{InMemoryResultStore, JsonResultStore};

/// Runtime-selected result store
#[derive(Debug)]
pub enum AnyStore {
    Memory(InMemoryResultStore),
    Json(JsonResultStore),
}

impl AnyStore {
    /// Build the configured store, seeded with the blueprint roster
    pub async fn from_blueprint(blueprint: &RaceBlueprint) -> Result<Self, ContractError> {
        let roster = blueprint.seed_roster();
        match blueprint.store.kind {
            StoreKind::Memory => Ok(Self::Memory(InMemoryResultStore::with_roster(&roster))),
            StoreKind::Json => {
                let path = blueprint.store.path.as_ref().ok_or_else(|| {
                    ContractError::config_validation("store.path", "json store requires a path")
                })?;
                Ok(Self::Json(JsonResultStore::open_or_seed(path, &roster).await?))
            }
        }
    }
}

impl ResultStore for AnyStore {
    fn name(&self) -> &str {
        match self {
            Self::Memory(s) => s.name(),
            Self::Json(s) => s.name(),
        }
    }

    async fn load_roster(&self, event_id: EventId) -> Result<Roster, ContractError> {
        match self {
            Self::Memory(s) => s.load_roster(event_id).await,
            Self::Json(s) => s.load_roster(event_id).await,
        }
    }

    async fn get_results_by_car(&self, car_id: CarId) -> Result<Vec<RaceResult>, ContractError> {
        match self {
            Self::Memory(s) => s.get_results_by_car(car_id).await,
            Self::Json(s) => s.get_results_by_car(car_id).await,
        }
    }

    async fn save_result(&self, result: &RaceResult) -> Result<(), ContractError> {
        match self {
            Self::Memory(s) => s.save_result(result).await,
            Self::Json(s) => s.save_result(result).await,
        }
    }

    async fn update_car(&self, car_id: CarId, update: &CarUpdate) -> Result<(), ContractError> {
        match self {
            Self::Memory(s) => s.update_car(car_id, update).await,
            Self::Json(s) => s.update_car(car_id, update).await,
        }
    }
}
