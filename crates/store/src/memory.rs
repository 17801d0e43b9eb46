//! In-memory result store.

use std::sync::atomic::{AtomicBool, Ordering};

use contracts::{CarId, CarUpdate, ContractError, EventId, RaceResult, ResultStore, Roster, Car};
use tokio::sync::RwLock;
use tracing::debug;

use crate::StoreDocument;

const STORE_NAME: &str = "memory";

/// Volatile store, used for mock runs and tests
///
/// Writes can be made to fail on demand to exercise unsaved-result handling.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    doc: RwLock<StoreDocument>,
    fail_saves: AtomicBool,
    fail_updates: AtomicBool,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one roster
    pub fn with_roster(roster: &Roster) -> Self {
        let mut doc = StoreDocument::default();
        doc.seed(roster);
        Self {
            doc: RwLock::new(doc),
            ..Default::default()
        }
    }

    /// Make every subsequent `save_result` fail
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `update_car` fail
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// All stored results, insertion ordered
    pub async fn results(&self) -> Vec<RaceResult> {
        self.doc.read().await.results.clone()
    }

    pub async fn car(&self, car_id: CarId) -> Option<Car> {
        self.doc
            .read()
            .await
            .cars
            .iter()
            .find(|c| c.car_id == car_id)
            .cloned()
    }

    /// Copy of the whole document
    pub async fn document(&self) -> StoreDocument {
        self.doc.read().await.clone()
    }
}

impl ResultStore for InMemoryResultStore {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn load_roster(&self, event_id: EventId) -> Result<Roster, ContractError> {
        self.doc.read().await.roster(event_id)
    }

    async fn get_results_by_car(&self, car_id: CarId) -> Result<Vec<RaceResult>, ContractError> {
        Ok(self.doc.read().await.results_by_car(car_id))
    }

    async fn save_result(&self, result: &RaceResult) -> Result<(), ContractError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ContractError::store_write(STORE_NAME, "save rejected"));
        }
        self.doc.write().await.append_result(STORE_NAME, result)?;
        debug!(result_id = result.result_id, car_id = result.car_id, "result stored");
        Ok(())
    }

    async fn update_car(&self, car_id: CarId, update: &CarUpdate) -> Result<(), ContractError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ContractError::store_write(STORE_NAME, "update rejected"));
        }
        self.doc.write().await.update_car(car_id, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{Achievement, RaceEvent};

    fn roster() -> Roster {
        Roster {
            event: RaceEvent {
                event_id: 1,
                name: "Spring Derby".into(),
                multiplier: 3,
            },
            cars: vec![Car::new(10, "Bolt", 1), Car::new(11, "Comet", 1)],
            results: Vec::new(),
        }
    }

    fn result(result_id: u64, car_id: CarId, time: f64) -> RaceResult {
        RaceResult {
            result_id,
            car_id,
            event_id: 1,
            lane: 1,
            time,
            place: 1,
            date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_query() {
        let store = InMemoryResultStore::with_roster(&roster());
        store.save_result(&result(1, 10, 3.1)).await.unwrap();
        store.save_result(&result(2, 11, 3.4)).await.unwrap();
        store.save_result(&result(3, 10, 3.0)).await.unwrap();

        let times: Vec<f64> = store
            .get_results_by_car(10)
            .await
            .unwrap()
            .iter()
            .map(|r| r.time)
            .collect();
        assert_eq!(times, vec![3.1, 3.0]);

        let roster = store.load_roster(1).await.unwrap();
        assert_eq!(roster.results.len(), 3);
        assert_eq!(roster.cars.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryResultStore::with_roster(&roster());
        store.set_fail_saves(true);
        assert!(store.save_result(&result(1, 10, 3.1)).await.is_err());
        assert!(store.results().await.is_empty());

        store.set_fail_saves(false);
        store.save_result(&result(1, 10, 3.1)).await.unwrap();
        assert_eq!(store.results().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_car() {
        let store = InMemoryResultStore::with_roster(&roster());
        store
            .update_car(11, &CarUpdate::achievements(vec![Achievement::Top1]))
            .await
            .unwrap();
        store
            .update_car(11, &CarUpdate::defer_permanently())
            .await
            .unwrap();

        let car = store.car(11).await.unwrap();
        assert!(car.deferred);
        assert_eq!(car.achievements, vec![Achievement::Top1]);

        store.set_fail_updates(true);
        assert!(store.update_car(10, &CarUpdate::defer_permanently()).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_event() {
        let store = InMemoryResultStore::new();
        assert!(matches!(
            store.load_roster(4).await,
            Err(ContractError::EventNotFound { event_id: 4 })
        ));
    }
}
