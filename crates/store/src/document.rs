//! StoreDocument - the data every store keeps.

use serde::{Deserialize, Serialize};

use contracts::{Car, CarId, CarUpdate, ContractError, EventId, RaceEvent, RaceResult, Roster};

/// Events, cars and results of one store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub events: Vec<RaceEvent>,
    #[serde(default)]
    pub cars: Vec<Car>,
    /// Append-only, insertion ordered
    #[serde(default)]
    pub results: Vec<RaceResult>,
}

impl StoreDocument {
    /// Merge a roster in; existing events and cars win
    pub fn seed(&mut self, roster: &Roster) {
        if !self.events.iter().any(|e| e.event_id == roster.event.event_id) {
            self.events.push(roster.event.clone());
        }
        for car in &roster.cars {
            if !self.cars.iter().any(|c| c.car_id == car.car_id) {
                self.cars.push(car.clone());
            }
        }
        for result in &roster.results {
            if !self.results.iter().any(|r| r.result_id == result.result_id) {
                self.results.push(result.clone());
            }
        }
    }

    pub fn roster(&self, event_id: EventId) -> Result<Roster, ContractError> {
        let event = self
            .events
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned()
            .ok_or(ContractError::EventNotFound { event_id })?;

        Ok(Roster {
            event,
            cars: self
                .cars
                .iter()
                .filter(|c| c.event_id == event_id)
                .cloned()
                .collect(),
            results: self
                .results
                .iter()
                .filter(|r| r.event_id == event_id)
                .cloned()
                .collect(),
        })
    }

    pub fn results_by_car(&self, car_id: CarId) -> Vec<RaceResult> {
        self.results
            .iter()
            .filter(|r| r.car_id == car_id)
            .cloned()
            .collect()
    }

    /// Append a result; result ids are unique
    pub fn append_result(&mut self, store: &str, result: &RaceResult) -> Result<(), ContractError> {
        if self.results.iter().any(|r| r.result_id == result.result_id) {
            return Err(ContractError::store_write(
                store,
                format!("result {} already exists", result.result_id),
            ));
        }
        self.results.push(result.clone());
        Ok(())
    }

    pub fn update_car(&mut self, car_id: CarId, update: &CarUpdate) -> Result<(), ContractError> {
        let car = self
            .cars
            .iter_mut()
            .find(|c| c.car_id == car_id)
            .ok_or(ContractError::CarNotFound { car_id })?;
        update.apply(car);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::Achievement;

    fn roster() -> Roster {
        Roster {
            event: RaceEvent {
                event_id: 3,
                name: "Fall Rally".into(),
                multiplier: 2,
            },
            cars: vec![Car::new(1, "Zoom", 3), Car::new(2, "Dash", 3)],
            results: Vec::new(),
        }
    }

    fn result(result_id: u64, car_id: CarId) -> RaceResult {
        RaceResult {
            result_id,
            car_id,
            event_id: 3,
            lane: 0,
            time: 3.3,
            place: 1,
            date: Utc::now(),
        }
    }

    #[test]
    fn test_seed_is_idempotent() {
        let mut doc = StoreDocument::default();
        doc.seed(&roster());
        doc.update_car(1, &CarUpdate::achievements(vec![Achievement::PiCar]))
            .unwrap();
        doc.seed(&roster());

        assert_eq!(doc.events.len(), 1);
        assert_eq!(doc.cars.len(), 2);
        // existing record is kept
        assert!(doc.cars[0].has_achievement(Achievement::PiCar));
    }

    #[test]
    fn test_duplicate_result_id_rejected() {
        let mut doc = StoreDocument::default();
        doc.seed(&roster());
        doc.append_result("t", &result(1, 1)).unwrap();
        assert!(doc.append_result("t", &result(1, 2)).is_err());
        assert_eq!(doc.results_by_car(1).len(), 1);
    }

    #[test]
    fn test_unknown_event_and_car() {
        let mut doc = StoreDocument::default();
        doc.seed(&roster());
        assert!(doc.roster(99).is_err());
        assert!(doc.update_car(42, &CarUpdate::defer_permanently()).is_err());
        assert_eq!(doc.roster(3).unwrap().cars.len(), 2);
    }
}
