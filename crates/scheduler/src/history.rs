//! Per-car run statistics derived from result history.

use std::collections::HashMap;

use contracts::{CarId, Lane, RaceResult};

/// Run statistics for one car
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarHistory {
    /// Completed runs (DNFs included)
    pub runs: u32,
    /// Runs per lane
    pub lane_runs: HashMap<Lane, u32>,
    /// Fastest time over every result, DNFs included
    pub best_time: Option<f64>,
}

impl CarHistory {
    pub fn runs_on(&self, lane: Lane) -> u32 {
        self.lane_runs.get(&lane).copied().unwrap_or(0)
    }

    fn record(&mut self, result: &RaceResult) {
        self.runs += 1;
        *self.lane_runs.entry(result.lane).or_default() += 1;
        self.best_time = Some(match self.best_time {
            Some(best) => best.min(result.time),
            None => result.time,
        });
    }
}

/// Index of result history by car
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    cars: HashMap<CarId, CarHistory>,
}

impl RunHistory {
    /// Build from results in any order
    pub fn from_results(results: &[RaceResult]) -> Self {
        let mut cars: HashMap<CarId, CarHistory> = HashMap::new();
        for result in results {
            cars.entry(result.car_id).or_default().record(result);
        }
        Self { cars }
    }

    /// Statistics for one car (empty when it has never run)
    pub fn car(&self, car_id: CarId) -> CarHistory {
        self.cars.get(&car_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(car_id: CarId, lane: Lane, time: f64) -> RaceResult {
        RaceResult {
            result_id: 0,
            car_id,
            event_id: 1,
            lane,
            time,
            place: 1,
            date: Utc::now(),
        }
    }

    #[test]
    fn test_counts_runs_per_lane() {
        let history = RunHistory::from_results(&[
            result(1, 0, 3.1),
            result(1, 2, 10.0),
            result(1, 0, 2.9),
            result(2, 1, 3.3),
        ]);

        let car = history.car(1);
        assert_eq!(car.runs, 3);
        assert_eq!(car.runs_on(0), 2);
        assert_eq!(car.runs_on(1), 0);
        assert_eq!(car.best_time, Some(2.9));

        assert_eq!(history.car(9), CarHistory::default());
    }
}
