//! Event-wide standings.

use contracts::{is_dnf, Car, RaceResult, Standing};
use tracing::debug;

/// Rank cars by their best finishing time
///
/// Cars without a finishing (non-DNF) result are left out. Equal times keep
/// roster order. `delta_time` is measured against the event's best time.
pub fn compute_standings(cars: &[Car], results: &[RaceResult]) -> Vec<Standing> {
    let mut bests: Vec<(&Car, f64)> = cars
        .iter()
        .filter_map(|car| {
            results
                .iter()
                .filter(|r| r.car_id == car.car_id && !is_dnf(r.time))
                .map(|r| r.time)
                .min_by(f64::total_cmp)
                .map(|best| (car, best))
        })
        .collect();

    // sort_by is stable
    bests.sort_by(|a, b| a.1.total_cmp(&b.1));

    let leader = bests.first().map(|(_, t)| *t).unwrap_or(0.0);
    let standings: Vec<Standing> = bests
        .into_iter()
        .enumerate()
        .map(|(i, (car, time))| Standing {
            place: i as u32 + 1,
            car_id: car.car_id,
            car_name: car.name.clone(),
            nickname: car.nickname.clone(),
            time,
            delta_time: time - leader,
        })
        .collect();

    debug!(ranked = standings.len(), cars = cars.len(), "standings computed");
    standings
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::Utc;
    use contracts::CarId;

    fn result(car_id: CarId, time: f64) -> RaceResult {
        RaceResult {
            result_id: 0,
            car_id,
            event_id: 1,
            lane: 0,
            time,
            place: 1,
            date: Utc::now(),
        }
    }

    fn cars() -> Vec<Car> {
        vec![
            Car::new(1, "Slowpoke", 1),
            Car::new(2, "Rocket", 1),
            Car::new(3, "Never Finished", 1),
        ]
    }

    #[test]
    fn test_ranks_best_times_and_skips_non_finishers() {
        let results = vec![
            result(1, 2.95),
            result(1, 2.80),
            result(2, 2.70),
            result(2, 10.0),
            result(3, 10.0),
        ];

        let standings = compute_standings(&cars(), &results);
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].car_id, 2);
        assert_eq!(standings[0].place, 1);
        assert_abs_diff_eq!(standings[0].delta_time, 0.0);
        assert_eq!(standings[1].car_id, 1);
        assert_eq!(standings[1].place, 2);
        assert_abs_diff_eq!(standings[1].delta_time, 0.10, epsilon = 1e-9);
    }

    #[test]
    fn test_ties_keep_roster_order() {
        let results = vec![result(2, 3.0), result(1, 3.0)];
        let standings = compute_standings(&cars(), &results);
        let order: Vec<CarId> = standings.iter().map(|s| s.car_id).collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(standings[1].place, 2);
    }

    #[test]
    fn test_empty_history() {
        assert!(compute_standings(&cars(), &[]).is_empty());
    }
}
