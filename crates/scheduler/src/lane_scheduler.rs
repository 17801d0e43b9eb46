//! Lane scheduler implementation.

use contracts::{Car, CarId, Lane, LaneAssignment, RaceEvent, RaceResult};
use tracing::{debug, instrument, trace};

use crate::history::{CarHistory, RunHistory};

/// Scores at or above this value mark a car as ineligible for a lane
pub const INELIGIBLE_THRESHOLD: f64 = 9e11;

/// Penalty that pushes a car past [`INELIGIBLE_THRESHOLD`]
const HARD_PENALTY: f64 = 1e12;

/// Weight per completed run (prefer cars that raced less)
const RUN_WEIGHT: f64 = 1e4;

/// Weight per run on the lane being filled (prefer untried lanes)
const LANE_WEIGHT: f64 = 1e5;

/// Deterministic lane scheduler
///
/// Holds only the static track layout; every decision is a pure function of
/// its arguments.
#[derive(Debug, Clone)]
pub struct LaneScheduler {
    /// Sorted operational lanes
    operational: Vec<Lane>,
}

impl LaneScheduler {
    pub fn new(mut operational: Vec<Lane>) -> Self {
        operational.sort_unstable();
        operational.dedup();
        Self { operational }
    }

    pub fn operational_lanes(&self) -> &[Lane] {
        &self.operational
    }

    /// Number of operational lanes
    pub fn lane_count(&self) -> usize {
        self.operational.len()
    }

    /// Pick the next on-deck car for every operational lane
    ///
    /// Returns a vector as long as `racing`. Non-operational lanes and lanes
    /// without an eligible car are `None`. Lanes are filled in ascending
    /// order and a car picked for one lane is ineligible for the rest.
    #[instrument(
        level = "debug",
        name = "scheduler_select",
        skip_all,
        fields(cars = cars.len(), results = results.len())
    )]
    pub fn select_next_on_deck(
        &self,
        cars: &[Car],
        results: &[RaceResult],
        event: &RaceEvent,
        racing: &[Option<CarId>],
        on_deck: &[Option<CarId>],
    ) -> Vec<Option<CarId>> {
        let history = RunHistory::from_results(results);
        let mut taken: Vec<CarId> = racing.iter().chain(on_deck).flatten().copied().collect();
        let mut next = vec![None; racing.len()];

        for &lane in &self.operational {
            let Some(slot) = next.get_mut(lane) else {
                continue;
            };

            let mut best: Option<(CarId, f64)> = None;
            for car in cars {
                let in_progress = racing.contains(&Some(car.car_id));
                let score = self.score(
                    car,
                    &history.car(car.car_id),
                    lane,
                    event,
                    in_progress,
                    taken.contains(&car.car_id),
                );
                trace!(lane, car_id = car.car_id, score, "scored car");
                // strict comparison keeps roster order on ties
                if best.map_or(true, |(_, s)| score < s) {
                    best = Some((car.car_id, score));
                }
            }

            match best {
                Some((car_id, score)) if score < INELIGIBLE_THRESHOLD => {
                    debug!(lane, car_id, score, "car on deck");
                    *slot = Some(car_id);
                    taken.push(car_id);
                }
                _ => debug!(lane, "no eligible car, lane left empty"),
            }
        }

        next
    }

    /// Promote on-deck cars to racing and refill on-deck
    ///
    /// Two calls from an empty assignment are needed to fill both rows.
    pub fn advance(
        &self,
        lanes: &LaneAssignment,
        cars: &[Car],
        results: &[RaceResult],
        event: &RaceEvent,
    ) -> LaneAssignment {
        let racing = lanes.on_deck.clone();
        let cleared = vec![None; racing.len()];
        let on_deck = self.select_next_on_deck(cars, results, event, &racing, &cleared);
        LaneAssignment { racing, on_deck }
    }

    /// Score one car for one lane, lower is better
    fn score(
        &self,
        car: &Car,
        history: &CarHistory,
        lane: Lane,
        event: &RaceEvent,
        in_progress: bool,
        assigned: bool,
    ) -> f64 {
        if car.deferred || assigned {
            return HARD_PENALTY;
        }

        let runs = history.runs;
        let lane_runs = history.runs_on(lane);
        let mut score = 0.0;

        // run once on each lane before twice on any lane
        if lane_runs as usize * self.lane_count() > runs as usize {
            score += HARD_PENALTY;
        }
        if runs + u32::from(in_progress) >= event.multiplier {
            score += HARD_PENALTY;
        }

        score += RUN_WEIGHT * f64::from(runs);
        score += LANE_WEIGHT * f64::from(lane_runs);
        score -= history.best_time.unwrap_or(0.0);
        score
    }
}
