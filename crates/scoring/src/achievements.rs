//! Achievement evaluation.
//!
//! Time-pattern rules work on whole microseconds so that float noise never
//! decides a badge.

use std::ops::Range;

use contracts::{is_dnf, Achievement, Car, Lane, RaceEvent, RaceResult, RaceStanding};
use tracing::{debug, instrument};

const TOP_1_PERCENT_MICROS: u64 = 2_750_000;
const TOP_5_PERCENT_MICROS: u64 = 2_775_000;
const TOP_10_PERCENT_MICROS: u64 = 2_794_000;
const FUEL_EFFICIENT_MICROS: Range<u64> = 3_500_000..4_000_000;
const OFF_ROAD_MICROS: Range<u64> = 4_000_000..10_000_000;

/// Winning margin below this earns "By a Nose" (micros)
const NOSE_MARGIN_MICROS: u64 = 10_000;
/// Gap to a neighbouring place at most this earns "Photo Finish" (micros)
const PHOTO_FINISH_MICROS: u64 = 1_000;
/// Best-to-worst spread below this earns "Steady Racer" (micros)
const STEADY_SPREAD_MICROS: u64 = 20_000;
/// Best-to-worst spread above this earns "Unpredictable" (micros)
const UNPREDICTABLE_SPREAD_MICROS: u64 = 500_000;

/// Race-wide inputs shared by every lane's evaluation
#[derive(Debug, Clone, Copy)]
pub struct RaceContext<'a> {
    /// Finish records of the race just completed
    pub standings_this_race: &'a [RaceStanding],
    pub event: &'a RaceEvent,
    /// Operational lane count, the place of the last finisher
    pub number_of_lanes: usize,
}

/// Truncate a race time to whole microseconds
pub fn truncate_micros(time: f64) -> u64 {
    (time * 1e6 + 1e-6).floor().max(0.0) as u64
}

/// Badges newly earned by `car` in the race just completed
///
/// `results` are all of the car's results, oldest first; the last one is
/// this race. Badges the car already holds are filtered out.
#[instrument(
    level = "debug",
    name = "achievements_evaluate",
    skip(car, results, ctx),
    fields(car_id = car.car_id, results = results.len())
)]
pub fn evaluate(
    lane: Lane,
    car: &Car,
    results: &[RaceResult],
    ctx: &RaceContext<'_>,
) -> Vec<Achievement> {
    let Some(latest) = results.last() else {
        return Vec::new();
    };

    let mut earned = Vec::new();
    time_badges(latest.time, &mut earned);
    placing_badges(lane, latest, results, ctx, &mut earned);
    history_badges(latest, results, ctx.event, &mut earned);

    earned.retain(|a| !car.has_achievement(*a));
    if !earned.is_empty() {
        debug!(lane, car_id = car.car_id, earned = ?earned, "achievements earned");
    }
    earned
}

fn time_badges(time: f64, earned: &mut Vec<Achievement>) {
    let micros = truncate_micros(time);

    if micros / 1_000 == 2_718 {
        earned.push(Achievement::ECar);
    }
    if micros / 10_000 == 314 {
        earned.push(Achievement::PiCar);
    }
    if micros / 100 == 30_000 {
        earned.push(Achievement::Exactly3Seconds);
    }
    if micros / 100 == 40_000 {
        earned.push(Achievement::Exactly4Seconds);
    }

    if OFF_ROAD_MICROS.contains(&micros) {
        earned.push(Achievement::OffRoadVehicle);
    }
    if FUEL_EFFICIENT_MICROS.contains(&micros) {
        earned.push(Achievement::FuelEfficientVehicle);
    }

    if micros <= TOP_1_PERCENT_MICROS {
        earned.push(Achievement::Top1);
    }
    if micros <= TOP_5_PERCENT_MICROS {
        earned.push(Achievement::Top5);
    }
    if micros <= TOP_10_PERCENT_MICROS {
        earned.push(Achievement::Top10);
    }
}

fn placing_badges(
    lane: Lane,
    latest: &RaceResult,
    results: &[RaceResult],
    ctx: &RaceContext<'_>,
    earned: &mut Vec<Achievement>,
) {
    let standings = ctx.standings_this_race;
    let micros = truncate_micros(latest.time);
    let place = standings
        .iter()
        .find(|s| s.lane == lane)
        .map_or(latest.place, |s| s.place);

    if place == 1 {
        let runner_up = standings.iter().find(|s| s.place == 2);
        if let Some(second) = runner_up {
            if truncate_micros(second.time).saturating_sub(micros) < NOSE_MARGIN_MICROS {
                earned.push(Achievement::ByANose);
            }
        }
    }

    if !is_dnf(latest.time) {
        let close_neighbour = standings.iter().any(|s| {
            s.lane != lane
                && (s.place + 1 == place || s.place == place + 1)
                && truncate_micros(s.time).abs_diff(micros) <= PHOTO_FINISH_MICROS
        });
        if close_neighbour {
            earned.push(Achievement::PhotoFinish);
        }
    }

    let earlier = &results[..results.len() - 1];
    if place == 1
        && earlier
            .iter()
            .any(|r| r.place as usize == ctx.number_of_lanes)
    {
        earned.push(Achievement::ComeFromBehind);
    }
}

fn history_badges(
    latest: &RaceResult,
    results: &[RaceResult],
    event: &RaceEvent,
    earned: &mut Vec<Achievement>,
) {
    let finished: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_dnf())
        .map(|r| truncate_micros(r.time))
        .collect();
    let spread = match (finished.iter().min(), finished.iter().max()) {
        (Some(min), Some(max)) => Some(max - min),
        _ => None,
    };

    let final_race = results.len() == event.multiplier as usize;
    if final_race {
        if results.iter().all(|r| r.place == 2) {
            earned.push(Achievement::SecondEveryTime);
        }
        if spread.is_some_and(|s| s < STEADY_SPREAD_MICROS) {
            earned.push(Achievement::SteadyRacer);
        }
        if results.windows(2).all(|w| w[1].time < w[0].time) {
            earned.push(Achievement::FasterEachRace);
        }
        let latest_micros = truncate_micros(latest.time);
        if !latest.is_dnf() && finished.iter().all(|&t| latest_micros <= t) {
            earned.push(Achievement::FastestLast);
        }
    }

    if spread.is_some_and(|s| s > UNPREDICTABLE_SPREAD_MICROS) {
        earned.push(Achievement::Unpredictable);
    }
}
