//! Race metrics collection.
//!
//! Thin wrappers over the `metrics` facade plus an in-memory aggregator
//! for the end-of-run summary.

use std::collections::BTreeMap;

use contracts::{Lane, RaceOutcome};
use metrics::{counter, gauge, histogram};

/// Record a completed race
///
/// Called once per race when it enters `ENDED`.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_race_completed;
///
/// record_race_completed(&outcome, elapsed_ms);
/// ```
pub fn record_race_completed(outcome: &RaceOutcome, elapsed_ms: u64) {
    counter!("race_timer_races_completed_total").increment(1);
    gauge!("race_timer_last_generation").set(outcome.generation as f64);
    histogram!("race_timer_race_duration_ms").record(elapsed_ms as f64);

    let dnfs = outcome.results.iter().filter(|r| r.is_dnf()).count();
    if dnfs > 0 {
        counter!("race_timer_dnf_total").increment(dnfs as u64);
    }

    if let Some(winner) = outcome.standings_this_race.first() {
        if winner.time < contracts::DNF_TIME {
            histogram!("race_timer_winning_time_seconds").record(winner.time);
        }
    }

    for lane in &outcome.achievements {
        for badge in &lane.achievements {
            counter!("race_timer_achievements_total", "badge" => badge.label())
                .increment(1);
        }
    }
}

/// Record a gate release
pub fn record_race_started() {
    counter!("race_timer_races_started_total").increment(1);
}

/// Record a finish-sensor trigger
pub fn record_lane_trigger(lane: Lane, duplicate: bool) {
    let lane = lane.to_string();
    if duplicate {
        counter!("race_timer_duplicate_triggers_total", "lane" => lane).increment(1);
    } else {
        counter!("race_timer_lane_triggers_total", "lane" => lane).increment(1);
    }
}

/// Record an input the state machine ignored
pub fn record_ignored_input(kind: &'static str) {
    counter!("race_timer_ignored_inputs_total", "kind" => kind).increment(1);
}

/// Record a result persistence outcome
pub fn record_result_save(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("race_timer_result_saves_total", "status" => status).increment(1);
}

/// Record a car update outcome
pub fn record_car_update(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("race_timer_car_updates_total", "status" => status).increment(1);
}

/// Record a finish sensor health change
pub fn record_sensor_health(lane: Lane, healthy: bool) {
    gauge!("race_timer_sensor_healthy", "lane" => lane.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a sensor event received from a source
pub fn record_sensor_event(source_id: &str, kind: &str) {
    counter!(
        "race_timer_sensor_events_total",
        "source" => source_id.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record bulletin dispatch
pub fn record_bulletin_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "race_timer_bulletins_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record event-wide standings size
pub fn record_standings_size(ranked: usize) {
    gauge!("race_timer_standings_ranked").set(ranked as f64);
}

/// Race metrics aggregator
///
/// Aggregates in memory for the run summary.
#[derive(Debug, Clone, Default)]
pub struct RaceMetricsAggregator {
    /// Races completed
    pub races: u64,

    /// Results produced (one per occupied lane)
    pub results: u64,

    /// DNF results
    pub dnfs: u64,

    /// Results whose save failed
    pub unsaved: u64,

    /// Winning time statistics (seconds, finishers only)
    pub winning_time: RunningStats,

    /// Per-result time statistics (seconds, finishers only)
    pub finish_time: RunningStats,

    /// Badge counts
    pub achievements: BTreeMap<String, u64>,
}

impl RaceMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a completed race
    pub fn update(&mut self, outcome: &RaceOutcome) {
        self.races += 1;
        self.results += outcome.results.len() as u64;

        for result in &outcome.results {
            if result.is_dnf() {
                self.dnfs += 1;
            } else {
                self.finish_time.push(result.time);
            }
        }

        if let Some(winner) = outcome.standings_this_race.first() {
            if winner.time < contracts::DNF_TIME {
                self.winning_time.push(winner.time);
            }
        }

        for lane in &outcome.achievements {
            for badge in &lane.achievements {
                *self.achievements.entry(badge.label().to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Count a failed result save
    pub fn record_unsaved(&mut self) {
        self.unsaved += 1;
    }

    /// Build summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            races: self.races,
            results: self.results,
            dnfs: self.dnfs,
            unsaved: self.unsaved,
            dnf_rate: if self.results > 0 {
                self.dnfs as f64 / self.results as f64 * 100.0
            } else {
                0.0
            },
            winning_time: StatsSummary::from(&self.winning_time),
            finish_time: StatsSummary::from(&self.finish_time),
            achievements: self.achievements.clone(),
        }
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub races: u64,
    pub results: u64,
    pub dnfs: u64,
    pub unsaved: u64,
    pub dnf_rate: f64,
    pub winning_time: StatsSummary,
    pub finish_time: StatsSummary,
    pub achievements: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Race Metrics Summary ===")?;
        writeln!(f, "Races completed: {}", self.races)?;
        writeln!(f, "Results: {}", self.results)?;
        writeln!(f, "DNFs: {} ({:.2}%)", self.dnfs, self.dnf_rate)?;
        writeln!(f, "Unsaved results: {}", self.unsaved)?;
        writeln!(f, "Winning time (s): {}", self.winning_time)?;
        writeln!(f, "Finish time (s): {}", self.finish_time)?;

        if !self.achievements.is_empty() {
            writeln!(f, "Achievements:")?;
            for (badge, count) in &self.achievements {
                writeln!(f, "  {}: {}", badge, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{Achievement, LaneAchievements, RaceResult, RaceStanding};

    fn outcome() -> RaceOutcome {
        let result = |lane: Lane, time: f64, place: u32| RaceResult {
            result_id: lane as u64 + 1,
            car_id: lane as u64 + 100,
            event_id: 1,
            lane,
            time,
            place,
            date: Utc::now(),
        };
        let standing = |lane: Lane, time: f64, place: u32| RaceStanding {
            lane,
            car_id: lane as u64 + 100,
            name: format!("car {lane}"),
            place,
            time,
            delta_time: 0.0,
        };
        RaceOutcome {
            generation: 4,
            results: vec![result(1, 2.9, 1), result(0, 3.1, 2), result(2, 10.0, 3)],
            standings_this_race: vec![standing(1, 2.9, 1), standing(0, 3.1, 2), standing(2, 10.0, 3)],
            achievements: vec![LaneAchievements {
                lane: 1,
                car_id: 101,
                achievements: vec![Achievement::Top10],
            }],
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = RaceMetricsAggregator::new();
        aggregator.update(&outcome());
        aggregator.record_unsaved();

        assert_eq!(aggregator.races, 1);
        assert_eq!(aggregator.results, 3);
        assert_eq!(aggregator.dnfs, 1);
        assert_eq!(aggregator.unsaved, 1);
        assert_eq!(aggregator.winning_time.count(), 1);
        assert_eq!(aggregator.finish_time.count(), 2);
        assert_eq!(aggregator.achievements.get("Top 10%"), Some(&1));
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = RaceMetricsAggregator::new();
        aggregator.update(&outcome());

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Races completed: 1"));
        assert!(output.contains("DNFs: 1 (33.33%)"));
        assert!(output.contains("Top 10%: 1"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_race_started();
        record_lane_trigger(2, true);
        record_race_completed(&outcome(), 3100);
    }
}
