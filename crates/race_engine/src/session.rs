//! RaceSession - mutable state of the race currently on the track.

use contracts::{Achievement, CarId, Lane, RaceStanding, RaceStatus, DNF_TIME};

/// A finish to record: lane, car and display name
#[derive(Debug, Clone, PartialEq)]
pub struct Finisher {
    pub lane: Lane,
    pub car_id: CarId,
    pub name: String,
}

/// Per-race state, reset on every advance
///
/// Invariant: `race_times[lane] != 0` exactly when `standings_this_race`
/// holds an entry for `lane`.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceSession {
    pub status: RaceStatus,
    /// Monotonic ms at gate release
    pub gate_release_ms: Option<u64>,
    /// Finish time per lane, 0 while unfinished
    race_times: Vec<f64>,
    /// Finish order
    standings_this_race: Vec<RaceStanding>,
    /// Badges per lane, `None` until evaluated
    achievements_this_race: Vec<Option<Vec<Achievement>>>,
    pub gate_ready: bool,
    pub recovery_ready: bool,
    /// Elapsed ms at the moment the race ended
    pub final_elapsed_ms: Option<u64>,
}

impl RaceSession {
    pub fn new(lanes: usize) -> Self {
        Self {
            status: RaceStatus::Ready,
            gate_release_ms: None,
            race_times: vec![0.0; lanes],
            standings_this_race: Vec::new(),
            achievements_this_race: vec![None; lanes],
            gate_ready: false,
            recovery_ready: false,
            final_elapsed_ms: None,
        }
    }

    /// Back to an armed race; the gate flag carries over
    pub fn reset(&mut self) {
        let lanes = self.race_times.len();
        self.status = RaceStatus::Ready;
        self.gate_release_ms = None;
        self.race_times = vec![0.0; lanes];
        self.standings_this_race.clear();
        self.achievements_this_race = vec![None; lanes];
        self.recovery_ready = false;
        self.final_elapsed_ms = None;
    }

    pub fn lane_count(&self) -> usize {
        self.race_times.len()
    }

    /// Finish time of a lane, 0 while unfinished
    pub fn time(&self, lane: Lane) -> f64 {
        self.race_times.get(lane).copied().unwrap_or(0.0)
    }

    pub fn is_finished(&self, lane: Lane) -> bool {
        self.time(lane) != 0.0
    }

    pub fn standings(&self) -> &[RaceStanding] {
        &self.standings_this_race
    }

    pub fn standing_for(&self, lane: Lane) -> Option<&RaceStanding> {
        self.standings_this_race.iter().find(|s| s.lane == lane)
    }

    pub fn achievements(&self, lane: Lane) -> Option<&[Achievement]> {
        self.achievements_this_race
            .get(lane)
            .and_then(|a| a.as_deref())
    }

    /// Record the first finish of a lane
    ///
    /// Returns `None` (and changes nothing) for a lane that already finished,
    /// an out-of-range lane or a non-positive time.
    pub fn record_finish(&mut self, finisher: Finisher, time: f64) -> Option<&RaceStanding> {
        if self.is_finished(finisher.lane) || finisher.lane >= self.lane_count() || time <= 0.0 {
            return None;
        }

        let place = self.standings_this_race.len() as u32 + 1;
        let leader = self.standings_this_race.first().map_or(time, |s| s.time);
        self.race_times[finisher.lane] = time;
        self.standings_this_race.push(RaceStanding {
            lane: finisher.lane,
            car_id: finisher.car_id,
            name: finisher.name,
            place,
            time,
            delta_time: time - leader,
        });
        self.standings_this_race.last()
    }

    /// Mark every given unfinished lane DNF with one shared place
    ///
    /// Returns how many lanes were marked.
    pub fn assign_dnf(&mut self, unfinished: Vec<Finisher>) -> usize {
        let place = self.standings_this_race.len() as u32 + 1;
        let leader = self.standings_this_race.first().map(|s| s.time);
        let mut marked = 0;

        for finisher in unfinished {
            if self.is_finished(finisher.lane) || finisher.lane >= self.lane_count() {
                continue;
            }
            self.race_times[finisher.lane] = DNF_TIME;
            self.standings_this_race.push(RaceStanding {
                lane: finisher.lane,
                car_id: finisher.car_id,
                name: finisher.name,
                place,
                time: DNF_TIME,
                delta_time: DNF_TIME - leader.unwrap_or(DNF_TIME),
            });
            marked += 1;
        }
        marked
    }

    pub fn set_achievements(&mut self, lane: Lane, achievements: Vec<Achievement>) {
        if let Some(slot) = self.achievements_this_race.get_mut(lane) {
            *slot = Some(achievements);
        }
    }

    /// Every finished lane has its badges evaluated
    pub fn achievements_ready(&self) -> bool {
        self.standings_this_race
            .iter()
            .all(|s| self.achievements(s.lane).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn finisher(lane: Lane) -> Finisher {
        Finisher {
            lane,
            car_id: lane as u64 + 1,
            name: format!("car {lane}"),
        }
    }

    #[test]
    fn test_first_trigger_wins() {
        let mut session = RaceSession::new(3);
        assert!(session.record_finish(finisher(1), 3.1).is_some());
        assert!(session.record_finish(finisher(1), 3.4).is_none());
        assert_abs_diff_eq!(session.time(1), 3.1);
        assert_eq!(session.standings().len(), 1);
    }

    #[test]
    fn test_places_and_deltas_follow_finish_order() {
        let mut session = RaceSession::new(3);
        session.record_finish(finisher(2), 2.95);
        let second = session.record_finish(finisher(0), 3.05).cloned().unwrap();
        assert_eq!(second.place, 2);
        assert_abs_diff_eq!(second.delta_time, 0.10, epsilon = 1e-9);
    }

    #[test]
    fn test_dnf_lanes_share_a_place() {
        let mut session = RaceSession::new(4);
        session.record_finish(finisher(3), 3.0);
        let marked = session.assign_dnf(vec![finisher(0), finisher(1), finisher(3)]);
        assert_eq!(marked, 2);

        let dnfs: Vec<&RaceStanding> = session.standings().iter().filter(|s| s.lane != 3).collect();
        assert_eq!(dnfs.len(), 2);
        assert!(dnfs.iter().all(|s| s.place == 2 && s.time == DNF_TIME));
        assert_abs_diff_eq!(dnfs[0].delta_time, 7.0);
        assert_abs_diff_eq!(session.time(0), DNF_TIME);
        assert_eq!(session.time(2), 0.0);
    }

    #[test]
    fn test_reset_keeps_gate_flag() {
        let mut session = RaceSession::new(2);
        session.gate_ready = true;
        session.recovery_ready = true;
        session.status = RaceStatus::Ended;
        session.record_finish(finisher(0), 3.3);
        session.set_achievements(0, vec![]);
        assert!(session.achievements_ready());

        session.reset();
        assert_eq!(session.status, RaceStatus::Ready);
        assert!(session.gate_ready);
        assert!(!session.recovery_ready);
        assert!(session.standings().is_empty());
        assert!(session.achievements(0).is_none());
    }
}
