//! RaceStateMachine - the single owner of lane assignments and race state.
//!
//! Pure transition function: every [`RaceInput`] yields a list of
//! [`RaceAction`]s for the runner to perform. Nothing here awaits or does I/O.

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    micros_to_seconds, Achievement, BulletinBody, CarId, CarUpdate, CarView, Lane,
    LaneAchievements, LaneAssignment, LaneView, LifecycleSignal, RaceBlueprint, RaceOutcome,
    RaceResult, RaceSnapshot, RaceStatus, ResultId, Roster, SensorEvent, Standing,
};
use observability::metrics;
use scheduler::LaneScheduler;
use scoring::{compute_standings, evaluate, RaceContext};
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{RaceClock, TimeSource};
use crate::session::{Finisher, RaceSession};

/// Engine timing and track layout
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Physical lane count
    pub lanes: usize,
    /// Sorted operational lanes
    pub operational: Vec<Lane>,
    pub tick_interval: Duration,
    /// Unfinished lanes become DNF once this much time has passed
    pub dnf_timeout_ms: u64,
    pub settle_delay: Duration,
}

impl EngineConfig {
    pub fn from_blueprint(blueprint: &RaceBlueprint) -> Self {
        Self {
            lanes: blueprint.track.lanes,
            operational: blueprint.track.operational(),
            tick_interval: Duration::from_millis(blueprint.timing.tick_interval_ms),
            dnf_timeout_ms: blueprint.timing.dnf_timeout_ms,
            settle_delay: Duration::from_millis(blueprint.timing.settle_delay_ms),
        }
    }

    /// Every lane operational with default timing
    pub fn with_lanes(lanes: usize) -> Self {
        Self {
            lanes,
            operational: (0..lanes).collect(),
            tick_interval: Duration::from_millis(50),
            dnf_timeout_ms: 6_000,
            settle_delay: Duration::from_millis(8_000),
        }
    }

    fn is_operational(&self, lane: Lane) -> bool {
        self.operational.contains(&lane)
    }
}

/// Everything the state machine reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum RaceInput {
    /// Event from the track
    Sensor(SensorEvent),
    /// Clock heartbeat armed for one race generation
    Tick { generation: u64 },
    /// Settle delay armed for one race generation has passed
    SettleElapsed { generation: u64 },
    /// Operator: swap racing and on-deck for one lane
    DeferTemporarily { lane: Lane },
    /// Operator: exclude the racing car from all future races
    DeferPermanently { lane: Lane },
    ResultSaved { result_id: ResultId },
    ResultSaveFailed {
        result_id: ResultId,
        car_id: CarId,
        error: String,
    },
    CarUpdated { car_id: CarId },
    CarUpdateFailed { car_id: CarId, error: String },
}

impl RaceInput {
    pub fn kind(&self) -> &'static str {
        match self {
            RaceInput::Sensor(event) => event.kind(),
            RaceInput::Tick { .. } => "tick",
            RaceInput::SettleElapsed { .. } => "settle_elapsed",
            RaceInput::DeferTemporarily { .. } => "defer_temporarily",
            RaceInput::DeferPermanently { .. } => "defer_permanently",
            RaceInput::ResultSaved { .. } => "result_saved",
            RaceInput::ResultSaveFailed { .. } => "result_save_failed",
            RaceInput::CarUpdated { .. } => "car_updated",
            RaceInput::CarUpdateFailed { .. } => "car_update_failed",
        }
    }
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum RaceAction {
    /// Start the periodic tick loop for `generation`
    StartTicker { generation: u64, interval: Duration },
    StopTicker,
    /// Deliver `SettleElapsed { generation }` after `delay`
    ScheduleSettle { generation: u64, delay: Duration },
    /// Persist one result, fire-and-forget
    SaveResult(RaceResult),
    /// Update one car, fire-and-forget
    UpdateCar { car_id: CarId, update: CarUpdate },
    /// Notify the presentation layer
    Broadcast(BulletinBody),
}

/// Race lifecycle state machine
pub struct RaceStateMachine {
    config: EngineConfig,
    scheduler: LaneScheduler,
    time: Arc<dyn TimeSource>,
    /// Read-only store snapshot plus this session's appended results
    roster: Roster,
    lanes: LaneAssignment,
    session: RaceSession,
    clock: RaceClock,
    /// Bumped on every advance
    generation: u64,
    next_result_id: ResultId,
    sensor_ok: Vec<bool>,
    standings: Vec<Standing>,
    unsaved: Vec<ResultId>,
    races_completed: u64,
}

impl RaceStateMachine {
    pub fn new(config: EngineConfig, roster: Roster, time: Arc<dyn TimeSource>) -> Self {
        let next_result_id = roster
            .results
            .iter()
            .map(|r| r.result_id)
            .max()
            .map_or(1, |id| id + 1);
        let standings = compute_standings(&roster.cars, &roster.results);

        Self {
            scheduler: LaneScheduler::new(config.operational.clone()),
            lanes: LaneAssignment::empty(config.lanes),
            session: RaceSession::new(config.lanes),
            sensor_ok: vec![true; config.lanes],
            clock: RaceClock::new(),
            generation: 0,
            next_result_id,
            standings,
            unsaved: Vec::new(),
            races_completed: 0,
            config,
            roster,
            time,
        }
    }

    pub fn status(&self) -> RaceStatus {
        self.session.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn lanes(&self) -> &LaneAssignment {
        &self.lanes
    }

    pub fn session(&self) -> &RaceSession {
        &self.session
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn unsaved_results(&self) -> &[ResultId] {
        &self.unsaved
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Announce the session and fill the lanes
    ///
    /// From an empty assignment two advances are needed: the first only
    /// fills on-deck.
    #[instrument(name = "race_machine_bootstrap", skip(self))]
    pub fn bootstrap(&mut self) -> Vec<RaceAction> {
        let mut actions = vec![RaceAction::Broadcast(BulletinBody::Lifecycle(
            LifecycleSignal::InitializeInstantReplayStream,
        ))];

        if self.lanes.is_empty() {
            self.advance();
            self.advance();
        }

        actions.push(RaceAction::Broadcast(BulletinBody::Lifecycle(
            LifecycleSignal::ShowVideo,
        )));
        actions.push(RaceAction::Broadcast(BulletinBody::StandingsUpdated(
            self.standings.clone(),
        )));
        actions
    }

    /// Apply one input
    #[instrument(
        level = "debug",
        name = "race_machine_handle",
        skip(self, input),
        fields(kind = input.kind(), race = self.generation, status = ?self.session.status)
    )]
    pub fn handle(&mut self, input: RaceInput) -> Vec<RaceAction> {
        let now_ms = self.time.now_ms();

        match input {
            RaceInput::Sensor(event) => self.on_sensor(event, now_ms),
            RaceInput::Tick { generation } => self.on_tick(generation, now_ms),
            RaceInput::SettleElapsed { generation } => self.on_settle_elapsed(generation),
            RaceInput::DeferTemporarily { lane } => self.on_defer_temporarily(lane),
            RaceInput::DeferPermanently { lane } => self.on_defer_permanently(lane),
            RaceInput::ResultSaved { result_id } => {
                metrics::record_result_save(true);
                debug!(result_id, "result saved");
                Vec::new()
            }
            RaceInput::ResultSaveFailed {
                result_id,
                car_id,
                error,
            } => self.on_result_save_failed(result_id, car_id, error),
            RaceInput::CarUpdated { car_id } => {
                metrics::record_car_update(true);
                debug!(car_id, "car updated");
                Vec::new()
            }
            RaceInput::CarUpdateFailed { car_id, error } => {
                metrics::record_car_update(false);
                error!(car_id, error = %error, "car update failed");
                Vec::new()
            }
        }
    }

    /// Current view for the live display
    pub fn snapshot(&self) -> RaceSnapshot {
        let now_ms = self.time.now_ms();
        let elapsed_ms = match self.session.status {
            RaceStatus::Ready => None,
            RaceStatus::Racing => self.clock.elapsed_ms(now_ms),
            RaceStatus::Ended => self.session.final_elapsed_ms,
        };

        let lanes = (0..self.config.lanes)
            .map(|lane| LaneView {
                lane,
                operational: self.config.is_operational(lane),
                racing: self.car_view(self.lanes.racing_in(lane)),
                on_deck: self.car_view(self.lanes.on_deck_in(lane)),
                time: self.session.time(lane),
                place: self.session.standing_for(lane).map(|s| s.place),
                achievements: self.session.achievements(lane).map(<[Achievement]>::to_vec),
                sensor_ok: self.sensor_ok.get(lane).copied().unwrap_or(true),
            })
            .collect();

        RaceSnapshot {
            status: self.session.status,
            generation: self.generation,
            gate_ready: self.session.gate_ready,
            recovery_ready: self.session.recovery_ready,
            elapsed_ms,
            lanes,
            standings_this_race: self.session.standings().to_vec(),
            standings: self.standings.clone(),
            unsaved_results: self.unsaved.clone(),
            races_completed: self.races_completed,
        }
    }

    fn on_sensor(&mut self, event: SensorEvent, now_ms: u64) -> Vec<RaceAction> {
        match event {
            SensorEvent::GateUp => {
                if self.session.gate_ready {
                    return self.ignored("gate_up", "gate already ready");
                }
                self.session.gate_ready = true;
                debug!("gate ready");
                Vec::new()
            }
            SensorEvent::GateDown => self.on_gate_released(now_ms),
            SensorEvent::LaneTrigger {
                lane,
                timestamp_micros,
            } => self.on_lane_trigger(lane, timestamp_micros),
            SensorEvent::SensorHealth { lane, healthy } => {
                let Some(slot) = self.sensor_ok.get_mut(lane) else {
                    return self.ignored("sensor_health", "lane out of range");
                };
                if *slot != healthy {
                    if healthy {
                        info!(lane, "finish sensor recovered");
                    } else {
                        warn!(lane, "finish sensor unhealthy");
                    }
                }
                *slot = healthy;
                metrics::record_sensor_health(lane, healthy);
                Vec::new()
            }
        }
    }

    fn on_gate_released(&mut self, now_ms: u64) -> Vec<RaceAction> {
        if self.session.status != RaceStatus::Ready {
            return self.ignored("gate_down", "not ready");
        }
        if !self.session.gate_ready {
            return self.ignored("gate_down", "gate not armed");
        }
        if self.occupied_lanes().next().is_none() {
            return self.ignored("gate_down", "no cars staged");
        }

        self.session.status = RaceStatus::Racing;
        self.session.gate_release_ms = Some(now_ms);
        self.session.gate_ready = false;
        self.session.recovery_ready = false;
        self.clock.start(now_ms, self.generation);
        metrics::record_race_started();
        info!(race = self.generation, "gate released");

        vec![
            RaceAction::StartTicker {
                generation: self.generation,
                interval: self.config.tick_interval,
            },
            RaceAction::Broadcast(BulletinBody::Lifecycle(LifecycleSignal::StartRecording)),
        ]
    }

    fn on_lane_trigger(&mut self, lane: Lane, timestamp_micros: u64) -> Vec<RaceAction> {
        if self.session.status != RaceStatus::Racing {
            return self.ignored("lane_trigger", "not racing");
        }
        if !self.config.is_operational(lane) {
            return self.ignored("lane_trigger", "lane not operational");
        }
        let Some(car_id) = self.lanes.racing_in(lane) else {
            return self.ignored("lane_trigger", "empty lane");
        };
        if self.session.is_finished(lane) {
            metrics::record_lane_trigger(lane, true);
            debug!(lane, car_id, "duplicate trigger ignored");
            return Vec::new();
        }

        let time = micros_to_seconds(timestamp_micros);
        let finisher = Finisher {
            lane,
            car_id,
            name: self.car_name(car_id),
        };
        let place = self.session.record_finish(finisher, time).map(|s| s.place);
        match place {
            Some(place) => {
                metrics::record_lane_trigger(lane, false);
                info!(lane, car_id, time, place, "lane finished");
                Vec::new()
            }
            None => self.ignored("lane_trigger", "zero time"),
        }
    }

    fn on_tick(&mut self, generation: u64, now_ms: u64) -> Vec<RaceAction> {
        if !self.clock.accepts_tick(generation) {
            return self.ignored("tick", "stale generation");
        }

        match self.session.status {
            RaceStatus::Ready => self.ignored("tick", "not running"),
            RaceStatus::Racing => self.tick_racing(now_ms),
            RaceStatus::Ended => self.tick_ended(),
        }
    }

    fn tick_racing(&mut self, now_ms: u64) -> Vec<RaceAction> {
        let elapsed_ms = self.clock.elapsed_ms(now_ms).unwrap_or(0);

        if elapsed_ms > self.config.dnf_timeout_ms {
            let unfinished: Vec<Finisher> = self
                .occupied_lanes()
                .filter(|(lane, _)| !self.session.is_finished(*lane))
                .map(|(lane, car_id)| Finisher {
                    lane,
                    car_id,
                    name: self.car_name(car_id),
                })
                .collect();
            if !unfinished.is_empty() {
                let marked = self.session.assign_dnf(unfinished);
                warn!(race = self.generation, lanes = marked, elapsed_ms, "DNF assigned");
            }
        }

        if !self.race_complete() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        let results = self.build_results();
        let achievements = self.evaluate_achievements(&mut actions);
        if self.session.achievements_ready() {
            self.enter_ended(results, achievements, elapsed_ms, &mut actions);
        }
        actions
    }

    fn tick_ended(&mut self) -> Vec<RaceAction> {
        if !(self.session.gate_ready && self.session.recovery_ready) {
            return Vec::new();
        }

        self.clock.stop();
        self.advance();
        vec![
            RaceAction::StopTicker,
            RaceAction::Broadcast(BulletinBody::Lifecycle(LifecycleSignal::ShowVideo)),
        ]
    }

    fn on_settle_elapsed(&mut self, generation: u64) -> Vec<RaceAction> {
        if generation != self.generation || self.session.status != RaceStatus::Ended {
            return self.ignored("settle_elapsed", "stale generation");
        }
        self.session.recovery_ready = true;
        debug!(race = generation, "recovery ready");
        Vec::new()
    }

    fn on_defer_temporarily(&mut self, lane: Lane) -> Vec<RaceAction> {
        if self.session.status != RaceStatus::Ready {
            return self.ignored("defer_temporarily", "not ready");
        }
        if lane >= self.lanes.lane_count() {
            return self.ignored("defer_temporarily", "lane out of range");
        }
        self.lanes.swap_lane(lane);
        info!(
            lane,
            racing = ?self.lanes.racing_in(lane),
            on_deck = ?self.lanes.on_deck_in(lane),
            "lane deferred temporarily"
        );
        Vec::new()
    }

    fn on_defer_permanently(&mut self, lane: Lane) -> Vec<RaceAction> {
        if self.session.status != RaceStatus::Ready {
            return self.ignored("defer_permanently", "not ready");
        }
        let Some(car_id) = self.lanes.racing_in(lane) else {
            return self.ignored("defer_permanently", "empty lane");
        };

        if let Some(car) = self.roster.cars.iter_mut().find(|c| c.car_id == car_id) {
            car.deferred = true;
        }
        info!(lane, car_id, "car deferred permanently");

        let actions = vec![RaceAction::UpdateCar {
            car_id,
            update: CarUpdate::defer_permanently(),
        }];
        self.advance();
        actions
    }

    fn on_result_save_failed(
        &mut self,
        result_id: ResultId,
        car_id: CarId,
        error: String,
    ) -> Vec<RaceAction> {
        metrics::record_result_save(false);
        error!(result_id, car_id, error = %error, "result not saved");
        if !self.unsaved.contains(&result_id) {
            self.unsaved.push(result_id);
        }
        vec![RaceAction::Broadcast(BulletinBody::ResultUnsaved {
            result_id,
            car_id,
            error,
        })]
    }

    /// Promote on-deck, refill on-deck and arm a fresh race
    fn advance(&mut self) {
        self.lanes = self.scheduler.advance(
            &self.lanes,
            &self.roster.cars,
            &self.roster.results,
            &self.roster.event,
        );
        self.generation += 1;
        self.session.reset();
        self.clock.reset();
        info!(
            race = self.generation,
            racing = ?self.lanes.racing,
            on_deck = ?self.lanes.on_deck,
            "advanced"
        );
    }

    /// Every occupied operational lane has a time
    fn race_complete(&self) -> bool {
        self.occupied_lanes()
            .all(|(lane, _)| self.session.is_finished(lane))
    }

    /// One result per finish record, appended to the local history
    fn build_results(&mut self) -> Vec<RaceResult> {
        let date = self.time.now_utc();
        let event_id = self.roster.event.event_id;
        let mut results = Vec::with_capacity(self.session.standings().len());

        for standing in self.session.standings() {
            results.push(RaceResult {
                result_id: self.next_result_id,
                car_id: standing.car_id,
                event_id,
                lane: standing.lane,
                time: standing.time,
                place: standing.place,
                date,
            });
            self.next_result_id += 1;
        }

        self.roster.results.extend(results.iter().cloned());
        results
    }

    fn evaluate_achievements(&mut self, actions: &mut Vec<RaceAction>) -> Vec<LaneAchievements> {
        let earned: Vec<(Lane, CarId, Vec<Achievement>)> = {
            let ctx = RaceContext {
                standings_this_race: self.session.standings(),
                event: &self.roster.event,
                number_of_lanes: self.config.operational.len(),
            };
            self.session
                .standings()
                .iter()
                .map(|s| match self.roster.car(s.car_id) {
                    Some(car) => {
                        let history = self.roster.results_for(s.car_id);
                        (s.lane, s.car_id, evaluate(s.lane, car, &history, &ctx))
                    }
                    None => {
                        warn!(lane = s.lane, car_id = s.car_id, "car missing from roster");
                        (s.lane, s.car_id, Vec::new())
                    }
                })
                .collect()
        };

        let mut lane_achievements = Vec::new();
        for (lane, car_id, badges) in earned {
            self.session.set_achievements(lane, badges.clone());
            if badges.is_empty() {
                continue;
            }
            if let Some(car) = self.roster.cars.iter_mut().find(|c| c.car_id == car_id) {
                car.award(&badges);
            }
            actions.push(RaceAction::UpdateCar {
                car_id,
                update: CarUpdate::achievements(badges.clone()),
            });
            lane_achievements.push(LaneAchievements {
                lane,
                car_id,
                achievements: badges,
            });
        }
        lane_achievements
    }

    fn enter_ended(
        &mut self,
        results: Vec<RaceResult>,
        achievements: Vec<LaneAchievements>,
        elapsed_ms: u64,
        actions: &mut Vec<RaceAction>,
    ) {
        self.session.status = RaceStatus::Ended;
        self.session.final_elapsed_ms = Some(elapsed_ms);
        self.races_completed += 1;

        actions.extend(results.iter().cloned().map(RaceAction::SaveResult));

        self.standings = compute_standings(&self.roster.cars, &self.roster.results);
        metrics::record_standings_size(self.standings.len());

        let outcome = RaceOutcome {
            generation: self.generation,
            results,
            standings_this_race: self.session.standings().to_vec(),
            achievements,
        };
        metrics::record_race_completed(&outcome, elapsed_ms);
        info!(
            race = self.generation,
            results = outcome.results.len(),
            elapsed_ms,
            "race ended"
        );

        actions.push(RaceAction::Broadcast(BulletinBody::Lifecycle(
            LifecycleSignal::StopRecording,
        )));
        actions.push(RaceAction::Broadcast(BulletinBody::Lifecycle(
            LifecycleSignal::ShowInstantReplay,
        )));
        actions.push(RaceAction::Broadcast(BulletinBody::RaceCompleted(outcome)));
        actions.push(RaceAction::Broadcast(BulletinBody::StandingsUpdated(
            self.standings.clone(),
        )));
        actions.push(RaceAction::ScheduleSettle {
            generation: self.generation,
            delay: self.config.settle_delay,
        });
    }

    /// Operational lanes with a racing car
    fn occupied_lanes(&self) -> impl Iterator<Item = (Lane, CarId)> + '_ {
        self.config
            .operational
            .iter()
            .filter_map(|&lane| self.lanes.racing_in(lane).map(|car_id| (lane, car_id)))
    }

    fn car_name(&self, car_id: CarId) -> String {
        self.roster
            .car(car_id)
            .map_or_else(|| format!("car {car_id}"), |c| c.name.clone())
    }

    fn car_view(&self, car_id: Option<CarId>) -> Option<CarView> {
        let car_id = car_id?;
        Some(match self.roster.car(car_id) {
            Some(car) => CarView {
                car_id,
                name: car.name.clone(),
                nickname: car.nickname.clone(),
            },
            None => CarView {
                car_id,
                name: format!("car {car_id}"),
                nickname: None,
            },
        })
    }

    fn ignored(&self, kind: &'static str, reason: &'static str) -> Vec<RaceAction> {
        metrics::record_ignored_input(kind);
        debug!(kind, reason, status = ?self.session.status, "input ignored");
        Vec::new()
    }
}
