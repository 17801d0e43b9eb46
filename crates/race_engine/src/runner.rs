//! RaceRunner - actor owning the state machine.
//!
//! All inputs (sensor events, timer fires, operator commands, persistence
//! replies) arrive through one mpsc inbox and are applied one at a time in
//! arrival order. Snapshots are published on a watch channel, bulletins go
//! to the dispatcher.

use std::sync::Arc;

use contracts::{
    Bulletin, BulletinBody, Lane, RaceSnapshot, RaceStatus, ResultId, ResultStore, SensorEvent,
};
use observability::{MetricsSummary, RaceMetricsAggregator};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::EngineError;
use crate::machine::{RaceAction, RaceInput, RaceStateMachine};
use crate::persist::{PersistHandle, PersistRequest};
use crate::timers::{TimerId, TimerManager};

/// Runner tuning
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Inbox capacity
    pub inbox_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 256,
        }
    }
}

/// Cloneable handle for feeding the runner and watching its state
#[derive(Clone)]
pub struct RaceHandle {
    tx: mpsc::Sender<RaceInput>,
    snapshot_rx: watch::Receiver<RaceSnapshot>,
}

impl RaceHandle {
    /// Queue an input, waiting for inbox space
    pub async fn send(&self, input: RaceInput) -> Result<(), EngineError> {
        self.tx
            .send(input)
            .await
            .map_err(|_| EngineError::RunnerClosed)
    }

    /// Queue an input without waiting
    pub fn try_send(&self, input: RaceInput) -> Result<(), EngineError> {
        self.tx.try_send(input).map_err(|e| match e {
            mpsc::error::TrySendError::Full(input) => EngineError::InboxFull { kind: input.kind() },
            mpsc::error::TrySendError::Closed(_) => EngineError::RunnerClosed,
        })
    }

    pub async fn sensor(&self, event: SensorEvent) -> Result<(), EngineError> {
        self.send(RaceInput::Sensor(event)).await
    }

    pub async fn defer_temporarily(&self, lane: Lane) -> Result<(), EngineError> {
        self.send(RaceInput::DeferTemporarily { lane }).await
    }

    pub async fn defer_permanently(&self, lane: Lane) -> Result<(), EngineError> {
        self.send(RaceInput::DeferPermanently { lane }).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> RaceSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// New receiver for snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<RaceSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<RaceSnapshot, EngineError>
    where
        F: FnMut(&RaceSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| EngineError::RunnerClosed)?;
        Ok(snapshot.clone())
    }
}

/// What a runner leaves behind
#[derive(Debug, Clone)]
pub struct RunnerReport {
    pub races_completed: u64,
    pub unsaved_results: Vec<ResultId>,
    pub bulletins_sent: u64,
    pub bulletins_dropped: u64,
    pub summary: MetricsSummary,
    pub final_snapshot: RaceSnapshot,
}

/// Join handle plus shutdown trigger for a spawned runner
pub struct RunnerTask {
    join: JoinHandle<RunnerReport>,
    shutdown_tx: oneshot::Sender<()>,
}

impl RunnerTask {
    /// Stop the runner after finishing queued store writes
    pub async fn shutdown(self) -> Result<RunnerReport, EngineError> {
        // already stopped if the receiver is gone
        let _ = self.shutdown_tx.send(());
        self.join
            .await
            .map_err(|e| EngineError::RunnerFailed(e.to_string()))
    }
}

/// Race runner actor
pub struct RaceRunner {
    machine: RaceStateMachine,
    inbox_rx: mpsc::Receiver<RaceInput>,
    bulletin_tx: mpsc::Sender<Bulletin>,
    snapshot_tx: watch::Sender<RaceSnapshot>,
    timers: TimerManager,
    /// `None` once shutting down
    persist: Option<PersistHandle>,
    aggregator: RaceMetricsAggregator,
    seq: u64,
    bulletins_sent: u64,
    bulletins_dropped: u64,
}

impl RaceRunner {
    /// Spawn the runner; it bootstraps the machine immediately
    pub fn spawn<S>(
        machine: RaceStateMachine,
        store: Arc<S>,
        bulletin_tx: mpsc::Sender<Bulletin>,
        config: RunnerConfig,
    ) -> (RaceHandle, RunnerTask)
    where
        S: ResultStore + Send + Sync + 'static,
    {
        let (tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let runner = Self {
            machine,
            inbox_rx,
            bulletin_tx,
            snapshot_tx,
            timers: TimerManager::new(tx.clone()),
            persist: Some(PersistHandle::spawn(store, tx.clone())),
            aggregator: RaceMetricsAggregator::new(),
            seq: 0,
            bulletins_sent: 0,
            bulletins_dropped: 0,
        };

        let join = tokio::spawn(runner.run(shutdown_rx));
        (RaceHandle { tx, snapshot_rx }, RunnerTask { join, shutdown_tx })
    }

    #[instrument(name = "race_runner_loop", skip_all)]
    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) -> RunnerReport {
        let actions = self.machine.bootstrap();
        self.perform(actions);
        self.publish();
        info!(
            lanes = self.machine.config().lanes,
            race = self.machine.generation(),
            "race runner started"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => {
                    info!("shutdown requested");
                    break;
                }

                Some(input) = self.inbox_rx.recv() => {
                    self.apply(input);
                }
            }
        }

        self.finish().await
    }

    fn apply(&mut self, input: RaceInput) {
        let before = self.machine.status();
        let actions = self.machine.handle(input);
        self.perform(actions);
        self.publish();

        let after = self.machine.status();
        if before != after {
            debug!(from = ?before, to = ?after, race = self.machine.generation(), "status changed");
        }
    }

    fn perform(&mut self, actions: Vec<RaceAction>) {
        for action in actions {
            match action {
                RaceAction::StartTicker {
                    generation,
                    interval,
                } => {
                    self.timers
                        .set_interval(TimerId::Tick, interval, RaceInput::Tick { generation });
                }
                RaceAction::StopTicker => self.timers.cancel_timer(TimerId::Tick),
                RaceAction::ScheduleSettle { generation, delay } => {
                    self.timers.set_timer(
                        TimerId::Settle,
                        delay,
                        RaceInput::SettleElapsed { generation },
                    );
                }
                RaceAction::SaveResult(result) => {
                    let (result_id, car_id) = (result.result_id, result.car_id);
                    if !self.submit(PersistRequest::SaveResult(result)) {
                        error!(result_id, car_id, "persistence worker stopped, result not saved");
                    }
                }
                RaceAction::UpdateCar { car_id, update } => {
                    if !self.submit(PersistRequest::UpdateCar { car_id, update }) {
                        error!(car_id, "persistence worker stopped, car not updated");
                    }
                }
                RaceAction::Broadcast(body) => self.broadcast(body),
            }
        }
    }

    fn submit(&self, request: PersistRequest) -> bool {
        self.persist
            .as_ref()
            .is_some_and(|persist| persist.submit(request))
    }

    fn broadcast(&mut self, body: BulletinBody) {
        match &body {
            BulletinBody::RaceCompleted(outcome) => self.aggregator.update(outcome),
            BulletinBody::ResultUnsaved { .. } => self.aggregator.record_unsaved(),
            BulletinBody::Lifecycle(_) | BulletinBody::StandingsUpdated(_) => {}
        }

        self.seq += 1;
        let bulletin = Bulletin::new(self.seq, body);
        match self.bulletin_tx.try_send(bulletin) {
            Ok(()) => self.bulletins_sent += 1,
            Err(mpsc::error::TrySendError::Full(b)) => {
                self.bulletins_dropped += 1;
                warn!(seq = b.seq, kind = b.kind(), "bulletin queue full, dropped");
            }
            Err(mpsc::error::TrySendError::Closed(b)) => {
                self.bulletins_dropped += 1;
                debug!(seq = b.seq, kind = b.kind(), "bulletin receiver closed");
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.machine.snapshot());
    }

    /// Drain store replies while queued writes finish
    async fn finish(mut self) -> RunnerReport {
        self.timers.cancel_all();

        if let Some(persist) = self.persist.take() {
            let done = persist.shutdown();
            tokio::pin!(done);

            loop {
                tokio::select! {
                    _ = &mut done => break,
                    Some(input) = self.inbox_rx.recv() => self.apply_reply(input),
                }
            }
        }
        while let Ok(input) = self.inbox_rx.try_recv() {
            self.apply_reply(input);
        }

        let final_snapshot = self.machine.snapshot();
        if final_snapshot.status == RaceStatus::Racing {
            warn!(race = final_snapshot.generation, "stopped during a race");
        }
        info!(
            races = final_snapshot.races_completed,
            unsaved = final_snapshot.unsaved_results.len(),
            "race runner stopped"
        );

        RunnerReport {
            races_completed: final_snapshot.races_completed,
            unsaved_results: final_snapshot.unsaved_results.clone(),
            bulletins_sent: self.bulletins_sent,
            bulletins_dropped: self.bulletins_dropped,
            summary: self.aggregator.summary(),
            final_snapshot,
        }
    }

    /// Only persistence outcomes matter once shutting down
    fn apply_reply(&mut self, input: RaceInput) {
        match input {
            RaceInput::ResultSaved { .. }
            | RaceInput::ResultSaveFailed { .. }
            | RaceInput::CarUpdated { .. }
            | RaceInput::CarUpdateFailed { .. } => self.apply(input),
            RaceInput::Sensor(_)
            | RaceInput::Tick { .. }
            | RaceInput::SettleElapsed { .. }
            | RaceInput::DeferTemporarily { .. }
            | RaceInput::DeferPermanently { .. } => {
                debug!(kind = input.kind(), "input dropped during shutdown");
            }
        }
    }
}
