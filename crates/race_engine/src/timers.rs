//! Timer management for the race runner.
//!
//! Each timer is a tokio task that sleeps and then feeds a [`RaceInput`]
//! back into the runner inbox. Timer inputs carry the race generation they
//! were armed for, so a timer that fires after being replaced is discarded
//! by the state machine.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::machine::RaceInput;

/// Timer slots; at most one task per slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Periodic clock heartbeat
    Tick,
    /// Post-race settle delay
    Settle,
}

/// Manages the runner's timer tasks
pub struct TimerManager {
    timers: HashMap<TimerId, JoinHandle<()>>,
    input_tx: mpsc::Sender<RaceInput>,
}

impl TimerManager {
    pub fn new(input_tx: mpsc::Sender<RaceInput>) -> Self {
        Self {
            timers: HashMap::new(),
            input_tx,
        }
    }

    /// Deliver `input` once after `delay`
    ///
    /// Replaces any timer already in the slot.
    pub fn set_timer(&mut self, id: TimerId, delay: Duration, input: RaceInput) {
        self.cancel_timer(id);

        let input_tx = self.input_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(?id, "timer fired");
            // runner gone means shutdown
            let _ = input_tx.send(input).await;
        });

        self.timers.insert(id, handle);
        debug!(?id, ?delay, "timer set");
    }

    /// Deliver `input` every `period`, first after one period
    pub fn set_interval(&mut self, id: TimerId, period: Duration, input: RaceInput) {
        self.cancel_timer(id);

        let input_tx = self.input_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if input_tx.send(input.clone()).await.is_err() {
                    break;
                }
            }
        });

        self.timers.insert(id, handle);
        debug!(?id, ?period, "interval set");
    }

    /// Cancel a timer; no-op when absent or already fired
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            debug!(?id, "timer cancelled");
        }
    }

    /// Cancel all timers (shutdown)
    pub fn cancel_all(&mut self) {
        for (id, handle) in self.timers.drain() {
            handle.abort();
            trace!(?id, "timer cancelled (shutdown)");
        }
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
