//! # Race Engine
//!
//! Race lifecycle core: `READY -> RACING -> ENDED -> READY`.
//!
//! - [`RaceStateMachine`] pure transition function over [`RaceInput`]
//! - [`RaceClock`] gate-release timing and tick generations
//! - [`RaceRunner`] actor that serializes inputs, runs timers and performs
//!   store writes and broadcasts
//!
//! ## Usage
//!
//! ```ignore
//! use race_engine::{EngineConfig, RaceRunner, RaceStateMachine, RunnerConfig, SystemTimeSource};
//!
//! let machine = RaceStateMachine::new(
//!     EngineConfig::from_blueprint(&blueprint),
//!     roster,
//!     Arc::new(SystemTimeSource::new()),
//! );
//! let (handle, task) = RaceRunner::spawn(machine, store, bulletin_tx, RunnerConfig::default());
//!
//! handle.sensor(SensorEvent::GateUp).await?;
//! // ...
//! let report = task.shutdown().await?;
//! ```

mod clock;
mod error;
mod machine;
mod persist;
mod runner;
mod session;
mod timers;

pub use clock::{ManualTimeSource, RaceClock, SystemTimeSource, TimeSource};
pub use error::EngineError;
pub use machine::{EngineConfig, RaceAction, RaceInput, RaceStateMachine};
pub use persist::{PersistHandle, PersistRequest};
pub use runner::{RaceHandle, RaceRunner, RunnerConfig, RunnerReport, RunnerTask};
pub use session::{Finisher, RaceSession};
pub use timers::{TimerId, TimerManager};
