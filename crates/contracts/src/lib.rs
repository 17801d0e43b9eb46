//! # Contracts
//!
//! Frozen interface contracts shared by every race crate.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Race times are seconds (`f64`) measured from gate release
//! - `10.0` is the did-not-finish sentinel (see [`DNF_TIME`])
//! - Engine timers use milliseconds from the runner's monotonic time source

mod achievement;
mod blueprint;
mod bulletin;
mod car;
mod error;
mod lanes;
mod race_event;
mod result;
mod sensor;
mod sensor_source;
mod sink;
mod snapshot;
mod standing;
mod store;

pub use achievement::Achievement;
pub use blueprint::*;
pub use bulletin::*;
pub use car::{Car, CarId};
pub use error::*;
pub use lanes::{Lane, LaneAssignment};
pub use race_event::{EventId, RaceEvent};
pub use result::{is_dnf, RaceResult, ResultId, DNF_TIME};
pub use sensor::*;
pub use sensor_source::{SensorEventCallback, SensorSource};
pub use sink::*;
pub use snapshot::*;
pub use standing::{RaceStanding, Standing};
pub use store::*;
