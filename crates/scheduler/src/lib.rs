//! # Scheduler
//!
//! Lane scheduler: decides which car runs in which lane next.
//!
//! Pure functions of (cars, results, event, current assignment). There is
//! no hidden state, so the same history always yields the same race order,
//! which lets the schedule be recomputed after a restart.
//!
//! ## Usage
//!
//! ```ignore
//! use scheduler::LaneScheduler;
//!
//! let scheduler = LaneScheduler::new(vec![0, 1, 2, 3]);
//! let mut lanes = LaneAssignment::empty(4);
//!
//! // Two-phase fill: the first advance only fills on-deck
//! lanes = scheduler.advance(&lanes, &cars, &results, &event);
//! lanes = scheduler.advance(&lanes, &cars, &results, &event);
//! ```

mod history;
mod lane_scheduler;

pub use history::{CarHistory, RunHistory};
pub use lane_scheduler::{LaneScheduler, INELIGIBLE_THRESHOLD};
