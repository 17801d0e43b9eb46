//! # Scoring
//!
//! Post-race computations, both pure and deterministic:
//! - [`evaluate`] newly earned achievement badges for one car
//! - [`compute_standings`] event-wide best-time ranking

mod achievements;
mod standings;

pub use achievements::{evaluate, truncate_micros, RaceContext};
pub use standings::compute_standings;
