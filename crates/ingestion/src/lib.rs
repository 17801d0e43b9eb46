//! # Ingestion Pipeline
//!
//! Track event ingestion.
//!
//! Responsibilities:
//! - Decode raw timer-board register blocks into [`SensorEvent`]s
//! - Provide mock and replay sources for running without hardware
//! - Merge every source into one bounded channel, dropping on overflow
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockTrack};
//!
//! let mut pipeline = IngestionPipeline::new(256);
//! pipeline.register_source(Box::new(MockTrack::new("mock", vec![0, 1, 2, 3], config)));
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start_all();
//! while let Ok(event) = rx.recv().await {
//!     handle.try_send(RaceInput::Sensor(event))?;
//! }
//! ```

mod config;
mod error;
mod mock;
mod pipeline;
mod raw;
mod replay;

pub use config::{BackpressureConfig, IngestionMetrics, MetricsSnapshot};
pub use contracts::SensorEvent;
pub use error::{IngestionError, Result};
pub use mock::{plan_race, MockTrack};
pub use pipeline::IngestionPipeline;
pub use raw::{RawTrackFrame, RawTrackSource, TrackDecoder, FRAME_LEN, TRACK_LANES};
pub use replay::{load_recording, parse_recording, ReplaySource};
