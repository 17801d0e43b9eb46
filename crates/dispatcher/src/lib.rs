//! # Dispatcher
//!
//! Bulletin distribution.
//!
//! Responsibilities:
//! - Consume `Bulletin`s published by the race runner
//! - Fan out to every configured sink
//! - Isolate slow sinks so the race never waits on presentation

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{Bulletin, BulletinSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{SinkMetrics, SinkStats};
pub use sinks::{FileSink, LogSink, NetworkSink};
