//! Race clock and time sources.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::Instant;

/// Where the engine reads "now" from
///
/// Monotonic milliseconds drive timing; wall clock only stamps results.
pub trait TimeSource: Send + Sync {
    /// Monotonic milliseconds since an arbitrary origin
    fn now_ms(&self) -> u64;

    /// Wall clock
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Tokio-backed time source
///
/// Follows `tokio::time::pause` in tests.
#[derive(Debug, Clone)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven time source for deterministic tests and replays
#[derive(Debug)]
pub struct ManualTimeSource {
    now_ms: AtomicU64,
    epoch: DateTime<Utc>,
}

impl ManualTimeSource {
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            now_ms: AtomicU64::new(0),
            epoch,
        }
    }

    /// Move time forward
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.epoch + ChronoDuration::milliseconds(self.now_ms() as i64)
    }
}

/// Race clock
///
/// Tracks gate release and the generation the tick loop was armed for.
/// Ticks from any other generation, or while stopped, are stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceClock {
    started_at_ms: Option<u64>,
    generation: u64,
    running: bool,
}

impl RaceClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing from `now_ms` for one race generation
    pub fn start(&mut self, now_ms: u64, generation: u64) {
        self.started_at_ms = Some(now_ms);
        self.generation = generation;
        self.running = true;
    }

    /// Stop the tick loop; elapsed time is kept until the next start
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Forget the last race entirely
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    /// Milliseconds since start
    pub fn elapsed_ms(&self, now_ms: u64) -> Option<u64> {
        self.started_at_ms.map(|t| now_ms.saturating_sub(t))
    }

    /// Whether a tick armed for `generation` is still current
    pub fn accepts_tick(&self, generation: u64) -> bool {
        self.running && self.generation == generation
    }
}
