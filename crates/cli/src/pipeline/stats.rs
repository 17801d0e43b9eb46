//! Run statistics.

use std::fmt;
use std::time::Duration;

use contracts::ResultId;
use dispatcher::SinkStats;
use ingestion::MetricsSnapshot;
use observability::MetricsSummary;

/// Why the run loop ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// Every sensor source finished
    #[default]
    SourceEnded,
    /// `--max-races` reached
    MaxRaces,
    /// `--timeout` elapsed
    Timeout,
    /// Ctrl+C or SIGTERM
    Signal,
    /// The race runner went away
    RunnerStopped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::SourceEnded => "sensor source finished",
            StopReason::MaxRaces => "race limit reached",
            StopReason::Timeout => "timeout",
            StopReason::Signal => "shutdown signal",
            StopReason::RunnerStopped => "race runner stopped",
        };
        f.write_str(reason)
    }
}

/// Statistics from one `run`
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub stop_reason: StopReason,

    /// Races that reached ENDED
    pub races_completed: u64,

    /// Sensor events handed to the race runner
    pub events_forwarded: u64,

    /// Ingestion channel counters
    pub ingestion: MetricsSnapshot,

    /// Results whose save failed
    pub unsaved_results: Vec<ResultId>,

    pub bulletins_sent: u64,

    /// Bulletins dropped because the dispatcher queue was full
    pub bulletins_dropped: u64,

    /// Per-sink delivery counters
    pub sinks: Vec<(String, SinkStats)>,

    /// Race metrics aggregated by the runner
    pub summary: MetricsSummary,

    pub duration: Duration,
}

impl PipelineStats {
    /// Completed races per hour of wall time
    pub fn races_per_hour(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.races_completed as f64 * 3600.0 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Race Day Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Stopped by: {}", self.stop_reason);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Races completed: {}", self.races_completed);
        println!("   └─ Races per hour: {:.1}", self.races_per_hour());

        println!("\n📡 Sensor Events");
        println!("   ├─ Received: {}", self.ingestion.events_received);
        println!("   ├─ Forwarded: {}", self.events_forwarded);
        println!("   ├─ Dropped: {}", self.ingestion.events_dropped);
        println!("   └─ Parse errors: {}", self.ingestion.parse_errors);

        println!("\n📤 Bulletins");
        println!("   ├─ Sent: {}", self.bulletins_sent);
        println!("   └─ Dropped: {}", self.bulletins_dropped);
        for (name, stats) in &self.sinks {
            println!(
                "      • {}: delivered={} failed={} dropped={} last_seq={}",
                name, stats.delivered, stats.failed, stats.dropped, stats.last_seq
            );
        }

        if !self.unsaved_results.is_empty() {
            println!("\n⚠️  Unsaved results (reconcile manually)");
            println!("   └─ {:?}", self.unsaved_results);
        }

        println!("\n{}", self.summary);
    }
}
