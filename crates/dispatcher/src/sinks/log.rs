//! LogSink - narrates bulletins via tracing

use contracts::{Bulletin, BulletinBody, BulletinSink, ContractError};
use tracing::{info, instrument, warn};

/// Sink that logs a one-line summary per bulletin
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_summary(&self, bulletin: &Bulletin) {
        match &bulletin.body {
            BulletinBody::Lifecycle(signal) => {
                info!(sink = %self.name, seq = bulletin.seq, signal = ?signal, "lifecycle");
            }
            BulletinBody::RaceCompleted(outcome) => {
                let winner = outcome.standings_this_race.first();
                info!(
                    sink = %self.name,
                    seq = bulletin.seq,
                    race = outcome.generation,
                    finishers = outcome.standings_this_race.len(),
                    winner = winner.map(|s| s.name.as_str()).unwrap_or("-"),
                    time = winner.map(|s| s.time).unwrap_or_default(),
                    badges = outcome.achievements.iter().map(|a| a.achievements.len()).sum::<usize>(),
                    "race completed"
                );
            }
            BulletinBody::StandingsUpdated(standings) => {
                info!(
                    sink = %self.name,
                    seq = bulletin.seq,
                    ranked = standings.len(),
                    leader = standings.first().map(|s| s.car_name.as_str()).unwrap_or("-"),
                    "standings updated"
                );
            }
            BulletinBody::ResultUnsaved {
                result_id,
                car_id,
                error,
            } => {
                warn!(
                    sink = %self.name,
                    seq = bulletin.seq,
                    result_id,
                    car_id,
                    error = %error,
                    "result unsaved"
                );
            }
        }
    }
}

impl BulletinSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, bulletin),
        fields(sink = %self.name, seq = bulletin.seq)
    )]
    async fn write(&mut self, bulletin: &Bulletin) -> Result<(), ContractError> {
        self.log_summary(bulletin);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RaceOutcome, RaceStanding};

    #[tokio::test]
    async fn test_log_sink_accepts_every_kind() {
        let mut sink = LogSink::new("console");
        assert_eq!(sink.name(), "console");

        let bodies = vec![
            BulletinBody::Lifecycle(contracts::LifecycleSignal::StopRecording),
            BulletinBody::RaceCompleted(RaceOutcome {
                generation: 2,
                results: vec![],
                standings_this_race: vec![RaceStanding {
                    lane: 1,
                    car_id: 4,
                    name: "Comet".into(),
                    time: 2.9,
                    place: 1,
                    delta_time: 0.0,
                }],
                achievements: vec![],
            }),
            BulletinBody::StandingsUpdated(vec![]),
            BulletinBody::ResultUnsaved {
                result_id: 9,
                car_id: 4,
                error: "disk full".into(),
            },
        ];

        for (seq, body) in bodies.into_iter().enumerate() {
            assert!(sink.write(&Bulletin::new(seq as u64, body)).await.is_ok());
        }
        assert!(sink.close().await.is_ok());
    }
}
