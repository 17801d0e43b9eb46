//! Replay source
//!
//! Plays back a JSON-lines recording of `{"at_ms": .., "event": {..}}`
//! records, keeping the original spacing scaled by a speed multiplier.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{SensorEventCallback, SensorSource, TimedSensorEvent};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};

/// Parse a JSON-lines recording
///
/// Blank lines and lines starting with `#` are skipped. Records must be in
/// non-decreasing `at_ms` order.
pub fn parse_recording(path: &Path, text: &str) -> Result<Vec<TimedSensorEvent>> {
    let mut events: Vec<TimedSensorEvent> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: TimedSensorEvent =
            serde_json::from_str(line).map_err(|e| IngestionError::RecordingFormat {
                path: path.to_path_buf(),
                line: idx + 1,
                message: e.to_string(),
            })?;

        if let Some(last) = events.last() {
            if record.at_ms < last.at_ms {
                return Err(IngestionError::RecordingFormat {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message: format!("at_ms {} goes backwards", record.at_ms),
                });
            }
        }
        events.push(record);
    }

    Ok(events)
}

/// Load a recording from disk
pub async fn load_recording(path: impl AsRef<Path>) -> Result<Vec<TimedSensorEvent>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IngestionError::RecordingRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    parse_recording(path, &text)
}

/// Sensor source replaying a recording
pub struct ReplaySource {
    source_id: String,
    path: PathBuf,
    events: Arc<Vec<TimedSensorEvent>>,
    speed: f64,
    looping: bool,
    listening: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReplaySource {
    /// Load `path` for replay at `speed` (2.0 plays twice as fast)
    pub async fn open(path: impl AsRef<Path>, speed: f64, looping: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let events = load_recording(&path).await?;
        info!(path = %path.display(), events = events.len(), speed, looping, "recording loaded");
        Ok(Self::from_events(path, events, speed, looping))
    }

    pub fn from_events(
        path: impl Into<PathBuf>,
        events: Vec<TimedSensorEvent>,
        speed: f64,
        looping: bool,
    ) -> Self {
        let path = path.into();
        Self {
            source_id: format!("replay:{}", path.display()),
            path,
            events: Arc::new(events),
            speed,
            looping,
            listening: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl SensorSource for ReplaySource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: SensorEventCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!(source_id = %self.source_id, "replay already listening");
            return;
        }

        let source_id = self.source_id.clone();
        let events = self.events.clone();
        let speed = self.speed;
        let looping = self.looping && !events.is_empty();
        let listening = self.listening.clone();

        let handle = tokio::spawn(async move {
            let mut pass = 0u64;
            loop {
                pass += 1;
                debug!(source_id = %source_id, pass, "replay pass started");
                let start = Instant::now();

                for timed in events.iter() {
                    let offset = Duration::from_secs_f64(timed.at_ms as f64 / 1000.0 / speed);
                    tokio::time::sleep_until(start + offset).await;
                    if !listening.load(Ordering::Relaxed) {
                        break;
                    }
                    callback(timed.event);
                }

                if !looping || !listening.load(Ordering::Relaxed) {
                    break;
                }
            }

            listening.store(false, Ordering::SeqCst);
            info!(source_id = %source_id, passes = pass, "replay finished");
        });

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SensorEvent;
    use std::io::Write;

    const RECORDING: &str = r#"
# two-lane heat
{"at_ms": 0, "event": {"kind": "GATE_UP"}}
{"at_ms": 1500, "event": {"kind": "GATE_DOWN"}}
{"at_ms": 4600, "event": {"kind": "LANE_TRIGGER", "lane": 1, "timestamp_micros": 3100000}}
{"at_ms": 4750, "event": {"kind": "LANE_TRIGGER", "lane": 0, "timestamp_micros": 3250000}}
"#;

    #[test]
    fn test_parse_recording() {
        let events = parse_recording(Path::new("heat.jsonl"), RECORDING).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[1].event, SensorEvent::GateDown);
        assert_eq!(events[3].at_ms, 4750);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let text = "{\"at_ms\": 5, \"event\": {\"kind\": \"GATE_UP\"}}\n{\"at_ms\": 1, \"event\": {\"kind\": \"GATE_DOWN\"}}";
        let err = parse_recording(Path::new("x.jsonl"), text).unwrap_err();
        assert!(matches!(err, IngestionError::RecordingFormat { line: 2, .. }));

        let err = parse_recording(Path::new("x.jsonl"), "not json").unwrap_err();
        assert!(matches!(err, IngestionError::RecordingFormat { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_open_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RECORDING.as_bytes()).unwrap();

        let source = ReplaySource::open(file.path(), 1.0, false).await.unwrap();
        assert_eq!(source.len(), 4);
        assert!(ReplaySource::open("/nonexistent/heat.jsonl", 1.0, false)
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_respects_speed() {
        let events = parse_recording(Path::new("heat.jsonl"), RECORDING).unwrap();
        let source = ReplaySource::from_events("heat.jsonl", events, 2.0, false);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let started = Instant::now();
        source.listen(Arc::new(move |e| {
            let _ = tx.send((Instant::now(), e));
        }));

        let mut received = Vec::new();
        while let Some(item) = rx.recv().await {
            received.push(item);
        }

        assert_eq!(received.len(), 4);
        let (at, last) = received[3];
        assert!(matches!(last, SensorEvent::LaneTrigger { lane: 0, .. }));
        let elapsed_ms = (at - started).as_millis();
        assert!((2375..=2376).contains(&elapsed_ms), "elapsed {elapsed_ms}ms");
        assert!(!source.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_loops_until_stopped() {
        let events = vec![
            TimedSensorEvent {
                at_ms: 0,
                event: SensorEvent::GateUp,
            },
            TimedSensorEvent {
                at_ms: 100,
                event: SensorEvent::GateDown,
            },
        ];
        let source = ReplaySource::from_events("loop.jsonl", events, 1.0, true);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        source.listen(Arc::new(move |e| {
            let _ = tx.send(e);
        }));

        for _ in 0..6 {
            rx.recv().await.unwrap();
        }
        source.stop();
        assert!(!source.is_listening());
    }
}
