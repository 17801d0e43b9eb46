//! SensorSource trait - Track event source abstraction
//!
//! Decouples the race engine from how track events are produced (mock track,
//! recorded replay, or a hardware bridge feeding raw registers).

use std::sync::Arc;

use crate::SensorEvent;

/// Sensor event callback type
///
/// Uses `Arc` to allow callback sharing across multiple contexts.
pub type SensorEventCallback = Arc<dyn Fn(SensorEvent) + Send + Sync>;

/// Track event source
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn SensorSource> = get_source();
/// source.listen(Arc::new(|event| {
///     println!("track event: {}", event.kind());
/// }));
/// // ... race ...
/// source.stop();
/// ```
pub trait SensorSource: Send + Sync {
    /// Source name
    fn source_id(&self) -> &str;

    /// Register the event callback and start producing
    ///
    /// Repeated calls while listening are idempotent.
    fn listen(&self, callback: SensorEventCallback);

    /// Stop producing events
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
