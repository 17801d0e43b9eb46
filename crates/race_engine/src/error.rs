//! Race engine errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The runner task is gone
    #[error("race runner is not running")]
    RunnerClosed,

    /// The runner inbox is full
    #[error("race runner inbox full, '{kind}' input dropped")]
    InboxFull { kind: &'static str },

    /// The runner task panicked or was aborted
    #[error("race runner task failed: {0}")]
    RunnerFailed(String),
}
