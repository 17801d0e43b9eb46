//! Ingestion error types

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Raw track data could not be decoded
    #[error("failed to parse track data from {source_id}: {message}")]
    ParseFailed { source_id: String, message: String },

    /// Recording could not be read
    #[error("failed to read recording {path}: {message}")]
    RecordingRead { path: PathBuf, message: String },

    /// Malformed recording line
    #[error("recording {path} line {line}: {message}")]
    RecordingFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Listener for raw track data could not be opened
    #[error("failed to bind track listener on {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    /// Downstream channel closed
    #[error("channel closed for source {source_id}")]
    ChannelClosed { source_id: String },
}

impl From<IngestionError> for contracts::ContractError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::ParseFailed { source_id, message } => {
                contracts::ContractError::SensorDecode { source_id, message }
            }
            other => contracts::ContractError::Other(other.to_string()),
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
