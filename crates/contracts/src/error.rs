//! Layered error definitions
//!
//! Categorized by source: config / store / sensor / sink

use thiserror::Error;

use crate::{CarId, EventId};

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Store Errors =====
    /// Store read error
    #[error("store '{store}' read error: {message}")]
    StoreRead { store: String, message: String },

    /// Store write error
    #[error("store '{store}' write error: {message}")]
    StoreWrite { store: String, message: String },

    /// Unknown event
    #[error("event not found: {event_id}")]
    EventNotFound { event_id: EventId },

    /// Unknown car
    #[error("car not found: {car_id}")]
    CarNotFound { car_id: CarId },

    // ===== Sensor Errors =====
    /// Sensor data decode error
    #[error("sensor decode error for source '{source_id}': {message}")]
    SensorDecode { source_id: String, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create store read error
    pub fn store_read(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreRead {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create store write error
    pub fn store_write(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
