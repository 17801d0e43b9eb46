//! BulletinSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for presentation-side sinks.

use crate::{Bulletin, ContractError};

/// Bulletin output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(BulletinSink: Send)]
pub trait LocalBulletinSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one bulletin
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, bulletin: &Bulletin) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
