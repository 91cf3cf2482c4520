//! Broker seam used by the delivery loop.

use async_trait::async_trait;

use crate::error::SourceError;

/// One broker-handed unit of work.
///
/// Owned exclusively by the delivery loop for a single processing cycle and
/// never retained past its terminal ack/reject. A tag from before a
/// reconnect is invalid and must not be acknowledged.
#[derive(Debug, Clone)]
pub struct RawDelivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

/// A queue endpoint that hands out deliveries requiring explicit ack/reject.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Establish the connection and declare the full topology.
    ///
    /// Partial topology from a failed attempt is not usable; the whole step
    /// is redone from scratch on the next call.
    async fn connect(&self) -> Result<(), SourceError>;

    async fn is_connected(&self) -> bool;

    /// Non-blocking poll for a single delivery.
    async fn fetch(&self) -> Result<Option<RawDelivery>, SourceError>;

    async fn ack(&self, delivery_tag: u64) -> Result<(), SourceError>;

    /// Reject without requeue. There is no retry subsystem; requeueing a
    /// failing message would spin it forever.
    async fn reject(&self, delivery_tag: u64) -> Result<(), SourceError>;

    /// Close channel then connection, tolerating either already being closed.
    async fn close(&self) -> Result<(), SourceError>;
}
