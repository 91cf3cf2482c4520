//! ForgeFlow subscription engine
//!
//! The message consumption core:
//! - Topology: immutable exchange/queue/binding/prefetch descriptor
//! - MessageSource: the broker seam (fetch one delivery, ack/reject by tag)
//! - AmqpConnection: lapin-backed source with reconnect-from-scratch topology
//! - DeliveryLoop: fetch -> decode -> dispatch -> ack/reject, one at a time
//! - Subscriber: lifecycle controller running exactly one worker task

pub mod connection;
pub mod delivery;
pub mod error;
pub mod lifecycle;
pub mod source;
pub mod topology;

pub use connection::{AmqpConnection, ConnectionState};
pub use delivery::{DeliveryLoop, ProcessingOutcome};
pub use error::SourceError;
pub use lifecycle::Subscriber;
pub use source::{MessageSource, RawDelivery};
pub use topology::{ExchangeType, Topology};

#[cfg(test)]
pub(crate) mod testing;
