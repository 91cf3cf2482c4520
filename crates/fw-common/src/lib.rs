//! Shared types for the ForgeFlow worker
//!
//! - Message: the header+payload envelope carried on the wire
//! - MessageHandler: the capability invoked for one decoded envelope
//! - HandlerRegistry: immutable message-type to handler mapping

pub mod error;
pub mod handler;
pub mod message;

pub use error::{DecodeError, HandlerError};
pub use handler::{HandlerContext, HandlerRegistry, MessageHandler};
pub use message::{Message, MessageBody, MessageHeader};
