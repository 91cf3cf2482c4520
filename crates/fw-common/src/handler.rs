//! Handler seam between the subscription engine and message processing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::message::Message;

/// Per-delivery context passed to a handler invocation.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub worker_id: usize,
}

/// Processes one decoded envelope.
///
/// Returning `Ok` acknowledges the delivery; returning `Err` rejects it
/// without requeue. Handlers own any finer-grained policy (for example
/// whether partial success across sub-operations counts as success).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, message: &Message) -> Result<(), HandlerError>;
}

/// Immutable mapping from message-type tag to handler.
///
/// Constructed once at startup and passed into the delivery loop by
/// reference; there is no mutation after construction.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(
        mut self,
        message_type: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        self.handlers.insert(message_type.into(), handler);
        self
    }

    pub fn get(&self, message_type: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(message_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
