//! Delivery loop: fetch one delivery, decode, dispatch, ack or reject.
//!
//! Strictly sequential: one delivery in flight at a time, terminally
//! acknowledged or rejected before the next fetch. Failure policy:
//!
//! | Failure site            | Action on delivery    | Loop continues?        |
//! |-------------------------|-----------------------|------------------------|
//! | Broker/channel error    | none (tag invalid)    | yes, reconnect+backoff |
//! | Envelope decode error   | reject, no requeue    | yes                    |
//! | Unknown message type    | acknowledge           | yes                    |
//! | Handler failure         | reject, no requeue    | yes                    |

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use fw_common::{HandlerContext, HandlerRegistry, Message};

use crate::error::SourceError;
use crate::source::{MessageSource, RawDelivery};

/// How long to yield when the queue hands back nothing.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Terminal result of processing one delivery. Produced exactly once per
/// delivery and never persisted; it only drives the ack/reject decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Success,
    HandlerFailure(String),
    DecodeFailure(String),
    UnknownType(String),
}

pub struct DeliveryLoop {
    source: Arc<dyn MessageSource>,
    registry: Arc<HandlerRegistry>,
    worker_id: usize,
    idle_wait: Duration,
}

impl DeliveryLoop {
    pub fn new(
        source: Arc<dyn MessageSource>,
        registry: Arc<HandlerRegistry>,
        worker_id: usize,
    ) -> Self {
        Self {
            source,
            registry,
            worker_id,
            idle_wait: IDLE_WAIT,
        }
    }

    /// One loop iteration: reconnect if needed, poll once, process.
    ///
    /// A returned error is always broker-side; the caller owns the backoff
    /// before the next iteration.
    pub async fn run_once(&self) -> Result<(), SourceError> {
        if !self.source.is_connected().await {
            warn!(worker_id = self.worker_id, "Not connected, reconnecting");
            self.source.connect().await?;
        }

        match self.source.fetch().await? {
            Some(delivery) => {
                self.process_delivery(delivery).await?;
            }
            None => {
                tokio::time::sleep(self.idle_wait).await;
            }
        }
        Ok(())
    }

    /// Decode and dispatch one delivery, then ack or reject its tag.
    ///
    /// Only broker failures propagate; decode and handler failures are
    /// contained here as outcomes.
    pub async fn process_delivery(
        &self,
        delivery: RawDelivery,
    ) -> Result<ProcessingOutcome, SourceError> {
        let tag = delivery.delivery_tag;

        let message = match Message::decode(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    worker_id = self.worker_id,
                    delivery_tag = tag,
                    error = %e,
                    "Failed to decode message body, dropping"
                );
                self.source.reject(tag).await?;
                return Ok(ProcessingOutcome::DecodeFailure(e.to_string()));
            }
        };

        let header = &message.header;
        info!(
            worker_id = self.worker_id,
            message_id = %header.message_id,
            message_type = %header.message_type,
            correlation_id = ?header.correlation_id,
            redelivered = delivery.redelivered,
            "Message received"
        );

        let Some(handler) = self.registry.get(&header.message_type) else {
            // Dropping unknown types must not block the queue.
            warn!(
                worker_id = self.worker_id,
                message_id = %header.message_id,
                message_type = %header.message_type,
                "Unknown message type, acknowledging"
            );
            self.source.ack(tag).await?;
            return Ok(ProcessingOutcome::UnknownType(header.message_type.clone()));
        };

        let ctx = HandlerContext {
            message_id: header.message_id.clone(),
            correlation_id: header.correlation_id.clone(),
            worker_id: self.worker_id,
        };

        match handler.handle(&ctx, &message).await {
            Ok(()) => {
                self.source.ack(tag).await?;
                info!(
                    worker_id = self.worker_id,
                    message_id = %header.message_id,
                    "Message processed successfully"
                );
                Ok(ProcessingOutcome::Success)
            }
            Err(e) => {
                error!(
                    worker_id = self.worker_id,
                    message_id = %header.message_id,
                    message_type = %header.message_type,
                    correlation_id = ?header.correlation_id,
                    error = %e,
                    "Message handler failed, dropping"
                );
                self.source.reject(tag).await?;
                Ok(ProcessingOutcome::HandlerFailure(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingHandler, FetchStep, ScriptedSource};
    use serde_json::json;

    fn delivery_for(message: &Message, tag: u64) -> RawDelivery {
        RawDelivery {
            delivery_tag: tag,
            body: message.encode().unwrap(),
            redelivered: false,
        }
    }

    #[tokio::test]
    async fn success_acks_exactly_once() {
        let source = Arc::new(ScriptedSource::connected());
        let handler = Arc::new(CountingHandler::succeeding());
        let registry = Arc::new(
            HandlerRegistry::new().with_handler("GL_PROJECT_FORK", handler.clone()),
        );
        let delivery_loop = DeliveryLoop::new(source.clone(), registry, 0);

        let message = Message::new("GL_PROJECT_FORK", json!({}), "test", None);
        let outcome = delivery_loop
            .process_delivery(delivery_for(&message, 7))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessingOutcome::Success);
        assert_eq!(handler.invocations(), 1);
        assert_eq!(source.acked(), vec![7]);
        assert!(source.rejected().is_empty());
    }

    #[tokio::test]
    async fn unknown_type_is_acknowledged() {
        let source = Arc::new(ScriptedSource::connected());
        let registry = Arc::new(HandlerRegistry::new());
        let delivery_loop = DeliveryLoop::new(source.clone(), registry, 0);

        let message = Message::new("X_UNKNOWN", json!({}), "test", None);
        let outcome = delivery_loop
            .process_delivery(delivery_for(&message, 3))
            .await
            .unwrap();

        assert_eq!(outcome, ProcessingOutcome::UnknownType("X_UNKNOWN".into()));
        assert_eq!(source.acked(), vec![3]);
        assert!(source.rejected().is_empty());
    }

    #[tokio::test]
    async fn decode_failure_rejects_without_handler_invocation() {
        let source = Arc::new(ScriptedSource::connected());
        let handler = Arc::new(CountingHandler::succeeding());
        let registry = Arc::new(
            HandlerRegistry::new().with_handler("GL_PROJECT_FORK", handler.clone()),
        );
        let delivery_loop = DeliveryLoop::new(source.clone(), registry, 0);

        let outcome = delivery_loop
            .process_delivery(RawDelivery {
                delivery_tag: 9,
                body: b"{not json".to_vec(),
                redelivered: false,
            })
            .await
            .unwrap();

        assert!(matches!(outcome, ProcessingOutcome::DecodeFailure(_)));
        assert_eq!(handler.invocations(), 0);
        assert!(source.acked().is_empty());
        assert_eq!(source.rejected(), vec![9]);
    }

    #[tokio::test]
    async fn handler_failure_rejects_and_loop_fetches_again() {
        let failing = Arc::new(CountingHandler::failing("gitlab 500"));
        let registry = Arc::new(
            HandlerRegistry::new().with_handler("GL_PROJECT_FORK", failing.clone()),
        );

        let bad = Message::new("GL_PROJECT_FORK", json!({}), "test", None);
        let source = Arc::new(ScriptedSource::connected_with(vec![
            FetchStep::Deliver(delivery_for(&bad, 1)),
            FetchStep::Empty,
        ]));
        let delivery_loop = DeliveryLoop::new(source.clone(), registry, 0);

        delivery_loop.run_once().await.unwrap();
        assert_eq!(source.rejected(), vec![1]);
        assert_eq!(failing.invocations(), 1);

        // The loop survives the handler failure and polls again.
        delivery_loop.run_once().await.unwrap();
        assert_eq!(source.fetch_calls(), 2);
        assert!(source.acked().is_empty());
    }

    #[tokio::test]
    async fn connection_error_triggers_reconnect_before_next_fetch() {
        let handler = Arc::new(CountingHandler::succeeding());
        let registry = Arc::new(
            HandlerRegistry::new().with_handler("GL_PROJECT_FORK", handler.clone()),
        );

        let message = Message::new("GL_PROJECT_FORK", json!({}), "test", None);
        let source = Arc::new(ScriptedSource::connected_with(vec![
            FetchStep::Fail,
            FetchStep::Deliver(delivery_for(&message, 11)),
        ]));
        let delivery_loop = DeliveryLoop::new(source.clone(), registry, 0);

        assert!(delivery_loop.run_once().await.is_err());
        let connects_after_failure = source.connect_calls();

        delivery_loop.run_once().await.unwrap();
        assert_eq!(source.connect_calls(), connects_after_failure + 1);
        // No duplicate acknowledgement of anything from before the failure.
        assert_eq!(source.acked(), vec![11]);
        assert!(source.rejected().is_empty());
    }
}
