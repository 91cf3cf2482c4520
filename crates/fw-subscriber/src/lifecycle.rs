//! Lifecycle controller: start/stop around a single delivery-loop worker.
//!
//! Exactly one worker task per consumer instance, by construction. The
//! channel and acknowledgement order are not safely shared across
//! concurrent fetchers, so horizontal scaling means more consumer
//! processes, never more in-process workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use fw_common::HandlerRegistry;

use crate::delivery::DeliveryLoop;
use crate::error::SourceError;
use crate::source::MessageSource;

/// Fixed wait between reconnect attempts after a broker error.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
/// How long `stop` waits for the worker to observe the flag and exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Subscriber {
    source: Arc<dyn MessageSource>,
    registry: Arc<HandlerRegistry>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    reconnect_backoff: Duration,
    stop_timeout: Duration,
}

impl Subscriber {
    pub fn new(source: Arc<dyn MessageSource>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            source,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            reconnect_backoff: RECONNECT_BACKOFF,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    /// Start the worker. Idempotent: a second call warns and returns.
    ///
    /// The startup connect error is the only broker error ever surfaced to
    /// the caller; once running, connection loss is retried indefinitely.
    pub async fn start(&self) -> Result<(), SourceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Subscriber is already running");
            return Ok(());
        }

        if !self.source.is_connected().await {
            if let Err(e) = self.source.connect().await {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }

        let delivery_loop = DeliveryLoop::new(self.source.clone(), self.registry.clone(), 0);
        let running = self.running.clone();
        let backoff = self.reconnect_backoff;

        let handle = tokio::spawn(async move {
            debug!(worker_id = 0, "Worker started (single worker mode)");
            while running.load(Ordering::SeqCst) {
                if let Err(e) = delivery_loop.run_once().await {
                    error!(worker_id = 0, error = %e, "Broker error, backing off before reconnect");
                    tokio::time::sleep(backoff).await;
                }
            }
            debug!(worker_id = 0, "Worker exited");
        });

        *self.worker.lock().await = Some(handle);
        info!(handlers = self.registry.len(), "Subscriber started");
        Ok(())
    }

    /// Stop the worker and close the connection. Idempotent and safe to
    /// invoke from a signal handler context.
    ///
    /// Cancellation is cooperative: an in-flight handler call finishes
    /// before the worker observes the flag, so shutdown latency is bounded
    /// by the slowest handler plus the join timeout.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping subscriber...");

        if let Some(mut handle) = self.worker.lock().await.take() {
            if tokio::time::timeout(self.stop_timeout, &mut handle)
                .await
                .is_err()
            {
                warn!("Worker did not exit within timeout, aborting");
                handle.abort();
            }
        }

        if let Err(e) = self.source.close().await {
            warn!(error = %e, "Error closing broker connection");
        }
        info!("Subscriber stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
