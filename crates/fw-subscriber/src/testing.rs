//! Scripted test doubles for the broker seam and handler seam.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use fw_common::{HandlerContext, HandlerError, Message, MessageHandler};

use crate::error::SourceError;
use crate::source::{MessageSource, RawDelivery};

/// What the next `fetch` call should do.
pub enum FetchStep {
    Deliver(RawDelivery),
    Empty,
    /// Simulate a dropped connection: the fetch errors and the source
    /// reports disconnected until `connect` is called again.
    Fail,
}

pub struct ScriptedSource {
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    fetch_count: AtomicUsize,
    steps: Mutex<VecDeque<FetchStep>>,
    acked: Mutex<Vec<u64>>,
    rejected: Mutex<Vec<u64>>,
    closed: AtomicBool,
}

impl ScriptedSource {
    pub fn connected() -> Self {
        Self::connected_with(Vec::new())
    }

    pub fn connected_with(steps: Vec<FetchStep>) -> Self {
        Self {
            connected: AtomicBool::new(true),
            connect_calls: AtomicUsize::new(0),
            fetch_count: AtomicUsize::new(0),
            steps: Mutex::new(steps.into()),
            acked: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn disconnected_with(steps: Vec<FetchStep>) -> Self {
        let source = Self::connected_with(steps);
        source.connected.store(false, Ordering::SeqCst);
        source
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn acked(&self) -> Vec<u64> {
        self.acked.lock().unwrap().clone()
    }

    pub fn rejected(&self) -> Vec<u64> {
        self.rejected.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn connect(&self) -> Result<(), SourceError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn fetch(&self) -> Result<Option<RawDelivery>, SourceError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match self.steps.lock().unwrap().pop_front() {
            Some(FetchStep::Deliver(delivery)) => Ok(Some(delivery)),
            Some(FetchStep::Empty) | None => Ok(None),
            Some(FetchStep::Fail) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(SourceError::NotConnected)
            }
        }
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), SourceError> {
        self.acked.lock().unwrap().push(delivery_tag);
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64) -> Result<(), SourceError> {
        self.rejected.lock().unwrap().push(delivery_tag);
        Ok(())
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Handler double that counts invocations and either succeeds or fails.
pub struct CountingHandler {
    invocations: AtomicUsize,
    failure: Option<String>,
}

impl CountingHandler {
    pub fn succeeding() -> Self {
        Self {
            invocations: AtomicUsize::new(0),
            failure: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            invocations: AtomicUsize::new(0),
            failure: Some(reason.to_string()),
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for CountingHandler {
    async fn handle(&self, _ctx: &HandlerContext, _message: &Message) -> Result<(), HandlerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(reason) => Err(HandlerError::Other(reason.clone())),
            None => Ok(()),
        }
    }
}
