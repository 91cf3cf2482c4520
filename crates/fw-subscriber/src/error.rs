/// Broker-side failure: the connection is unusable or a topology step failed.
///
/// These are never fatal to the process; the worker retries the whole
/// connect step with a fixed backoff until stopped.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("not connected to broker")]
    NotConnected,

    #[error("unsupported exchange type: {0}")]
    UnsupportedExchange(String),
}
