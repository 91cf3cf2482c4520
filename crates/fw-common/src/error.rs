/// Failure to parse a wire body into a [`crate::Message`].
///
/// Malformed input never parses correctly on retry, so callers treat this
/// as a permanent failure for the delivery that carried it.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid message JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by a message handler.
///
/// Handlers signal failure through this value rather than panicking; the
/// delivery loop consumes it to choose ack vs. reject.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A downstream API call failed.
    #[error("downstream call failed: {0}")]
    Downstream(String),

    /// Any other handler-level failure.
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn downstream(err: impl std::fmt::Display) -> Self {
        Self::Downstream(err.to_string())
    }
}
