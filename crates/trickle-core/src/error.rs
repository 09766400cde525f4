//! Stream error taxonomy
//!
//! Cancellation is deliberately absent: a stopped session is not a failure.

use thiserror::Error;

/// Boxed error accepted from producers and body sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures a stream session can end with
#[derive(Debug, Error)]
pub enum StreamError {
    /// The response arrived but its success indicator was false
    #[error("request rejected with status {status}")]
    RequestRejected { status: u16 },

    /// Acquiring the response or reading a chunk failed
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),

    /// Strict decoding hit bytes that are not valid UTF-8
    #[error("invalid UTF-8 in stream at byte {offset}")]
    Decode { offset: usize },

    /// A one-parameter producer was started without its parameter
    #[error("stream producer requires a parameter but none was supplied")]
    MissingParameter,
}

impl StreamError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Status code carried by a rejected request
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestRejected { status } => Some(*status),
            _ => None,
        }
    }

    /// Whether this belongs to the transport-failure class (everything but a rejection)
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::RequestRejected { .. })
    }
}
