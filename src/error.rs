use std::error::Error;
use std::fmt;

/// Boxed error returned by a caller-supplied message handler.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Error type for typed queue and stream operations.
#[derive(Debug)]
pub enum QueueError {
    /// The codec failed to produce a byte payload.
    Encode(String),
    /// The payload could not be parsed into the domain type.
    Decode(String),
    /// The broker rejected or could not service the call
    /// (e.g. no stream is bound to the subject).
    Unavailable(String),
    /// No stored message matched the last-message lookup.
    NotFound { stream: String, filter: String },
    /// The broker wait timeout or a context deadline elapsed.
    Timeout,
    /// The caller cancelled the operation's context.
    Cancelled,
    /// A message handler failed. The subscription converts handler
    /// failures straight into negative acknowledgments, so this variant
    /// is never produced by the adapters themselves; it exists for
    /// callers folding handler outcomes into their own error flows.
    Handler(HandlerError),
}

impl QueueError {
    /// Wrap a codec error as an encode failure.
    pub fn encode(err: impl fmt::Display) -> Self {
        QueueError::Encode(err.to_string())
    }

    /// Wrap a codec error as a decode failure.
    pub fn decode(err: impl fmt::Display) -> Self {
        QueueError::Decode(err.to_string())
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Encode(msg) => write!(f, "encode failed: {}", msg),
            QueueError::Decode(msg) => write!(f, "decode failed: {}", msg),
            QueueError::Unavailable(msg) => write!(f, "broker unavailable: {}", msg),
            QueueError::NotFound { stream, filter } => write!(
                f,
                "no message found on stream {} matching subject {}",
                stream, filter
            ),
            QueueError::Timeout => write!(f, "operation timed out"),
            QueueError::Cancelled => write!(f, "operation cancelled"),
            QueueError::Handler(e) => write!(f, "handler failed: {}", e),
        }
    }
}

impl Error for QueueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QueueError::Handler(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
