//! Explicit cancellation and deadline propagation.
//!
//! The stream variant threads a [`Context`] through every operation, codec
//! call, and handler invocation instead of relying on ambient state. A
//! `Context` is cheap to clone; clones share the same cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::QueueError;

/// Cancellation token plus optional deadline.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use streamq::Context;
///
/// let ctx = Context::background().with_timeout(Duration::from_secs(5));
/// assert!(ctx.check().is_ok());
///
/// let child = ctx.clone();
/// ctx.cancel();
/// assert!(child.check().is_err());
/// ```
#[derive(Clone)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Derive a context that expires at the given instant.
    ///
    /// The returned context shares this context's cancellation flag; if
    /// both carry a deadline the earlier one wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    /// Derive a context that expires after the given duration.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancel this context and every clone sharing its flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called on this context or a clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is cancelled or its deadline has passed.
    ///
    /// Returns `QueueError::Cancelled` for explicit cancellation and
    /// `QueueError::Timeout` for an elapsed deadline.
    pub fn check(&self) -> Result<(), QueueError> {
        if self.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(QueueError::Timeout);
            }
        }
        Ok(())
    }
}
