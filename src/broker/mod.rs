//! Broker contract consumed by the typed adapters.
//!
//! The broker is an external collaborator: it owns the connection, the
//! streams, and every durability/ordering/redelivery guarantee. This module
//! defines the seam the adapters publish and subscribe through, plus the
//! value types that cross it. [`InMemoryBroker`] is a reference
//! implementation for tests and single-process use.
//!
//! A delivered message is handed to the subscription callback as a
//! [`Delivery`] whose `ack`/`nack` methods take `self` by value, so each
//! message settles to exactly one terminal outcome.

mod in_memory;

pub use in_memory::InMemoryBroker;

use std::fmt;

use crate::error::QueueError;

/// Broker acknowledgment for a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubAck {
    /// Stream the message was stored on.
    pub stream: String,
    /// Sequence number assigned by the broker.
    pub sequence: u64,
    /// True when the dedup key matched an earlier publish inside the
    /// broker's dedup window; `sequence` then refers to the original.
    pub duplicate: bool,
}

/// A raw message as stored on a stream.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Subject the message was published on.
    pub subject: String,
    /// Stream sequence number.
    pub sequence: u64,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

/// Terminal outcome of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Processed; the broker removes the message.
    Ack,
    /// Not processed; the broker redelivers.
    Nack,
}

/// A message delivered to a queue-group subscription.
///
/// `ack` and `nack` consume the delivery: a message settles to exactly one
/// of them. A delivery dropped without settling counts as a nack (ack-wait
/// expiry) and the broker redelivers.
pub struct Delivery {
    subject: String,
    payload: Vec<u8>,
    settle: Box<dyn FnOnce(Outcome) + Send>,
}

impl Delivery {
    /// Build a delivery. `settle` is invoked with the terminal outcome;
    /// broker implementations use it to record the ack or requeue.
    pub fn new(
        subject: impl Into<String>,
        payload: Vec<u8>,
        settle: impl FnOnce(Outcome) + Send + 'static,
    ) -> Self {
        Self {
            subject: subject.into(),
            payload,
            settle: Box::new(settle),
        }
    }

    /// Subject the message was published on.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Encoded payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledge: processed, remove from the queue.
    pub fn ack(self) {
        (self.settle)(Outcome::Ack);
    }

    /// Negative-acknowledge: not processed, request redelivery.
    pub fn nack(self) {
        (self.settle)(Outcome::Nack);
    }
}

/// Callback invoked by the broker for each delivered message.
pub type DeliveryHandler = Box<dyn Fn(Delivery) + Send + Sync>;

/// Handle for an active queue-group subscription.
///
/// Unsubscribing (or dropping the handle) stops future deliveries. An
/// in-flight callback runs to completion; it is not forcibly cancelled.
pub struct Subscription {
    unsub: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Build a subscription handle from a teardown closure.
    pub fn new(unsub: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsub: Some(Box::new(unsub)),
        }
    }

    /// Stop future deliveries.
    pub fn unsubscribe(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(unsub) = self.unsub.take() {
            unsub();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsub.is_some())
            .finish()
    }
}

/// The pub/sub broker seam.
///
/// Implementations must be safe for concurrent use; the adapters share one
/// handle across publishers and subscription worker threads.
pub trait Broker: Send + Sync {
    /// Publish a payload on a subject with a deduplication key.
    ///
    /// Blocks until the broker acknowledges or its wait timeout elapses.
    fn publish(&self, subject: &str, dedup_id: &str, payload: Vec<u8>)
        -> Result<PubAck, QueueError>;

    /// Fetch the most recent message stored on `stream` whose subject
    /// matches `subject_filter`.
    fn last_message(&self, stream: &str, subject_filter: &str)
        -> Result<StoredMessage, QueueError>;

    /// Register a durable queue-group subscription on a subject.
    ///
    /// Each stored message is delivered to exactly one member of the
    /// group. Delivery runs on the broker's own worker threads.
    fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        handler: DeliveryHandler,
    ) -> Result<Subscription, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn delivery_settles_once() {
        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        let delivery = Delivery::new("t.subject", b"payload".to_vec(), move |o| {
            *slot.lock().unwrap() = Some(o);
        });

        assert_eq!(delivery.subject(), "t.subject");
        assert_eq!(delivery.payload(), b"payload");

        delivery.ack();
        assert_eq!(*outcome.lock().unwrap(), Some(Outcome::Ack));
    }

    #[test]
    fn nack_reports_nack() {
        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        Delivery::new("t", Vec::new(), move |o| {
            *slot.lock().unwrap() = Some(o);
        })
        .nack();
        assert_eq!(*outcome.lock().unwrap(), Some(Outcome::Nack));
    }

    #[test]
    fn subscription_debug_reports_active_state() {
        let sub = Subscription::new(|| {});
        assert_eq!(format!("{:?}", sub), "Subscription { active: true }");
    }

    #[test]
    fn subscription_tears_down_once() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&calls);
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
