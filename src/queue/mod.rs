//! Typed queue adapter - the context-free publisher/consumer pair.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::broker::{Broker, Delivery, PubAck, Subscription};
use crate::error::{HandlerError, QueueError};
use crate::message::Message;

/// Typed publisher/consumer pair bound to one subject on one stream.
///
/// Holds an immutable binding `{broker handle, subject, stream}` created
/// once and reused for every call. The binding owns no connection; the
/// broker handle is supplied externally and outlives it. All methods take
/// `&self` and the adapter keeps no mutable state, so one instance can be
/// shared across threads whenever the broker handle is `Sync`.
///
/// ## Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use streamq::{message, InMemoryBroker, Message, QueueError, TypedQueue};
/// use std::sync::Arc;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Ping {
///     id: u64,
/// }
///
/// impl Message for Ping {
///     fn id(&self) -> String {
///         format!("ping-{}", self.id)
///     }
///     fn encode(&self) -> Result<Vec<u8>, QueueError> {
///         message::encode_bitcode(self)
///     }
///     fn decode(bytes: &[u8]) -> Result<Self, QueueError> {
///         message::decode_bitcode(bytes)
///     }
/// }
///
/// let broker = Arc::new(InMemoryBroker::new());
/// broker.add_stream("pings", &["pings.sent"]);
///
/// let queue = TypedQueue::<Ping, _>::new(Arc::clone(&broker), "pings.sent", "pings");
/// let ack = queue.publish(&Ping { id: 1 }).unwrap();
/// assert_eq!(ack.sequence, 1);
///
/// let last = queue.last_message("pings.sent").unwrap();
/// assert_eq!(last.id, 1);
/// ```
pub struct TypedQueue<T: Message, B: Broker> {
    broker: Arc<B>,
    subject: String,
    stream: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, B> TypedQueue<T, B>
where
    T: Message + Send + 'static,
    B: Broker,
{
    /// Bind a typed queue to a subject on a stream.
    pub fn new(broker: Arc<B>, subject: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            broker,
            subject: subject.into(),
            stream: stream.into(),
            _marker: PhantomData,
        }
    }

    /// The bound subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The bound stream.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Encode and publish a message on the bound subject.
    ///
    /// The message's identity becomes the broker dedup key, so publishing
    /// two messages with the same identity inside the broker's dedup
    /// window stores only one. Broker errors propagate unchanged.
    pub fn publish(&self, message: &T) -> Result<PubAck, QueueError> {
        let payload = message.encode()?;
        self.broker.publish(&self.subject, &message.id(), payload)
    }

    /// Fetch and decode the most recent message on the bound stream
    /// matching a subject filter.
    ///
    /// Fails with `NotFound` when the broker has no matching message and
    /// `Decode` when the stored payload cannot be parsed.
    pub fn last_message(&self, filter_subject: &str) -> Result<T, QueueError> {
        let stored = self.broker.last_message(&self.stream, filter_subject)?;
        T::decode(&stored.payload)
    }

    /// Subscribe to the bound subject as a member of a queue group.
    ///
    /// The handler runs on the broker's delivery threads, once per
    /// delivered message. Each message settles to exactly one outcome:
    ///
    /// - decode failure: acked and dropped, the handler never runs
    ///   (documented lossy policy — an unparseable message would
    ///   otherwise block the group forever)
    /// - handler success: acked
    /// - handler failure: nacked, the broker redelivers
    ///
    /// Registration errors surface here; per-message failures afterwards
    /// only drive ack/nack and are never returned to the caller.
    pub fn queue_subscribe<F>(
        &self,
        queue_group: &str,
        handler: F,
    ) -> Result<Subscription, QueueError>
    where
        F: Fn(T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.broker.queue_subscribe(
            &self.subject,
            queue_group,
            Box::new(move |delivery: Delivery| {
                let message = match T::decode(delivery.payload()) {
                    Ok(message) => message,
                    Err(_) => {
                        // Malformed payload: drop it rather than let it
                        // block the queue group.
                        delivery.ack();
                        return;
                    }
                };
                match handler(message) {
                    Ok(()) => delivery.ack(),
                    Err(_) => delivery.nack(),
                }
            }),
        )
    }
}
