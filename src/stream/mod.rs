//! Typed stream adapter - the context-aware twin of [`TypedQueue`].
//!
//! Identical publish/last-message/queue-subscribe semantics, with an
//! explicit [`Context`] threaded through every operation, every codec
//! call, and every handler invocation. Operations fail fast with
//! `Cancelled` or `Timeout` before touching the broker when the context
//! has already ended.
//!
//! [`TypedQueue`]: crate::TypedQueue

use std::marker::PhantomData;
use std::sync::Arc;

use crate::broker::{Broker, Delivery, PubAck, Subscription};
use crate::context::Context;
use crate::error::{HandlerError, QueueError};
use crate::message::ContextMessage;

/// Typed, context-aware publisher/consumer pair bound to one subject on
/// one stream.
///
/// See [`TypedQueue`](crate::TypedQueue) for the binding model; the only
/// difference is the explicit [`Context`] on every call.
pub struct TypedStream<T: ContextMessage, B: Broker> {
    broker: Arc<B>,
    subject: String,
    stream: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, B> TypedStream<T, B>
where
    T: ContextMessage + Send + 'static,
    B: Broker,
{
    /// Bind a typed stream to a subject on a stream.
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
    /// Fails fast with `Cancelled`/`Timeout` if the context has ended
    /// before the broker is contacted.
    pub fn publish(&self, ctx: &Context, message: &T) -> Result<PubAck, QueueError> {
        ctx.check()?;
        let payload = message.encode(ctx)?;
        self.broker.publish(&self.subject, &message.id(ctx), payload)
    }

    /// Fetch and decode the most recent message on the bound stream
    /// matching a subject filter.
    pub fn last_message(&self, ctx: &Context, filter_subject: &str) -> Result<T, QueueError> {
        ctx.check()?;
        let stored = self.broker.last_message(&self.stream, filter_subject)?;
        T::decode(ctx, &stored.payload)
    }

    /// Subscribe to the bound subject as a member of a queue group.
    ///
    /// The context is captured by the subscription and passed to every
    /// decode and handler call. A delivery arriving after the context has
    /// ended is nacked so another consumer can take it; in-flight handler
    /// invocations are never forcibly cancelled, so handlers should be
    /// idempotent. The ack policy is the same as the context-free
    /// adapter's: decode failure acks and drops, handler failure nacks,
    /// handler success acks.
    pub fn queue_subscribe<F>(
        &self,
        ctx: &Context,
        queue_group: &str,
        handler: F,
    ) -> Result<Subscription, QueueError>
    where
        F: Fn(&Context, T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        ctx.check()?;
        let ctx = ctx.clone();
        self.broker.queue_subscribe(
            &self.subject,
            queue_group,
            Box::new(move |delivery: Delivery| {
                if ctx.check().is_err() {
                    // Leave the message for a consumer that is still live.
                    delivery.nack();
                    return;
                }
                let message = match T::decode(&ctx, delivery.payload()) {
                    Ok(message) => message,
                    Err(_) => {
                        delivery.ack();
                        return;
                    }
                };
                match handler(&ctx, message) {
                    Ok(()) => delivery.ack(),
                    Err(_) => delivery.nack(),
                }
            }),
        )
    }
}
