//! streamq - typed publish/subscribe over a durable-stream broker.
//!
//! Define a domain message type once (identity + encode/decode) and get a
//! reusable publisher/consumer pair without per-type broker boilerplate.
//! Durability, ordering, deduplication, and delivery guarantees belong to
//! the broker; this crate is the thin typed seam in front of it.
//!
//! Two adapters with identical semantics:
//! - [`TypedQueue`] over the [`Message`] codec contract (context-free)
//! - [`TypedStream`] over [`ContextMessage`], threading an explicit
//!   [`Context`] (cancellation + deadline) through every operation, codec
//!   call, and handler invocation
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use std::sync::mpsc::channel;
//! use std::time::Duration;
//! use streamq::{message, InMemoryBroker, Message, QueueError, TypedQueue};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct OrderCreated {
//!     id: u64,
//! }
//!
//! impl Message for OrderCreated {
//!     fn id(&self) -> String {
//!         format!("order-{}", self.id)
//!     }
//!     fn encode(&self) -> Result<Vec<u8>, QueueError> {
//!         message::encode_bitcode(self)
//!     }
//!     fn decode(bytes: &[u8]) -> Result<Self, QueueError> {
//!         message::decode_bitcode(bytes)
//!     }
//! }
//!
//! let broker = Arc::new(InMemoryBroker::new());
//! broker.add_stream("orders", &["orders.created"]);
//!
//! let queue = TypedQueue::<OrderCreated, _>::new(broker, "orders.created", "orders");
//! queue.publish(&OrderCreated { id: 1 }).unwrap();
//!
//! let (tx, rx) = channel();
//! let _sub = queue
//!     .queue_subscribe("billing", move |order: OrderCreated| {
//!         tx.send(order.id).map_err(|e| e.into())
//!     })
//!     .unwrap();
//!
//! assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
//! ```

pub mod broker;
mod context;
mod error;
pub mod message;
mod queue;
mod stream;

pub use broker::{Broker, Delivery, InMemoryBroker, Outcome, PubAck, StoredMessage, Subscription};
pub use context::Context;
pub use error::{HandlerError, QueueError};
pub use message::{ContextMessage, Message};
pub use queue::TypedQueue;
pub use stream::TypedStream;
