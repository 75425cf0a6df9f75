//! Codec contract implemented by domain message types.
//!
//! A domain type implements [`Message`] once — a stable identifier plus
//! encode/decode — and can then be published and consumed through a
//! [`TypedQueue`](crate::TypedQueue) without any further broker-specific
//! code. [`ContextMessage`] is the context-aware twin used by
//! [`TypedStream`](crate::TypedStream) for codecs that perform I/O or must
//! honor cancellation.
//!
//! The identifier doubles as the broker deduplication key: re-publishing a
//! logically identical message (same identifier) within the broker's dedup
//! window collapses to a single stored message.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::Context;
use crate::error::QueueError;

/// A domain message with identity and a byte codec.
///
/// ## Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use streamq::{message, Message, QueueError};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct OrderCreated {
///     id: u64,
///     item: String,
/// }
///
/// impl Message for OrderCreated {
///     fn id(&self) -> String {
///         format!("order-{}", self.id)
///     }
///
///     fn encode(&self) -> Result<Vec<u8>, QueueError> {
///         message::encode_bitcode(self)
///     }
///
///     fn decode(bytes: &[u8]) -> Result<Self, QueueError> {
///         message::decode_bitcode(bytes)
///     }
/// }
///
/// let order = OrderCreated { id: 7, item: "book".into() };
/// let bytes = order.encode().unwrap();
/// assert_eq!(OrderCreated::decode(&bytes).unwrap(), order);
/// ```
pub trait Message: Sized {
    /// Stable, content-derived or business identifier. Used as the broker
    /// deduplication key on publish.
    fn id(&self) -> String;

    /// Encode to a byte payload.
    fn encode(&self) -> Result<Vec<u8>, QueueError>;

    /// Decode a fresh instance from a byte payload.
    fn decode(bytes: &[u8]) -> Result<Self, QueueError>;
}

/// Context-aware codec contract.
///
/// Identical to [`Message`] except every call accepts an explicit
/// [`Context`], for codecs that perform I/O (schema registries, envelope
/// decryption) or must honor cancellation mid-call. Pure in-memory codecs
/// can ignore the context.
pub trait ContextMessage: Sized {
    /// Stable identifier, used as the broker deduplication key.
    fn id(&self, ctx: &Context) -> String;

    /// Encode to a byte payload.
    fn encode(&self, ctx: &Context) -> Result<Vec<u8>, QueueError>;

    /// Decode a fresh instance from a byte payload.
    fn decode(ctx: &Context, bytes: &[u8]) -> Result<Self, QueueError>;
}

/// Encode a serde value with the compact bitcode binary format.
pub fn encode_bitcode<T: Serialize>(value: &T) -> Result<Vec<u8>, QueueError> {
    bitcode::serialize(value).map_err(QueueError::encode)
}

/// Decode a serde value from the compact bitcode binary format.
pub fn decode_bitcode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, QueueError> {
    bitcode::deserialize(bytes).map_err(QueueError::decode)
}

/// Encode a serde value as JSON, for payloads that should stay readable.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, QueueError> {
    serde_json::to_vec(value).map_err(QueueError::encode)
}

/// Decode a serde value from JSON.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, QueueError> {
    serde_json::from_slice(bytes).map_err(QueueError::decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u64,
        name: String,
    }

    #[test]
    fn bitcode_round_trip() {
        let value = Sample {
            id: 42,
            name: "answer".to_string(),
        };
        let bytes = encode_bitcode(&value).unwrap();
        let back: Sample = decode_bitcode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn json_round_trip() {
        let value = Sample {
            id: 1,
            name: "one".to_string(),
        };
        let bytes = encode_json(&value).unwrap();
        assert_eq!(bytes, br#"{"id":1,"name":"one"}"#);
        let back: Sample = decode_json(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_json::<Sample>(b"not json").unwrap_err();
        assert!(matches!(err, QueueError::Decode(_)));
    }
}
