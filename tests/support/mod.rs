//! Shared fixtures for integration tests.

use serde::{Deserialize, Serialize};
use streamq::{message, Context, ContextMessage, Message, QueueError};

/// Bitcode-encoded domain message used by the queue tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: u64,
    pub foo: String,
}

impl Widget {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            foo: format!("foo-{}", id),
        }
    }
}

impl Message for Widget {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn encode(&self) -> Result<Vec<u8>, QueueError> {
        message::encode_bitcode(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self, QueueError> {
        message::decode_bitcode(bytes)
    }
}

/// JSON-encoded, context-aware domain message used by the stream tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: u64,
    pub celsius: f64,
}

impl ContextMessage for Measurement {
    fn id(&self, _ctx: &Context) -> String {
        format!("measurement-{}", self.id)
    }

    fn encode(&self, _ctx: &Context) -> Result<Vec<u8>, QueueError> {
        message::encode_json(self)
    }

    fn decode(ctx: &Context, bytes: &[u8]) -> Result<Self, QueueError> {
        ctx.check()?;
        message::decode_json(bytes)
    }
}
