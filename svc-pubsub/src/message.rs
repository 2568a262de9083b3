use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

/// A payload handed to `Publish`. Byte sequences are sent verbatim;
/// anything else is JSON-encoded first.
pub enum PublishPayload {
    Bytes(Bytes),
    Json(serde_json::Value),
}

impl PublishPayload {
    pub fn json(value: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        match self {
            PublishPayload::Bytes(b) => b,
            PublishPayload::Json(v) => Bytes::from(serde_json::to_vec(&v).unwrap_or_default()),
        }
    }
}

impl From<Bytes> for PublishPayload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for PublishPayload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<&str> for PublishPayload {
    fn from(value: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for PublishPayload {
    fn from(value: String) -> Self {
        Self::Bytes(Bytes::from(value.into_bytes()))
    }
}

/// A message in flight between a publisher and a subscriber's handler
/// chain. Driver-internal; handlers only ever see a [`Message`].
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: Uuid,
    pub payload: Bytes,
    pub metadata: BTreeMap<String, String>,
}

impl Envelope {
    pub fn new(payload: Bytes, metadata: BTreeMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            metadata,
        }
    }
}

/// The message handed to a [`crate::context::MessageHandler`].
pub type Message = Envelope;
