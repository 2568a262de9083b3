use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::PubSubError;
use crate::message::Envelope;

/// An opened outbound topic handle. One per registered publisher.
#[async_trait]
pub trait PublishHandle: Send + Sync {
    async fn publish(&self, payload: Bytes, metadata: BTreeMap<String, String>) -> Result<(), PubSubError>;
    async fn close(&self) -> Result<(), PubSubError>;
}

/// An opened inbound subscription handle. One per registered subscriber.
#[async_trait]
pub trait SubscribeHandle: Send + Sync {
    /// Receive the next message, or `Ok(None)` once the subscription has
    /// been closed with no further messages coming.
    async fn receive(&self) -> Result<Option<Envelope>, PubSubError>;
    async fn ack(&self, id: uuid::Uuid) -> Result<(), PubSubError>;
    async fn nack(&self, id: uuid::Uuid) -> Result<(), PubSubError>;
    async fn close(&self) -> Result<(), PubSubError>;
}

/// A backend selected by URL scheme (`mem://`, and room for more).
#[async_trait]
pub trait PubSubDriver: Send + Sync {
    async fn open_publisher(&self, url: &Url) -> Result<Arc<dyn PublishHandle>, PubSubError>;
    async fn open_subscriber(&self, url: &Url) -> Result<Arc<dyn SubscribeHandle>, PubSubError>;
}

/// Maps a URL scheme to the driver that serves it.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: std::collections::HashMap<String, Arc<dyn PubSubDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: impl Into<String>, driver: Arc<dyn PubSubDriver>) {
        self.drivers.insert(scheme.into(), driver);
    }

    pub fn resolve(&self, url: &Url) -> Result<Arc<dyn PubSubDriver>, PubSubError> {
        self.drivers
            .get(url.scheme())
            .cloned()
            .ok_or_else(|| PubSubError::UnsupportedScheme(url.scheme().to_string()))
    }
}
