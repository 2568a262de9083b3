use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex, RwLock};
use url::Url;

use crate::driver::{PubSubDriver, PublishHandle, SubscribeHandle};
use crate::error::PubSubError;
use crate::message::Envelope;

const CHANNEL_CAPACITY: usize = 256;

/// In-memory pub/sub broker. The only driver required to exist for tests
/// (and the only one built in here — `mem://<topic>`); additional schemes
/// register their own [`PubSubDriver`] the same way.
///
/// Topic identity is the URL's host plus path, so `mem://orders` and
/// `mem://orders/` address the same topic. Fan-out to every live
/// subscriber is a broadcast: each subscribe call gets its own bounded
/// `mpsc` channel, and publish clones the envelope into every channel
/// still registered for that topic.
#[derive(Clone, Default)]
pub struct MemDriver {
    topics: Arc<RwLock<HashMap<String, Vec<mpsc::Sender<Envelope>>>>>,
}

impl MemDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic_key(url: &Url) -> String {
        let host = url.host_str().unwrap_or("");
        let path = url.path().trim_matches('/');
        if path.is_empty() {
            host.to_string()
        } else {
            format!("{host}/{path}")
        }
    }
}

#[async_trait]
impl PubSubDriver for MemDriver {
    async fn open_publisher(&self, url: &Url) -> Result<Arc<dyn PublishHandle>, PubSubError> {
        Ok(Arc::new(MemPublishHandle {
            topic: Self::topic_key(url),
            topics: self.topics.clone(),
        }))
    }

    async fn open_subscriber(&self, url: &Url) -> Result<Arc<dyn SubscribeHandle>, PubSubError> {
        let topic = Self::topic_key(url);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.topics
            .write()
            .await
            .entry(topic)
            .or_default()
            .push(tx);
        Ok(Arc::new(MemSubscribeHandle {
            receiver: Mutex::new(rx),
        }))
    }
}

struct MemPublishHandle {
    topic: String,
    topics: Arc<RwLock<HashMap<String, Vec<mpsc::Sender<Envelope>>>>>,
}

#[async_trait]
impl PublishHandle for MemPublishHandle {
    async fn publish(&self, payload: Bytes, metadata: BTreeMap<String, String>) -> Result<(), PubSubError> {
        let envelope = Envelope::new(payload, metadata);
        let mut topics = self.topics.write().await;
        if let Some(subs) = topics.get_mut(&self.topic) {
            let mut dead = Vec::new();
            for (idx, sender) in subs.iter().enumerate() {
                if sender.send(envelope.clone()).await.is_err() {
                    dead.push(idx);
                }
            }
            for idx in dead.into_iter().rev() {
                subs.remove(idx);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), PubSubError> {
        self.topics.write().await.remove(&self.topic);
        Ok(())
    }
}

struct MemSubscribeHandle {
    receiver: Mutex<mpsc::Receiver<Envelope>>,
}

#[async_trait]
impl SubscribeHandle for MemSubscribeHandle {
    async fn receive(&self) -> Result<Option<Envelope>, PubSubError> {
        Ok(self.receiver.lock().await.recv().await)
    }

    /// The in-memory driver delivers at most once with no redelivery
    /// queue, so ack/nack have nothing further to do — they exist so the
    /// coordinator's receive loop can treat every driver uniformly.
    async fn ack(&self, _id: uuid::Uuid) -> Result<(), PubSubError> {
        Ok(())
    }

    async fn nack(&self, _id: uuid::Uuid) -> Result<(), PubSubError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), PubSubError> {
        self.receiver.lock().await.close();
        Ok(())
    }
}
