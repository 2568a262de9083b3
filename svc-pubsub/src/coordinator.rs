use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use http::Extensions;
use svc_claims::AuthenticationClaims;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::driver::DriverRegistry;
use crate::error::PubSubError;
use crate::message::PublishPayload;
use crate::publisher::Publisher;
use crate::subscriber::{run_receive_loop, Subscriber};

/// A cleanup action registered while opening a publisher or subscriber;
/// the supervisor runs these in LIFO order on `Stop`.
pub type Cleanup = Box<dyn FnOnce() -> futures_core_shim::BoxFuture + Send>;

/// Avoids pulling in `futures` for a single alias; matches the shape the
/// rest of the workspace already uses for boxed async cleanup callbacks.
mod futures_core_shim {
    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// The named publisher/subscriber registry. A URL scheme selects the
/// driver that backs each reference; at minimum the in-memory driver is
/// registered by `svc-core` for tests.
#[derive(Default)]
pub struct PubSubCoordinator {
    drivers: RwLock<DriverRegistry>,
    publishers: RwLock<HashMap<String, Arc<Publisher>>>,
    subscribers: RwLock<HashMap<String, Arc<Subscriber>>>,
}

impl PubSubCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_driver(&self, scheme: impl Into<String>, driver: Arc<dyn crate::driver::PubSubDriver>) {
        self.drivers.write().await.register(scheme, driver);
    }

    /// Registering the same reference twice is a no-op.
    pub async fn register_publisher(&self, reference: impl Into<String>, url: Url) {
        let reference = reference.into();
        let mut publishers = self.publishers.write().await;
        publishers
            .entry(reference.clone())
            .or_insert_with(|| Arc::new(Publisher::new(reference, url)));
    }

    pub async fn register_subscriber(
        &self,
        reference: impl Into<String>,
        url: Url,
        handlers: Vec<Arc<dyn crate::context::MessageHandler>>,
        concurrency: usize,
    ) {
        let reference = reference.into();
        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(reference.clone())
            .or_insert_with(|| Arc::new(Subscriber::new(reference, url, handlers, concurrency)));
    }

    /// `Run` step 3: open every registered publisher's topic. Returns one
    /// cleanup closure per publisher that shuts its topic down.
    pub async fn open_publishers(&self) -> Result<Vec<Cleanup>, PubSubError> {
        let publishers = self.publishers.read().await;
        let drivers = self.drivers.read().await;
        let mut cleanups = Vec::with_capacity(publishers.len());
        for publisher in publishers.values() {
            let driver = drivers.resolve(&publisher.url)?;
            let handle = driver.open_publisher(&publisher.url).await?;
            publisher.set_handle(handle);
            info!(reference = %publisher.reference, url = %publisher.url, "publisher opened");
            let publisher = publisher.clone();
            cleanups.push(Box::new(move || {
                Box::pin(async move {
                    if let Some(handle) = publisher.handle() {
                        let _ = handle.close().await;
                    }
                    publisher.clear();
                }) as futures_core_shim::BoxFuture
            }) as Cleanup);
        }
        Ok(cleanups)
    }

    /// `Run` step 4: open every registered subscriber's subscription and
    /// start its receive loop. Returns one cleanup closure per subscriber
    /// that signals its loop to drain. Must run after [`Self::open_publishers`]
    /// so in-memory topics exist before a subscription attaches to them.
    pub async fn open_subscribers(
        &self,
        cancel: &CancellationToken,
        base_extensions: Extensions,
    ) -> Result<Vec<Cleanup>, PubSubError> {
        let subscribers = self.subscribers.read().await;
        let drivers = self.drivers.read().await;
        let mut cleanups = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers.values() {
            let driver = drivers.resolve(&subscriber.url)?;
            let subscription = driver.open_subscriber(&subscriber.url).await?;
            info!(reference = %subscriber.reference, url = %subscriber.url, "subscriber opened");

            let loop_cancel = cancel.child_token();
            let subscriber_clone = subscriber.clone();
            let subscription_clone = subscription.clone();
            let extensions = base_extensions.clone();
            tokio::spawn(run_receive_loop(
                subscriber_clone,
                subscription_clone,
                loop_cancel.clone(),
                extensions,
            ));

            cleanups.push(Box::new(move || {
                Box::pin(async move {
                    loop_cancel.cancel();
                }) as futures_core_shim::BoxFuture
            }) as Cleanup);
        }
        Ok(cleanups)
    }

    /// Publish `payload` under `reference`. Errors if the reference is
    /// unregistered, or uninitiated (registered but not yet opened by
    /// `Run`). `headers` are merged on top of the metadata derived from
    /// `claims`, so `headers` wins on key collision.
    pub async fn publish(
        &self,
        reference: &str,
        payload: impl Into<PublishPayload>,
        claims: Option<&AuthenticationClaims>,
        headers: BTreeMap<String, String>,
    ) -> Result<(), PubSubError> {
        let publisher = {
            let publishers = self.publishers.read().await;
            publishers
                .get(reference)
                .cloned()
                .ok_or_else(|| PubSubError::NotRegistered(reference.to_string()))?
        };

        if !publisher.is_initiated() {
            return Err(PubSubError::Uninitiated(reference.to_string()));
        }

        let handle = publisher
            .handle()
            .ok_or_else(|| PubSubError::Uninitiated(reference.to_string()))?;

        let mut metadata = claims.map(AuthenticationClaims::as_metadata).unwrap_or_default();
        metadata.extend(headers);

        handle.publish(payload.into().into_bytes(), metadata).await
    }

    pub async fn subscriber_state(&self, reference: &str) -> Option<crate::subscriber::SubscriberState> {
        let subscribers = self.subscribers.read().await;
        match subscribers.get(reference) {
            Some(subscriber) => Some(subscriber.state().await),
            None => None,
        }
    }
}
