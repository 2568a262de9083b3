//! Scenario 2: register event `"message.to.test"` with a handler that
//! increments a counter from 50; after `Emit`, the counter reaches 51
//! within a short quiesce.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Extensions;
use svc_pubsub::{HandlerContext, MemDriver, PubSubCoordinator};
use tokio_util::sync::CancellationToken;
use url::Url;

use svc_events::{emit, EventError, EventHandler, EventRegistry};

struct IncrementHandler {
    counter: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for IncrementHandler {
    type Payload = String;

    async fn execute(&self, _ctx: &HandlerContext, _payload: String) -> Result<(), EventError> {
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn event_dispatch_increments_counter() {
    let coordinator = PubSubCoordinator::new();
    coordinator.register_driver("mem", Arc::new(MemDriver::new())).await;

    let queue_url = Url::parse("mem://events-queue").unwrap();
    coordinator.register_publisher("events", queue_url.clone()).await;

    let counter = Arc::new(AtomicUsize::new(50));
    let registry = Arc::new(EventRegistry::new());
    registry
        .register(
            "message.to.test",
            IncrementHandler {
                counter: counter.clone(),
            },
        )
        .await;

    coordinator
        .register_subscriber("events", queue_url, vec![registry.clone()], 4)
        .await;

    coordinator.open_publishers().await.unwrap();
    let cancel = CancellationToken::new();
    coordinator
        .open_subscribers(&cancel, Extensions::new())
        .await
        .unwrap();

    emit(&coordinator, "events", None, "message.to.test", "x")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 51);
}

#[tokio::test]
async fn unknown_event_name_is_rejected() {
    let coordinator = PubSubCoordinator::new();
    let registry = EventRegistry::new();
    registry
        .register("known.event", IncrementHandler {
            counter: Arc::new(AtomicUsize::new(0)),
        })
        .await;

    let err = registry
        .dispatch(
            &HandlerContext::new(
                Default::default(),
                Extensions::new(),
                CancellationToken::new(),
            ),
            "unknown.event",
            serde_json::json!("x"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::UnknownEvent(_)));
}
