use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::Extensions;
use svc_claims::AuthenticationClaims;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::context::{HandlerContext, MessageHandler};
use crate::driver::SubscribeHandle;
use crate::error::PubSubError;

/// `Registered → Opened → Running → Draining → Stopped`, per the
/// per-subscriber lifecycle: Registered→Opened happens in `Run`,
/// Opened→Running on first successful receive, →Draining on cancellation
/// or receive failure, →Stopped once every in-flight handler completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Registered,
    Opened,
    Running,
    Draining,
    Stopped,
}

/// A named inbound endpoint. At most one in-flight receive loop; on loop
/// exit, `initiated` flips back to false.
pub struct Subscriber {
    pub reference: String,
    pub url: Url,
    pub handlers: Vec<Arc<dyn MessageHandler>>,
    pub concurrency: usize,
    state: RwLock<SubscriberState>,
    initiated: AtomicBool,
}

impl Subscriber {
    pub fn new(
        reference: impl Into<String>,
        url: Url,
        handlers: Vec<Arc<dyn MessageHandler>>,
        concurrency: usize,
    ) -> Self {
        Self {
            reference: reference.into(),
            url,
            handlers,
            concurrency: concurrency.max(1),
            state: RwLock::new(SubscriberState::Registered),
            initiated: AtomicBool::new(false),
        }
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }

    pub async fn state(&self) -> SubscriberState {
        *self.state.read().await
    }

    async fn transition(&self, state: SubscriberState) {
        *self.state.write().await = state;
    }
}

/// Run the receive loop for `subscriber` against an already-opened
/// `subscription`, until the subscription closes, fails, or `cancel`
/// fires. `base_extensions` seeds every handler context (this is where
/// `svc-core` attaches the service handle before the loop starts).
pub async fn run_receive_loop(
    subscriber: Arc<Subscriber>,
    subscription: Arc<dyn SubscribeHandle>,
    cancel: CancellationToken,
    base_extensions: Extensions,
) {
    subscriber.initiated.store(true, Ordering::Release);
    subscriber.transition(SubscriberState::Opened).await;

    let semaphore = Arc::new(Semaphore::new(subscriber.concurrency));
    let mut seen_first_message = false;

    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(reference = %subscriber.reference, "subscriber cancelled");
                break;
            }
            received = subscription.receive() => received,
        };

        let envelope = match envelope {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                debug!(reference = %subscriber.reference, "subscription closed");
                break;
            }
            Err(err) => {
                warn!(reference = %subscriber.reference, error = %err, "receive failed");
                break;
            }
        };

        if !seen_first_message {
            seen_first_message = true;
            subscriber.transition(SubscriberState::Running).await;
        }

        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => permit.expect("semaphore closed"),
        };

        let handlers = subscriber.handlers.clone();
        let extensions = base_extensions.clone();
        let child_cancel = cancel.child_token();
        let subscription = subscription.clone();
        let reference = subscriber.reference.clone();

        tokio::spawn(async move {
            let claims = AuthenticationClaims::from_metadata(&envelope.metadata);
            let ctx = HandlerContext::new(claims, extensions, child_cancel);

            let mut outcome: Result<(), PubSubError> = Ok(());
            for handler in &handlers {
                if let Err(err) = handler.handle(&ctx, &envelope).await {
                    outcome = Err(err);
                    break;
                }
            }

            match outcome {
                Ok(()) => {
                    if let Err(err) = subscription.ack(envelope.id).await {
                        warn!(reference = %reference, error = %err, "ack failed");
                    }
                }
                Err(err) => {
                    warn!(reference = %reference, error = %err, "handler failed, nacking");
                    if let Err(err) = subscription.nack(envelope.id).await {
                        warn!(reference = %reference, error = %err, "nack failed");
                    }
                }
            }

            drop(permit);
        });
    }

    subscriber.transition(SubscriberState::Draining).await;
    // Drain: wait for every spawned handler task to release its permit.
    let _ = semaphore.acquire_many(subscriber.concurrency as u32).await;
    let _ = subscription.close().await;
    subscriber.transition(SubscriberState::Stopped).await;
    subscriber.initiated.store(false, Ordering::Release);
}
