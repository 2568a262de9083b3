use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use svc_claims::AuthenticationClaims;
use svc_pubsub::{HandlerContext, Message, MessageHandler, PubSubCoordinator, PubSubError, PublishPayload};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::EventError;
use crate::handler::{ErasedEventHandler, EventHandler};

pub const EVENT_NAME_METADATA_KEY: &str = "event_name";

/// Maps `event_name -> handler`. Registers itself as the single
/// [`MessageHandler`] on the configured "events queue" subscriber: the
/// subscriber selects the handler by the `event_name` metadata header
/// that [`emit`](crate::emit) attaches to every published event.
#[derive(Default)]
pub struct EventRegistry {
    handlers: RwLock<HashMap<&'static str, Arc<dyn ErasedEventHandler>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register<H>(&self, name: &'static str, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.write().await.insert(name, Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        ctx: &HandlerContext,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<(), EventError> {
        let handlers = self.handlers.read().await;
        let handler = handlers
            .get(name)
            .ok_or_else(|| EventError::UnknownEvent(name.to_string()))?;
        handler.dispatch(ctx, payload).await
    }
}

#[async_trait]
impl MessageHandler for EventRegistry {
    async fn handle(&self, ctx: &HandlerContext, message: &Message) -> Result<(), PubSubError> {
        let name = message
            .metadata
            .get(EVENT_NAME_METADATA_KEY)
            .ok_or(EventError::MissingEventName)
            .map_err(PubSubError::from)?;

        let payload: serde_json::Value = serde_json::from_slice(&message.payload)
            .map_err(|e| PubSubError::Driver(format!("event payload is not valid JSON: {e}")))?;

        self.dispatch(ctx, name, payload).await.map_err(|err| {
            warn!(event_name = %name, error = %err, "event dispatch failed, nacking");
            PubSubError::from(err)
        })
    }
}

/// Publish `payload` to the configured events queue with the
/// `event_name` metadata header the registry dispatches on.
pub async fn emit(
    coordinator: &PubSubCoordinator,
    events_queue_reference: &str,
    claims: Option<&AuthenticationClaims>,
    name: &str,
    payload: impl serde::Serialize,
) -> Result<(), EventError> {
    let value = serde_json::to_value(payload)?;
    let mut headers = BTreeMap::new();
    headers.insert(EVENT_NAME_METADATA_KEY.to_string(), name.to_string());
    coordinator
        .publish(events_queue_reference, PublishPayload::Json(value), claims, headers)
        .await?;
    Ok(())
}
