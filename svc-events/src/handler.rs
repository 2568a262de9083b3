use async_trait::async_trait;
use serde::de::DeserializeOwned;
use svc_pubsub::HandlerContext;

use crate::error::EventError;

/// A named event's handler. `Payload` is the "zero-value payload type"
/// the spec requires: every dispatch decodes a fresh instance of it from
/// JSON, validates it, then executes it.
#[async_trait]
pub trait EventHandler: Send + Sync {
    type Payload: DeserializeOwned + Send + Sync + 'static;

    /// Default accepts any successfully decoded payload.
    async fn validate(&self, _payload: &Self::Payload) -> Result<(), EventError> {
        Ok(())
    }

    async fn execute(&self, ctx: &HandlerContext, payload: Self::Payload) -> Result<(), EventError>;
}

/// Type-erased form stored in the registry, so handlers with different
/// `Payload` types can share one `HashMap`.
#[async_trait]
pub(crate) trait ErasedEventHandler: Send + Sync {
    async fn dispatch(&self, ctx: &HandlerContext, payload: serde_json::Value) -> Result<(), EventError>;
}

#[async_trait]
impl<T> ErasedEventHandler for T
where
    T: EventHandler,
{
    async fn dispatch(&self, ctx: &HandlerContext, payload: serde_json::Value) -> Result<(), EventError> {
        let typed: T::Payload =
            serde_json::from_value(payload).map_err(|e| EventError::Decode(e.to_string()))?;
        self.validate(&typed).await?;
        self.execute(ctx, typed).await
    }
}
