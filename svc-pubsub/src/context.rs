use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use http::Extensions;
use svc_claims::AuthenticationClaims;
use tokio_util::sync::CancellationToken;

use crate::error::PubSubError;
use crate::message::Message;

/// Per-message context handed to every handler in a subscriber's chain.
///
/// `extensions` is the seam `svc-core` uses to attach the service handle
/// and any other typed value without this crate depending back on
/// `svc-core` — each concern gets its own marker type, never a shared
/// string key (see `svc-core::context`).
pub struct HandlerContext {
    pub claims: AuthenticationClaims,
    pub raw_jwt: Option<String>,
    pub extensions: Extensions,
    pub cancel: CancellationToken,
}

impl HandlerContext {
    pub fn new(claims: AuthenticationClaims, extensions: Extensions, cancel: CancellationToken) -> Self {
        Self {
            claims,
            raw_jwt: None,
            extensions,
            cancel,
        }
    }
}

/// A single step in a subscriber's handler chain. Handlers within a
/// subscriber run sequentially in registration order; the first error
/// NACKs the message and stops the chain.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, message: &Message) -> Result<(), PubSubError>;
}

type BoxedHandlerFn = Box<
    dyn for<'a> Fn(&'a HandlerContext, &'a Message) -> Pin<Box<dyn Future<Output = Result<(), PubSubError>> + Send + 'a>>
        + Send
        + Sync,
>;

/// Wraps a plain async closure as a [`MessageHandler`], mirroring how the
/// event bus wraps subscriber closures behind a boxed-future handler type.
pub struct FnHandler(BoxedHandlerFn);

impl FnHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: for<'a> Fn(&'a HandlerContext, &'a Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PubSubError>> + Send + 'static,
    {
        Self(Box::new(move |ctx, msg| Box::pin(f(ctx, msg))))
    }
}

#[async_trait]
impl MessageHandler for FnHandler {
    async fn handle(&self, ctx: &HandlerContext, message: &Message) -> Result<(), PubSubError> {
        (self.0)(ctx, message).await
    }
}
