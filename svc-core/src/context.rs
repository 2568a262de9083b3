//! Per-call context carriers.
//!
//! Each concern gets its own marker type inserted into an [`http::Extensions`]
//! bag rather than a single string-keyed map, so unrelated subsystems can
//! never collide on a key. This mirrors `svc-pubsub::HandlerContext`, which
//! carries the same kind of typed extension bag down the receive-loop path.
//! Per the redesign notes, the service handle is passed as an explicit
//! parameter wherever practical; the extension slot exists only so HTTP/gRPC
//! middleware (which don't control handler signatures) can still make it
//! available to the handler.

use std::sync::Arc;

use svc_claims::AuthenticationClaims;

use crate::service::ServiceHandle;

/// Extension-map entry carrying the service handle.
#[derive(Clone)]
pub struct ServiceHandleKey(pub Arc<ServiceHandle>);

/// Extension-map entry carrying the verified identity for this call.
#[derive(Clone)]
pub struct ClaimsKey(pub AuthenticationClaims);

/// Extension-map entry carrying the raw bearer token, for calls that must
/// forward it downstream (e.g. service-to-service relays).
#[derive(Clone)]
pub struct RawJwtKey(pub String);

/// Extension-map entry carrying the negotiated language tag.
#[derive(Clone)]
pub struct LanguageKey(pub String);

/// Read the claims attached to an HTTP request's extensions, if any.
pub fn claims_from(extensions: &http::Extensions) -> Option<&AuthenticationClaims> {
    extensions.get::<ClaimsKey>().map(|k| &k.0)
}

/// Read the service handle attached to an HTTP request's extensions.
pub fn service_handle_from(extensions: &http::Extensions) -> Option<&Arc<ServiceHandle>> {
    extensions.get::<ServiceHandleKey>().map(|k| &k.0)
}
