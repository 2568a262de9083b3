use std::sync::Arc;

use svc_claims::{AuthenticationClaims, JwkSource, JwtVerifier};
use tonic::metadata::MetadataMap;
use tonic::{Request, Status};

/// Extract the bearer token string from gRPC metadata, without the
/// `Bearer `/`bearer ` prefix.
pub fn extract_bearer_token(metadata: &MetadataMap) -> Result<&str, Status> {
    let auth_header = metadata
        .get("authorization")
        .ok_or_else(|| Status::unauthenticated("missing authorization metadata"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| Status::unauthenticated("invalid authorization metadata encoding"))?;

    auth_str
        .strip_prefix("Bearer ")
        .or_else(|| auth_str.strip_prefix("bearer "))
        .ok_or_else(|| Status::unauthenticated("authorization must use the Bearer scheme"))
}

/// Verify the bearer token carried in `metadata` and return the resulting
/// claims envelope. The same verify-then-project logic the HTTP middleware
/// uses, applied to gRPC metadata instead of an HTTP header map.
pub fn authenticate<J: JwkSource>(
    metadata: &MetadataMap,
    verifier: &JwtVerifier<J>,
) -> Result<AuthenticationClaims, Status> {
    let token = extract_bearer_token(metadata)?;
    verifier
        .verify(token)
        .map_err(|e| Status::unauthenticated(e.to_string()))
}

/// A tonic unary/streaming interceptor that rejects requests lacking a
/// valid bearer token and otherwise attaches the verified claims to the
/// request extensions so handlers can retrieve them with
/// `request.extensions().get::<AuthenticationClaims>()`.
#[derive(Clone)]
pub struct AuthInterceptor<J: JwkSource> {
    verifier: Arc<JwtVerifier<J>>,
}

impl<J: JwkSource> AuthInterceptor<J> {
    pub fn new(verifier: Arc<JwtVerifier<J>>) -> Self {
        Self { verifier }
    }
}

impl<J: JwkSource> tonic::service::Interceptor for AuthInterceptor<J> {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let claims = authenticate(request.metadata(), &self.verifier)?;
        request.extensions_mut().insert(claims);
        Ok(request)
    }
}
