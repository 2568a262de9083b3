//! HTTP bearer-auth middleware: parses `Authorization: Bearer <jwt>`,
//! verifies it via [`svc_claims::JwtVerifier`], and attaches the resulting
//! claims to the request's extensions for downstream handlers. The gRPC
//! counterpart (`svc_grpc::AuthInterceptor`) runs the identical
//! verify-then-attach logic against a `MetadataMap` carrier instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use svc_claims::{metadata_keys, JwkSource, JwtVerifier};

use crate::claims_verifier::ClaimsVerifier;
use crate::context::{ClaimsKey, RawJwtKey};
use crate::error::AppError;

fn bearer_token(header: &str) -> Result<&str, AppError> {
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Authorization header is not a bearer token".to_string()))
}

/// Request headers an internal-system claim may absorb empty tenancy
/// fields from, per §4.5. Named headers only — never applied to a
/// non-internal-system claim.
const HEADER_TENANT_ID: &str = "x-tenant-id";
const HEADER_PARTITION_ID: &str = "x-partition-id";
const HEADER_ACCESS_ID: &str = "x-access-id";
const HEADER_CONTACT_ID: &str = "x-contact-id";
const HEADER_ROLES: &str = "x-roles";

fn absorb_headers(headers: &axum::http::HeaderMap) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (header_name, metadata_key) in [
        (HEADER_TENANT_ID, metadata_keys::TENANT_ID),
        (HEADER_PARTITION_ID, metadata_keys::PARTITION_ID),
        (HEADER_ACCESS_ID, metadata_keys::ACCESS_ID),
        (HEADER_CONTACT_ID, metadata_keys::CONTACT_ID),
        (HEADER_ROLES, metadata_keys::ROLES),
    ] {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            map.insert(metadata_key.to_string(), value.to_string());
        }
    }
    map
}

/// `axum::middleware::from_fn_with_state` handler. Missing `Authorization`
/// header rejects with 403; a present but invalid/expired/mismatched token
/// rejects with 401 — matching the JWT middleware end-to-end scenario.
pub async fn jwt_auth<J: JwkSource + 'static>(
    State(verifier): State<Arc<JwtVerifier<J>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Forbidden("missing Authorization header".to_string()))?;

    let (claims, raw_jwt) = verifier
        .verify_bearer_header(header)
        .map_err(|err| AppError::Unauthorized(err.to_string()))?;

    let headers = absorb_headers(request.headers());
    let claims = claims.absorb_from_headers(&headers);

    request.extensions_mut().insert(ClaimsKey(claims));
    request.extensions_mut().insert(RawJwtKey(raw_jwt));

    Ok(next.run(request).await)
}

/// Same contract as [`jwt_auth`], but against the type-erased verifier
/// `Service` assembles from a `ServiceOption::Claims`. Kept separate from
/// `jwt_auth` so a caller with a concrete `JwtVerifier<J>` never pays for
/// dynamic dispatch.
pub async fn jwt_auth_erased(
    State(verifier): State<Arc<dyn ClaimsVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Forbidden("missing Authorization header".to_string()))?;

    let raw_jwt = bearer_token(header)?.to_string();
    let claims = verifier.verify(&raw_jwt).map_err(|err| AppError::Unauthorized(err.to_string()))?;

    let headers = absorb_headers(request.headers());
    let claims = claims.absorb_from_headers(&headers);

    request.extensions_mut().insert(ClaimsKey(claims));
    request.extensions_mut().insert(RawJwtKey(raw_jwt));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::traits::PublicKeyParts;
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use serde::Serialize;
    use svc_claims::{JwtValidationConfig, StaticJwkSource};
    use tower::ServiceExt;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        tenant_id: String,
        roles: Vec<String>,
        exp: usize,
    }

    fn keypair() -> (EncodingKey, DecodingKey) {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let pem = private_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
        let n = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, public_key.n().to_bytes_be());
        let e = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, public_key.e().to_bytes_be());
        (encoding_key, DecodingKey::from_rsa_components(&n, &e).unwrap())
    }

    fn sign(encoding_key: &EncodingKey, kid: &str, tenant_id: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let claims = Claims {
            sub: "user-1".to_string(),
            tenant_id: tenant_id.to_string(),
            roles: vec!["member".to_string()],
            exp: (std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() + 3600) as usize,
        };
        encode(&header, &claims, encoding_key).unwrap()
    }

    fn app(verifier: Arc<JwtVerifier<StaticJwkSource>>) -> Router {
        Router::new()
            .route(
                "/",
                get(|axum::extract::Extension(ClaimsKey(claims)): axum::extract::Extension<ClaimsKey>| async move {
                    claims.subject()
                }),
            )
            .layer(axum::middleware::from_fn_with_state(verifier, jwt_auth::<StaticJwkSource>))
    }

    #[tokio::test]
    async fn a_missing_authorization_header_is_rejected_as_forbidden() {
        let (_encoding_key, decoding_key) = keypair();
        let verifier = Arc::new(JwtVerifier::new(StaticJwkSource::new("kid-1", decoding_key), JwtValidationConfig::default()));
        let response = app(verifier).oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn a_valid_token_passes_through_with_claims_attached() {
        let (encoding_key, decoding_key) = keypair();
        let verifier = Arc::new(JwtVerifier::new(StaticJwkSource::new("kid-1", decoding_key), JwtValidationConfig::default()));
        let token = sign(&encoding_key, "kid-1", "acme");
        let response = app(verifier)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(axum::http::header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn a_token_failing_audience_validation_is_rejected_as_unauthorized() {
        let (encoding_key, decoding_key) = keypair();
        let verifier = Arc::new(JwtVerifier::new(
            StaticJwkSource::new("kid-1", decoding_key),
            JwtValidationConfig {
                issuer: None,
                audience: Some("expected-aud".to_string()),
            },
        ));
        let token = sign(&encoding_key, "kid-1", "acme");
        let response = app(verifier)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(axum::http::header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn the_erased_verifier_accepts_a_valid_token_identically() {
        let (encoding_key, decoding_key) = keypair();
        let verifier: Arc<dyn ClaimsVerifier> =
            Arc::new(JwtVerifier::new(StaticJwkSource::new("kid-1", decoding_key), JwtValidationConfig::default()));
        let token = sign(&encoding_key, "kid-1", "acme");
        let app = Router::new()
            .route(
                "/",
                get(|axum::extract::Extension(ClaimsKey(claims)): axum::extract::Extension<ClaimsKey>| async move {
                    claims.subject()
                }),
            )
            .layer(axum::middleware::from_fn_with_state(verifier, jwt_auth_erased));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(axum::http::header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
