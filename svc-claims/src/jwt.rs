use std::collections::BTreeMap;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, warn};

use crate::claims::AuthenticationClaims;
use crate::error::ClaimsError;

/// Source of RSA decoding keys, selected by JWT header `kid`.
///
/// The JWKS fetch and RSA math behind a real implementation are external
/// collaborators (out of scope here); this trait is the narrow seam a real
/// JWKS client plugs into. Tests supply a literal in-memory key via
/// [`StaticJwkSource`].
pub trait JwkSource: Send + Sync {
    fn resolve(&self, kid: &str) -> Option<DecodingKey>;
}

/// A single statically configured key, useful for tests and for
/// service-to-service deployments with a fixed signing key.
pub struct StaticJwkSource {
    kid: String,
    key: DecodingKey,
}

impl StaticJwkSource {
    pub fn new(kid: impl Into<String>, key: DecodingKey) -> Self {
        Self { kid: kid.into(), key }
    }
}

impl JwkSource for StaticJwkSource {
    fn resolve(&self, kid: &str) -> Option<DecodingKey> {
        if kid == self.kid {
            Some(self.key.clone())
        } else {
            None
        }
    }
}

/// Validation policy applied on top of signature verification.
#[derive(Debug, Clone, Default)]
pub struct JwtValidationConfig {
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Verifies RS256 bearer tokens and produces an [`AuthenticationClaims`]
/// envelope from the standardized claim shape.
///
/// This is the sole subject of §4.5: the JWKS fetch and RSA primitives
/// backing `jwks` are external; this type owns only the verify-then-project
/// logic that the spec puts in scope.
pub struct JwtVerifier<J: JwkSource> {
    jwks: J,
    config: JwtValidationConfig,
}

impl<J: JwkSource> JwtVerifier<J> {
    pub fn new(jwks: J, config: JwtValidationConfig) -> Self {
        Self { jwks, config }
    }

    /// Verify a raw `Authorization: Bearer <jwt>` header value and return
    /// the resulting claims envelope plus the raw token (callers attach
    /// both to the request context — see `svc-core::context`).
    pub fn verify_bearer_header(
        &self,
        header_value: &str,
    ) -> Result<(AuthenticationClaims, String), ClaimsError> {
        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(ClaimsError::InvalidAuthScheme)?
            .trim();
        let claims = self.verify(token)?;
        Ok((claims, token.to_string()))
    }

    /// Verify a raw JWT string and return the claims envelope.
    pub fn verify(&self, token: &str) -> Result<AuthenticationClaims, ClaimsError> {
        let header = decode_header(token)
            .map_err(|e| ClaimsError::InvalidToken(format!("bad header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(ClaimsError::ValidationFailed(format!(
                "unsupported algorithm: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| ClaimsError::InvalidToken("missing kid".to_string()))?;
        let decoding_key = self
            .jwks
            .resolve(kid)
            .ok_or_else(|| ClaimsError::UnknownKeyId(kid.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &self.config.audience {
            validation.set_audience(&[audience]);
        }
        validation.validate_exp = true;

        let token_data = decode::<Value>(token, &decoding_key, &validation).map_err(|e| {
            let err = match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ClaimsError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    ClaimsError::ValidationFailed("invalid issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    ClaimsError::ValidationFailed("invalid audience".to_string())
                }
                _ => ClaimsError::InvalidToken(e.to_string()),
            };
            warn!(error = %err, "jwt validation failed");
            err
        })?;

        let claims = claims_from_json(token_data.claims);
        debug!(subject = %claims.subject(), "jwt verified");
        Ok(claims)
    }
}

/// Build an [`AuthenticationClaims`] from the standardized JSON claim shape
/// of §4.5: named fields first, everything else preserved in `extension`.
fn claims_from_json(value: Value) -> AuthenticationClaims {
    let Value::Object(mut map) = value else {
        return AuthenticationClaims::default();
    };

    let take_str = |map: &mut serde_json::Map<String, Value>, key: &str| {
        map.remove(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    };

    let subject = take_str(&mut map, "sub");
    let tenant_id = take_str(&mut map, "tenant_id");
    let partition_id = take_str(&mut map, "partition_id");
    let access_id = take_str(&mut map, "access_id");
    let contact_id = take_str(&mut map, "contact_id");

    let roles = match map.remove("roles") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    AuthenticationClaims {
        subject,
        tenant_id,
        partition_id,
        access_id,
        contact_id,
        roles,
        extension: map.into_iter().collect::<BTreeMap<_, _>>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::traits::PublicKeyParts;
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        tenant_id: String,
        partition_id: String,
        roles: Vec<String>,
        exp: usize,
        iss: String,
        aud: String,
    }

    fn make_keypair() -> (EncodingKey, DecodingKey, String) {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let pem = private_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
        let n = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            public_key.n().to_bytes_be(),
        );
        let e = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            public_key.e().to_bytes_be(),
        );
        let decoding_key = DecodingKey::from_rsa_components(&n, &e).unwrap();
        (encoding_key, decoding_key, "test-key".to_string())
    }

    fn sign(encoding_key: &EncodingKey, kid: &str, claims: &Claims) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, encoding_key).unwrap()
    }

    #[test]
    fn verify_roundtrips_standard_claims() {
        let (encoding_key, decoding_key, kid) = make_keypair();
        let jwks = StaticJwkSource::new(kid.clone(), decoding_key);
        let verifier = JwtVerifier::new(
            jwks,
            JwtValidationConfig {
                issuer: Some("issuer-a".to_string()),
                audience: Some("aud-a".to_string()),
            },
        );

        let token = sign(
            &encoding_key,
            &kid,
            &Claims {
                sub: "user-1".to_string(),
                tenant_id: "t1".to_string(),
                partition_id: "p1".to_string(),
                roles: vec!["admin".to_string()],
                exp: (std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_secs()
                    + 3600) as usize,
                iss: "issuer-a".to_string(),
                aud: "aud-a".to_string(),
            },
        );

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.subject(), "user-1");
        assert_eq!(claims.tenant_id(), "t1");
        assert_eq!(claims.roles(), vec!["admin".to_string()]);
    }

    #[test]
    fn verify_rejects_unknown_kid() {
        let (encoding_key, _decoding_key, _kid) = make_keypair();
        let (_, other_decoding_key, other_kid) = make_keypair();
        let jwks = StaticJwkSource::new(other_kid, other_decoding_key);
        let verifier = JwtVerifier::new(jwks, JwtValidationConfig::default());

        let token = sign(
            &encoding_key,
            "unregistered-kid",
            &Claims {
                sub: "user-1".to_string(),
                tenant_id: String::new(),
                partition_id: String::new(),
                roles: vec![],
                exp: 9999999999,
                iss: String::new(),
                aud: String::new(),
            },
        );

        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, ClaimsError::UnknownKeyId(_)));
    }

    #[test]
    fn verify_bearer_header_strips_prefix() {
        let (encoding_key, decoding_key, kid) = make_keypair();
        let jwks = StaticJwkSource::new(kid.clone(), decoding_key);
        let verifier = JwtVerifier::new(jwks, JwtValidationConfig::default());

        let token = sign(
            &encoding_key,
            &kid,
            &Claims {
                sub: "user-1".to_string(),
                tenant_id: String::new(),
                partition_id: String::new(),
                roles: vec![],
                exp: 9999999999,
                iss: String::new(),
                aud: String::new(),
            },
        );

        let header = format!("Bearer {token}");
        let (claims, raw) = verifier.verify_bearer_header(&header).unwrap();
        assert_eq!(claims.subject(), "user-1");
        assert_eq!(raw, token);

        let err = verifier.verify_bearer_header(&token).unwrap_err();
        assert!(matches!(err, ClaimsError::InvalidAuthScheme));
    }
}
