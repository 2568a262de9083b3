//! Type-erased seam over [`svc_claims::JwtVerifier`]. `Service` stores
//! `Arc<dyn ClaimsVerifier>` rather than being generic over the JWKS
//! source, so a service can be assembled from Options without threading a
//! `JwkSource` type parameter through every public type.

use svc_claims::{AuthenticationClaims, ClaimsError, JwkSource, JwtVerifier};

pub trait ClaimsVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthenticationClaims, ClaimsError>;
}

impl<J: JwkSource> ClaimsVerifier for JwtVerifier<J> {
    fn verify(&self, token: &str) -> Result<AuthenticationClaims, ClaimsError> {
        JwtVerifier::verify(self, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::DecodingKey;
    use svc_claims::{JwtValidationConfig, StaticJwkSource};

    #[test]
    fn a_jwt_verifier_is_usable_through_the_erased_trait() {
        let jwks = StaticJwkSource::new("kid-1", DecodingKey::from_secret(b"unused"));
        let verifier: Box<dyn ClaimsVerifier> = Box::new(JwtVerifier::new(jwks, JwtValidationConfig::default()));
        let err = verifier.verify("not-a-jwt").unwrap_err();
        assert!(matches!(err, ClaimsError::InvalidToken(_)));
    }
}
