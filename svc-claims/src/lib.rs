//! Authenticated identity envelope and JWT verification.
//!
//! [`AuthenticationClaims`] is the immutable identity carried on every
//! request/message context once authentication has happened; [`JwtVerifier`]
//! is how that envelope gets produced from an inbound bearer token.

mod claims;
mod error;
mod jwt;

pub use claims::{metadata_keys, AuthenticationClaims, INTERNAL_SYSTEM_ROLE_PREFIX};
pub use error::ClaimsError;
pub use jwt::{JwkSource, JwtValidationConfig, JwtVerifier, StaticJwkSource};
