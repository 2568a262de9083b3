/// Errors raised while verifying a bearer token or reconstructing claims.
///
/// HTTP middleware maps these to 401/403; gRPC interceptors map them to
/// `Unauthenticated`.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("missing Authorization header")]
    MissingAuthHeader,

    #[error("authorization scheme is not Bearer")]
    InvalidAuthScheme,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,

    #[error("unknown signing key: {0}")]
    UnknownKeyId(String),

    #[error("audience or issuer mismatch: {0}")]
    ValidationFailed(String),
}

impl ClaimsError {
    /// Whether this failure should surface as 401 (no/garbled credentials)
    /// vs. 403 (credentials present but rejected by policy).
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ClaimsError::ValidationFailed(_))
    }
}
