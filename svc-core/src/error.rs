//! Error handling: a `thiserror`-based [`ServiceError`] for internal/library
//! operations (the single-slot fatal channel carries these), plus an
//! HTTP-facing [`AppError`]/`IntoResponse` split for handlers.

use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};

/// The five error kinds of the error handling design: a required
/// capability missing (`Configuration`), transient network/database/
/// pub-sub driver failure (`Io`), a job's process function erroring after
/// its retry budget is spent (`Job`), invalid/absent JWT (`Auth`), and any
/// subsystem's terminal error written to the single-slot channel (`Fatal`).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("job error: {0}")]
    Job(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<svc_jobs::JobError> for ServiceError {
    fn from(err: svc_jobs::JobError) -> Self {
        ServiceError::Job(err.to_string())
    }
}

impl From<svc_pubsub::PubSubError> for ServiceError {
    fn from(err: svc_pubsub::PubSubError) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<svc_data::DataError> for ServiceError {
    fn from(err: svc_data::DataError) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<svc_grpc::GrpcError> for ServiceError {
    fn from(err: svc_grpc::GrpcError) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<svc_claims::ClaimsError> for ServiceError {
    fn from(err: svc_claims::ClaimsError) -> Self {
        ServiceError::Auth(err.to_string())
    }
}

/// HTTP-facing error surface. Handlers return this (or anything convertible
/// via [`map_error!`]) and get a `{"error": message}` JSON body with the
/// matching status code.
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Internal(String),
    Custom { status: StatusCode, body: serde_json::Value },
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Custom { status, body } => (status, Json(body)).into_response(),
            AppError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized(msg) => error_response(StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => error_response(StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => error_response(StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Custom { status, body } => write!(f, "Custom Error ({status}): {body}"),
        }
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Auth(msg) => AppError::Unauthorized(msg),
            ServiceError::Configuration(msg) => AppError::Internal(msg),
            ServiceError::Io(msg) => AppError::Internal(msg),
            ServiceError::Job(msg) => AppError::Internal(msg),
            ServiceError::Fatal(msg) => AppError::Internal(msg),
        }
    }
}

/// Generate `From<E> for AppError` implementations mapping an error type
/// to a fixed `AppError` variant, for handlers that want `?` to "just work".
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::error::AppError {
                fn from(err: $err_ty) -> Self {
                    $crate::error::AppError::$variant(err.to_string())
                }
            }
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn error_parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn not_found_maps_to_404_with_json_error_body() {
        let (status, body) = error_parts(AppError::NotFound("missing".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "missing");
    }

    #[tokio::test]
    async fn service_error_auth_converts_to_unauthorized() {
        let svc_err = ServiceError::Auth("bad token".into());
        let (status, body) = error_parts(svc_err.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "bad token");
    }

    #[tokio::test]
    async fn custom_error_preserves_status_and_body() {
        let custom_body = serde_json::json!({"detail": "teapot"});
        let (status, body) = error_parts(AppError::Custom {
            status: StatusCode::IM_A_TEAPOT,
            body: custom_body.clone(),
        })
        .await;
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
        assert_eq!(body, custom_body);
    }

    #[test]
    fn service_error_display_names_its_kind() {
        assert!(ServiceError::Configuration("x".into()).to_string().starts_with("configuration"));
        assert!(ServiceError::Fatal("x".into()).to_string().starts_with("fatal"));
    }
}
