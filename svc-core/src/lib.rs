//! Composition and lifecycle supervisor: assembles a service out of
//! optional subsystems (pub/sub, job pool, datastore, claims, HTTP/gRPC
//! drivers), runs them in a fixed dependency order, and coordinates one
//! graceful shutdown path through a single-slot fatal-error channel.
//!
//! `Service` is the hub every other `svc-*` crate plugs into: `svc-pubsub`
//! and `svc-jobs` provide the subsystems it drives, `svc-claims` provides
//! the verifier this crate's [`middleware::jwt_auth_erased`] calls, and
//! `svc-grpc` provides the second driver this crate's [`service::Service::run`]
//! starts alongside its own axum-based HTTP driver.

pub mod auth;
pub mod claims_verifier;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod errsink;
pub mod health;
pub mod middleware;
pub mod option;
pub mod service;

pub use auth::{AuthorizationCheck, AuthorizationClient, AuthorizationDecision};
pub use claims_verifier::ClaimsVerifier;
pub use config::{ConfigError, ServiceConfig};
pub use context::{ClaimsKey, LanguageKey, RawJwtKey, ServiceHandleKey};
pub use driver::{AxumServer, Server, TlsServer};
pub use error::{AppError, ServiceError};
pub use errsink::{error_sink, ErrorSink, ErrorSource};
pub use health::{HealthBuilder, HealthIndicator, HealthIndicatorErased, HealthState};
pub use option::ServiceOption;
pub use service::{Service, ServiceHandle};
