//! gRPC driver: a second "Server"-shaped listener the supervisor drives
//! alongside the HTTP driver, sharing its lifecycle and health model.

mod error;
mod interceptor;
mod registry;
mod server;

pub use error::GrpcError;
pub use interceptor::{authenticate, extract_bearer_token, AuthInterceptor};
pub use registry::GrpcServiceRegistry;
pub use server::{GrpcHealthReporter, GrpcServer};
