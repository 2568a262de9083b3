use std::sync::{Arc, Mutex};

use tonic::body::Body as TonicBody;
use tonic::server::NamedService;
use tonic::service::{Routes, RoutesBuilder};
use tower::Service;

/// Collects gRPC service implementations registered before the driver
/// starts serving, then hands them to tonic as one composed [`Routes`].
///
/// Cloning shares the same underlying builder; every clone sees the same
/// set of registered services.
#[derive(Clone)]
pub struct GrpcServiceRegistry {
    inner: Arc<Mutex<Option<RoutesBuilder>>>,
}

impl GrpcServiceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(RoutesBuilder::default()))),
        }
    }

    /// Register a generated tonic service. Order of registration does not
    /// matter; tonic dispatches by gRPC path regardless of insertion order.
    ///
    /// Panics if called after [`GrpcServiceRegistry::routes`] has already
    /// consumed the builder — all services must be registered before the
    /// driver starts serving.
    pub fn add_service<S>(&self, service: S)
    where
        S: Service<http::Request<TonicBody>, Response = http::Response<TonicBody>, Error = std::convert::Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let mut guard = self.inner.lock().unwrap();
        let builder = guard.as_mut().expect("services registered after routes() was already built");
        builder.add_service(service);
    }

    /// Build the composed router out of every service registered so far.
    /// Consumes the builder; a second call returns an empty router.
    pub fn routes(&self) -> Routes {
        let mut guard = self.inner.lock().unwrap();
        guard.take().unwrap_or_default().routes()
    }
}

impl Default for GrpcServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
