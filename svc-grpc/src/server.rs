use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::info;

use crate::error::GrpcError;
use crate::registry::GrpcServiceRegistry;

/// A gRPC server driven by the same supervisor that drives the HTTP
/// driver. Owns its own listener and port (spec §4.7 doesn't require
/// sharing one port with HTTP) and satisfies the same "own listener, piped
/// exit" contract: `serve` resolves once the listener closes or `cancel`
/// fires, carrying the first transport error if any.
pub struct GrpcServer {
    addr: SocketAddr,
    registry: GrpcServiceRegistry,
    health_reporter: tonic_health::server::HealthReporter,
}

impl GrpcServer {
    pub fn new(addr: SocketAddr) -> Self {
        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        let registry = GrpcServiceRegistry::new();
        registry.add_service(health_service);
        Self {
            addr,
            registry,
            health_reporter,
        }
    }

    pub fn on_port(addr: SocketAddr) -> Self {
        Self::new(addr)
    }

    pub fn registry(&self) -> &GrpcServiceRegistry {
        &self.registry
    }

    /// A cloneable handle for updating this server's health status from a
    /// task that doesn't own it — `serve` consumes `self` by value, so a
    /// caller that wants to keep reporting live status while `serve` runs
    /// needs its own handle onto the same health reporter.
    pub fn health_reporter(&self) -> GrpcHealthReporter {
        GrpcHealthReporter(self.health_reporter.clone())
    }

    /// Mark every registered gRPC service healthy or unhealthy in the
    /// standard gRPC health service, reflecting the same boolean the HTTP
    /// `/healthz` endpoint reports.
    pub async fn set_serving(&self, healthy: bool) {
        self.health_reporter().set_serving(healthy).await;
    }

    /// Start accepting connections on its own port until the listener
    /// closes or `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> Result<(), GrpcError> {
        info!(addr = %self.addr, "starting gRPC driver");
        let routes = self.registry.routes();
        Server::builder()
            .add_routes(routes)
            .serve_with_shutdown(self.addr, cancel.cancelled_owned())
            .await?;
        Ok(())
    }
}

/// See [`GrpcServer::health_reporter`].
#[derive(Clone)]
pub struct GrpcHealthReporter(tonic_health::server::HealthReporter);

impl GrpcHealthReporter {
    pub async fn set_serving(&self, healthy: bool) {
        if healthy {
            self.0.set_service_status("", tonic_health::ServingStatus::Serving).await;
        } else {
            self.0.set_service_status("", tonic_health::ServingStatus::NotServing).await;
        }
    }
}
