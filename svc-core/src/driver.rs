//! Driver abstraction (§4.7): the supervisor programs to two narrow
//! interfaces, `Server` and `TlsServer`, rather than owning a concrete HTTP
//! stack. `AxumServer` is the one implementation shipped here, grounded on
//! the teacher's `r2e-core::builder::serve` tail (`TcpListener::bind` +
//! `axum::serve(...).with_graceful_shutdown(...)`).

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::Router;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

#[async_trait]
pub trait Server: Send + Sync {
    async fn listen_and_serve(&self, addr: SocketAddr, handler: Router, cancel: CancellationToken) -> Result<(), ServiceError>;
}

/// TLS certificate loading is an explicit non-goal (§1): this trait records
/// the seam a real deployment would plug a TLS-capable listener into, but no
/// implementation ships here.
#[async_trait]
pub trait TlsServer: Send + Sync {
    async fn listen_and_serve_tls(
        &self,
        addr: SocketAddr,
        cert_path: &str,
        key_path: &str,
        handler: Router,
        cancel: CancellationToken,
    ) -> Result<(), ServiceError>;
}

/// Waits for SIGHUP, SIGINT (ctrl-c), SIGTERM, or SIGQUIT — on unix, any of
/// the four; off unix, ctrl-c only. Per §4.1/§5/§6, receiving any of these
/// is equivalent to calling `Stop`, so the caller is expected to cancel the
/// shared supervisor token on return rather than shutting down only its
/// own listener.
pub(crate) async fn wait_for_termination_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(unix)]
    let hangup = async {
        signal::unix::signal(signal::unix::SignalKind::hangup())
            .expect("failed to install SIGHUP handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    #[cfg(unix)]
    let quit = async {
        signal::unix::signal(signal::unix::SignalKind::quit())
            .expect("failed to install SIGQUIT handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = hangup => {},
        _ = quit => {},
    }
}

/// Waits for the shared supervisor token to be cancelled. `AxumServer`
/// passes this to `with_graceful_shutdown` so the HTTP driver's local
/// shutdown and `Service::stop`'s teardown are triggered by the exact same
/// signal, rather than the driver observing OS signals on its own.
async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
}

pub struct AxumServer;

#[async_trait]
impl Server for AxumServer {
    async fn listen_and_serve(&self, addr: SocketAddr, handler: Router, cancel: CancellationToken) -> Result<(), ServiceError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| ServiceError::Io(err.to_string()))?;
        tracing::info!(%addr, "http driver listening");
        axum::serve(listener, handler.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
            .map_err(|err| ServiceError::Io(err.to_string()))?;
        tracing::info!("http driver stopped");
        Ok(())
    }
}
