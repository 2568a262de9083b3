//! Health aggregation.
//!
//! [`HealthIndicator`] is the seam subsystems plug a check into (e.g.
//! `svc-data::Connection::check`); [`HealthState`] aggregates every
//! registered indicator into the `/healthz` response the supervisor mounts
//! in `Run` step 2, and the same indicator list backs the gRPC driver's
//! standard health service (`svc_grpc::GrpcServer::set_serving`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down(String),
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }
}

/// A named health check. Liveness-only checks return `false` from
/// `affects_readiness` so a slow-but-alive dependency doesn't flip
/// readiness off.
pub trait HealthIndicator: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check(&self) -> impl std::future::Future<Output = HealthStatus> + Send;
    fn affects_readiness(&self) -> bool {
        true
    }
}

#[doc(hidden)]
pub trait HealthIndicatorErased: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>>;
    fn affects_readiness(&self) -> bool;
}

impl<T: HealthIndicator> HealthIndicatorErased for T {
    fn name(&self) -> &str {
        HealthIndicator::name(self)
    }

    fn check(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(HealthIndicator::check(self))
    }

    fn affects_readiness(&self) -> bool {
        HealthIndicator::affects_readiness(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthCheckStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthCheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthCheckStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
    pub uptime_seconds: u64,
}

/// Assembles the registered indicators into the [`HealthState`] the
/// supervisor installs at `Run` step 2.
#[derive(Default)]
pub struct HealthBuilder {
    checks: Vec<Box<dyn HealthIndicatorErased>>,
    cache_ttl: Option<Duration>,
}

impl HealthBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check<H: HealthIndicator>(mut self, indicator: H) -> Self {
        self.checks.push(Box::new(indicator));
        self
    }

    /// As [`Self::check`], but for a caller that already has a
    /// type-erased indicator (e.g. one collected from a `ServiceOption`).
    pub fn check_erased(mut self, indicator: Box<dyn HealthIndicatorErased>) -> Self {
        self.checks.push(indicator);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> HealthState {
        HealthState {
            checks: self.checks,
            start_time: Instant::now(),
            cache_ttl: self.cache_ttl,
            cache: tokio::sync::RwLock::new(None),
        }
    }
}

pub struct HealthState {
    checks: Vec<Box<dyn HealthIndicatorErased>>,
    start_time: Instant,
    cache_ttl: Option<Duration>,
    cache: tokio::sync::RwLock<Option<(HealthResponse, Instant)>>,
}

impl HealthState {
    async fn run_checks(&self, readiness_only: bool) -> HealthResponse {
        let mut checks = Vec::with_capacity(self.checks.len());
        let mut all_up = true;

        for indicator in &self.checks {
            if readiness_only && !indicator.affects_readiness() {
                continue;
            }
            let start = Instant::now();
            let status = indicator.check().await;
            let duration_ms = start.elapsed().as_millis() as u64;
            let (check_status, reason) = match &status {
                HealthStatus::Up => (HealthCheckStatus::Up, None),
                HealthStatus::Down(reason) => {
                    all_up = false;
                    (HealthCheckStatus::Down, Some(reason.clone()))
                }
            };
            checks.push(HealthCheck {
                name: indicator.name().to_string(),
                status: check_status,
                reason,
                duration_ms: Some(duration_ms),
            });
        }

        HealthResponse {
            status: if all_up { HealthCheckStatus::Up } else { HealthCheckStatus::Down },
            checks,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub async fn aggregate(&self) -> HealthResponse {
        if let Some(ttl) = self.cache_ttl {
            let cache = self.cache.read().await;
            if let Some((response, timestamp)) = cache.as_ref() {
                if timestamp.elapsed() < ttl {
                    return response.clone();
                }
            }
        }
        let response = self.run_checks(false).await;
        if self.cache_ttl.is_some() {
            *self.cache.write().await = Some((response.clone(), Instant::now()));
        }
        response
    }

    pub async fn aggregate_readiness(&self) -> HealthResponse {
        self.run_checks(true).await
    }

    /// Snapshot as `(name, is_up)` pairs — the list `svc-grpc`'s health
    /// service reflects via `GrpcServer::set_serving` for parity with this
    /// endpoint's aggregate status.
    pub async fn overall_is_up(&self) -> bool {
        self.aggregate().await.status.is_up()
    }
}

impl HealthCheckStatus {
    fn is_up(&self) -> bool {
        matches!(self, HealthCheckStatus::Up)
    }
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = state.aggregate().await;
    let status = if response.status.is_up() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = state.aggregate_readiness().await;
    let status = if response.status.is_up() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Mounts `{base}`, `{base}/live`, `{base}/ready` on a router carrying the
/// given state. `base` defaults to `/healthz` per the driver abstraction's
/// configured-path contract.
pub fn health_router(base: &str, state: Arc<HealthState>) -> Router {
    Router::new()
        .route(base, get(health_handler))
        .route(&format!("{base}/live"), get(liveness_handler))
        .route(&format!("{base}/ready"), get(readiness_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysUp;
    impl HealthIndicator for AlwaysUp {
        fn name(&self) -> &str {
            "always-up"
        }
        async fn check(&self) -> HealthStatus {
            HealthStatus::Up
        }
    }

    struct AlwaysDown(&'static str);
    impl HealthIndicator for AlwaysDown {
        fn name(&self) -> &str {
            self.0
        }
        async fn check(&self) -> HealthStatus {
            HealthStatus::Down("boom".to_string())
        }
    }

    struct DownButLivenessOnly;
    impl HealthIndicator for DownButLivenessOnly {
        fn name(&self) -> &str {
            "liveness-only"
        }
        async fn check(&self) -> HealthStatus {
            HealthStatus::Down("disk almost full".to_string())
        }
        fn affects_readiness(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn all_up_aggregates_to_up() {
        let state = HealthBuilder::new().check(AlwaysUp).build();
        let response = state.aggregate().await;
        assert!(response.status.is_up());
        assert_eq!(response.checks.len(), 1);
    }

    #[tokio::test]
    async fn one_down_check_fails_the_aggregate() {
        let state = HealthBuilder::new().check(AlwaysUp).check(AlwaysDown("db")).build();
        let response = state.aggregate().await;
        assert!(!response.status.is_up());
        assert_eq!(response.checks.iter().find(|c| c.name == "db").unwrap().reason.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn liveness_only_check_does_not_affect_readiness() {
        let state = HealthBuilder::new().check(DownButLivenessOnly).build();
        assert!(!state.aggregate().await.status.is_up());
        assert!(state.aggregate_readiness().await.status.is_up());
    }

    #[tokio::test]
    async fn cache_ttl_reuses_the_previous_result_within_the_window() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        struct Counting(Arc<AtomicUsize>);
        impl HealthIndicator for Counting {
            fn name(&self) -> &str {
                "counting"
            }
            async fn check(&self) -> HealthStatus {
                self.0.fetch_add(1, Ordering::SeqCst);
                HealthStatus::Up
            }
        }
        let counter = Arc::new(AtomicUsize::new(0));
        let state = HealthBuilder::new()
            .check(Counting(counter.clone()))
            .cache_ttl(Duration::from_secs(60))
            .build();
        state.aggregate().await;
        state.aggregate().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
