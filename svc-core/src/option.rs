//! `ServiceOption` models every constructible capability as data (the
//! REDESIGN FLAGS note on treating options as data rather than closures
//! over a builder). `apply_options` walks a fixed list once, applying
//! each variant in ascending dependency rank — telemetry and config are
//! already resolved by the time `Service::new` runs, so the remaining
//! order is: datastore, claims/authorization, pub/sub, events, job pool,
//! health checks, then anything bespoke via `Custom`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use svc_grpc::GrpcServer;
use svc_jobs::JobPoolConfig;
use svc_pubsub::MessageHandler;
use url::Url;

use crate::auth::AuthorizationClient;
use crate::claims_verifier::ClaimsVerifier;
use crate::config::AuthorizationConfig;
use crate::error::ServiceError;
use crate::health::HealthIndicatorErased;
use crate::service::Service;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// One constructible capability. Variants are applied in the fixed rank
/// documented on [`apply_options`], never in call-site order — a caller
/// may pass `vec![Subscriber{..}, Datastore{..}]` and the datastore still
/// lands first.
pub enum ServiceOption {
    Datastore {
        name: String,
        dsn: String,
        read_only: bool,
    },
    Claims(Arc<dyn ClaimsVerifier>),
    Authorization(AuthorizationConfig),
    Publisher {
        reference: String,
        url: Url,
    },
    Subscriber {
        reference: String,
        url: Url,
        handlers: Vec<Arc<dyn MessageHandler>>,
        concurrency: usize,
    },
    /// Registers a publisher/subscriber pair on `reference` whose
    /// subscriber hands every message to the service's `EventRegistry`
    /// (see `svc_events::emit`'s expectations).
    EventsQueue {
        reference: String,
        url: Url,
        concurrency: usize,
    },
    JobPool(JobPoolConfig),
    HealthCheck(Box<dyn HealthIndicatorErased>),
    Grpc(GrpcServer),
    /// Escape hatch for anything that doesn't warrant its own variant.
    /// Runs last, after every built-in capability is wired up.
    Custom(Box<dyn FnOnce(Arc<Service>) -> BoxFuture + Send>),
}

fn rank(option: &ServiceOption) -> u8 {
    match option {
        ServiceOption::Datastore { .. } => 0,
        ServiceOption::Claims(_) => 1,
        ServiceOption::Authorization(_) => 1,
        ServiceOption::Publisher { .. } => 2,
        ServiceOption::Subscriber { .. } => 3,
        ServiceOption::EventsQueue { .. } => 3,
        ServiceOption::JobPool(_) => 4,
        ServiceOption::HealthCheck(_) => 5,
        ServiceOption::Grpc(_) => 5,
        ServiceOption::Custom(_) => 6,
    }
}

pub(crate) async fn apply_options(service: &Arc<Service>, mut options: Vec<ServiceOption>) -> Result<(), ServiceError> {
    options.sort_by_key(rank);

    for option in options {
        match option {
            ServiceOption::Datastore { name, dsn, read_only } => {
                service.register_datastore(&name, &dsn, read_only).await?;
            }
            ServiceOption::Claims(verifier) => {
                service.set_claims_verifier(verifier).await;
            }
            ServiceOption::Authorization(config) => {
                service.set_authorization(AuthorizationClient::new(&config)).await;
            }
            ServiceOption::Publisher { reference, url } => {
                service.register_publisher(&reference, url).await;
            }
            ServiceOption::Subscriber {
                reference,
                url,
                handlers,
                concurrency,
            } => {
                service.register_subscriber(&reference, url, handlers, concurrency).await;
            }
            ServiceOption::EventsQueue { reference, url, concurrency } => {
                service.register_publisher(&reference, url.clone()).await;
                let handler: Arc<dyn MessageHandler> = service.events().clone();
                service.register_subscriber(&reference, url, vec![handler], concurrency).await;
                service.set_events_queue(&reference).await;
            }
            ServiceOption::JobPool(config) => {
                service.start_job_pool(config).await;
            }
            ServiceOption::HealthCheck(indicator) => {
                service.push_health_check(indicator).await;
            }
            ServiceOption::Grpc(server) => {
                service.set_grpc(server).await;
            }
            ServiceOption::Custom(hook) => {
                hook(service.clone()).await;
            }
        }
    }

    Ok(())
}
