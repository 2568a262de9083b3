use std::convert::Infallible;
use std::task::{Context, Poll};

use http::{Request, Response};
use svc_grpc::GrpcServiceRegistry;
use tonic::body::Body as TonicBody;
use tower::Service;

#[derive(Clone)]
struct EchoService;

impl tonic::server::NamedService for EchoService {
    const NAME: &'static str = "test.Echo";
}

impl Service<Request<TonicBody>> for EchoService {
    type Response = Response<TonicBody>;
    type Error = Infallible;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<TonicBody>) -> Self::Future {
        Box::pin(async { Ok(Response::new(TonicBody::default())) })
    }
}

#[test]
fn registering_a_service_and_building_routes_does_not_panic() {
    let registry = GrpcServiceRegistry::new();
    registry.add_service(EchoService);
    let _routes = registry.routes();
}

#[test]
fn clone_shares_the_same_builder() {
    let registry = GrpcServiceRegistry::new();
    let cloned = registry.clone();
    cloned.add_service(EchoService);
    let _routes = registry.routes();
}

#[test]
#[should_panic(expected = "routes() was already built")]
fn adding_a_service_after_routes_were_built_panics() {
    let registry = GrpcServiceRegistry::new();
    let _routes = registry.routes();
    registry.add_service(EchoService);
}
