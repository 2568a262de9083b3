use svc_grpc::GrpcServer;

#[tokio::test]
async fn a_health_reporter_clone_outlives_the_server_it_was_taken_from() {
    let server = GrpcServer::on_port("127.0.0.1:0".parse().unwrap());
    let reporter = server.health_reporter();

    // `serve` would consume `server` by value; a caller that wants to keep
    // updating status while it runs has to take the reporter handle first.
    drop(server);

    reporter.set_serving(true).await;
    reporter.set_serving(false).await;
}

#[tokio::test]
async fn set_serving_through_the_server_and_through_a_reporter_clone_agree() {
    let server = GrpcServer::on_port("127.0.0.1:0".parse().unwrap());
    let reporter = server.health_reporter();

    server.set_serving(true).await;
    reporter.set_serving(false).await;
    reporter.clone().set_serving(true).await;
}
