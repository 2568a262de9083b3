/// Errors raised while starting or running the gRPC driver.
#[derive(Debug, thiserror::Error)]
pub enum GrpcError {
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("failed to bind gRPC listener on {0}: {1}")]
    Bind(String, std::io::Error),
}
