use tokio_util::sync::CancellationToken;

/// Passed to a job's process function. In-flight jobs observe
/// cancellation through this handle rather than a side-channel.
#[derive(Clone)]
pub struct JobContext {
    cancel: CancellationToken,
}

impl JobContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
