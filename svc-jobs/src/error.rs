/// Errors raised by the job pool and result pipe.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("result channel closed")]
    ChannelClosed,

    #[error("job pool is stopped")]
    PoolStopped,

    #[error("job queue is full")]
    QueueFull,

    #[error("job failed: {0}")]
    Process(String),
}
