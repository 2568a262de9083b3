//! A bounded worker pool for retryable jobs: `Submit` hands a [`Job`] to
//! whichever worker is free, retries on process-function failure share
//! the original [`ResultPipe`], and the pipe's close is idempotent.

mod context;
mod error;
mod job;
mod pipe;
mod pool;

pub use context::JobContext;
pub use error::JobError;
pub use job::Job;
pub use pipe::{result_pipe, JobResult, ResultPipe, ResultPipeReceiver};
pub use pool::{JobPool, JobPoolConfig};
