use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::context::JobContext;
use crate::error::JobError;
use crate::pipe::{result_pipe, ResultPipe, ResultPipeReceiver};

const DEFAULT_PIPE_CAPACITY: usize = 16;

type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;
type ProcessFn<T> = Arc<dyn Fn(JobContext, ResultPipe<T>) -> ProcessFuture + Send + Sync>;

/// A unit of retryable work. `Runs()` counts every invocation of the
/// process function across the original submission and all of its
/// retries — it is shared state, cloned (not reset) into each retry.
pub struct Job<T: Send + 'static> {
    pub id: Uuid,
    pub(crate) process: ProcessFn<T>,
    pub(crate) retries_remaining: usize,
    run_count: Arc<AtomicUsize>,
    pub(crate) pipe: ResultPipe<T>,
}

impl<T: Send + 'static> Job<T> {
    /// Build a job and its result pipe. `retries` is the number of
    /// *additional* attempts allowed after the first.
    pub fn new<F, Fut>(process: F, retries: usize) -> (Self, ResultPipeReceiver<T>)
    where
        F: Fn(JobContext, ResultPipe<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self::with_pipe_capacity(process, retries, DEFAULT_PIPE_CAPACITY)
    }

    pub fn with_pipe_capacity<F, Fut>(
        process: F,
        retries: usize,
        pipe_capacity: usize,
    ) -> (Self, ResultPipeReceiver<T>)
    where
        F: Fn(JobContext, ResultPipe<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let (pipe, receiver) = result_pipe(pipe_capacity);
        let process: ProcessFn<T> = Arc::new(move |ctx, pipe| Box::pin(process(ctx, pipe)));
        let job = Job {
            id: Uuid::new_v4(),
            process,
            retries_remaining: retries,
            run_count: Arc::new(AtomicUsize::new(0)),
            pipe,
        };
        (job, receiver)
    }

    pub fn runs(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_run(&self) {
        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    /// A retry job sharing this job's pipe and cumulative run counter,
    /// or `None` if the retry budget is exhausted.
    pub(crate) fn retry(&self) -> Option<Job<T>> {
        if self.retries_remaining == 0 {
            return None;
        }
        Some(Job {
            id: self.id,
            process: self.process.clone(),
            retries_remaining: self.retries_remaining - 1,
            run_count: self.run_count.clone(),
            pipe: self.pipe.clone(),
        })
    }
}
