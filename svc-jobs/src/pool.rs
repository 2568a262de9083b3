use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::JobContext;
use crate::error::JobError;
use crate::job::Job;

const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Worker pool sizing. Defaults mirror the documented capacity default
/// (`100`) and a CPU-count-plus-one worker count.
#[derive(Debug, Clone, Copy)]
pub struct JobPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for JobPoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            + 1;
        Self {
            workers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// A bounded worker pool. Owns no tasks beyond its fixed set of workers;
/// submitting to a stopped pool errors, and in-flight jobs observe
/// cancellation through [`JobContext`].
pub struct JobPool<T: Send + 'static> {
    sender: mpsc::Sender<Job<T>>,
    stopped: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> JobPool<T> {
    pub fn start(config: JobPoolConfig) -> Self {
        Self::start_with_cancel(config, CancellationToken::new())
    }

    pub fn start_with_cancel(config: JobPoolConfig, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stopped = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.workers.max(1));
        for _ in 0..config.workers.max(1) {
            let rx = rx.clone();
            let retry_tx = tx.clone();
            let worker_cancel = cancel.clone();
            workers.push(tokio::spawn(worker_loop(rx, retry_tx, worker_cancel)));
        }

        Self {
            sender: tx,
            stopped,
            workers,
            cancel,
        }
    }

    /// Non-blocking: errors immediately if the pool is stopped or the
    /// queue is full rather than waiting for a free worker.
    pub fn submit(&self, job: Job<T>) -> Result<(), JobError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(JobError::PoolStopped);
        }
        self.sender.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => JobError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => JobError::PoolStopped,
        })
    }

    /// Cancels all in-flight jobs and waits for every worker to exit.
    pub async fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }
}

async fn worker_loop<T: Send + 'static>(
    rx: Arc<Mutex<mpsc::Receiver<Job<T>>>>,
    retry_tx: mpsc::Sender<Job<T>>,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut guard = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => return,
                job = guard.recv() => job,
            }
        };
        let Some(job) = job else { return };
        run_job(job, &retry_tx, &cancel).await;
    }
}

async fn run_job<T: Send + 'static>(job: Job<T>, retry_tx: &mpsc::Sender<Job<T>>, cancel: &CancellationToken) {
    job.mark_run();
    let ctx = JobContext::new(cancel.clone());
    let pipe = job.pipe.clone();

    match (job.process)(ctx, pipe.clone()).await {
        Ok(()) => {
            pipe.close().await;
        }
        Err(err) => match job.retry() {
            Some(retry_job) => {
                if retry_tx.send(retry_job).await.is_err() {
                    warn!("failed to resubmit retry, pool shutting down");
                    pipe.close().await;
                }
            }
            None => {
                let _ = pipe.write_error(err).await;
                pipe.close().await;
            }
        },
    }
}
