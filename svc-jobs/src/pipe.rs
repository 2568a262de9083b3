use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::JobError;

/// A value written onto a job's result pipe: either a produced value or a
/// terminal error.
#[derive(Debug)]
pub enum JobResult<T> {
    Value(T),
    Error(JobError),
}

/// The write side of a job's buffered result channel. Retries of the
/// same logical job share one pipe (cloning it shares the same
/// underlying sender slot), so a caller reading the first result sees
/// either the eventual success or the final error after retries are
/// exhausted.
///
/// `Close` is idempotent and takes the sender out of its slot, so the
/// receiver observes the channel's own closed signal rather than a
/// side-channel flag; any write after close returns
/// [`JobError::ChannelClosed`].
pub struct ResultPipe<T> {
    sender: Arc<Mutex<Option<mpsc::Sender<JobResult<T>>>>>,
}

impl<T> Clone for ResultPipe<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> ResultPipe<T> {
    pub async fn write_result(&self, value: T) -> Result<(), JobError> {
        self.send(JobResult::Value(value)).await
    }

    pub async fn write_error(&self, error: JobError) -> Result<(), JobError> {
        self.send(JobResult::Error(error)).await
    }

    async fn send(&self, result: JobResult<T>) -> Result<(), JobError> {
        let guard = self.sender.lock().await;
        match guard.as_ref() {
            Some(sender) => sender.send(result).await.map_err(|_| JobError::ChannelClosed),
            None => Err(JobError::ChannelClosed),
        }
    }

    /// Idempotent: subsequent calls are no-ops.
    pub async fn close(&self) {
        *self.sender.lock().await = None;
    }

    pub async fn is_closed(&self) -> bool {
        self.sender.lock().await.is_none()
    }
}

/// The read side of a job's result pipe.
pub struct ResultPipeReceiver<T> {
    receiver: mpsc::Receiver<JobResult<T>>,
}

impl<T> ResultPipeReceiver<T> {
    /// Returns `None` once the pipe has been closed and drained.
    pub async fn recv(&mut self) -> Option<JobResult<T>> {
        self.receiver.recv().await
    }
}

pub fn result_pipe<T>(capacity: usize) -> (ResultPipe<T>, ResultPipeReceiver<T>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        ResultPipe {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        ResultPipeReceiver { receiver },
    )
}
