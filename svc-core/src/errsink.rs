//! The single-slot fatal-error channel (§3 data model, §5 "Cyclic fan-in
//! channel" redesign note). Many tasks may try to report a terminal error;
//! exactly one is delivered, the rest are silently dropped rather than
//! panicking on a closed channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::ServiceError;

/// Write side: cloned into every long-running task. `send` after the first
/// successful send (by any clone) is a silent no-op.
#[derive(Clone)]
pub struct ErrorSink {
    sender: mpsc::Sender<ServiceError>,
    sent: Arc<AtomicBool>,
}

/// Read side: owned by the supervisor, consumed exactly once in `Run`
/// step 8.
pub struct ErrorSource {
    receiver: Mutex<mpsc::Receiver<ServiceError>>,
}

/// Build a fresh single-slot sink/source pair. Capacity 1: a second send
/// blocks only if nobody has drained the first, which `compare_exchange`
/// on `sent` prevents from ever happening.
pub fn error_sink() -> (ErrorSink, ErrorSource) {
    let (tx, rx) = mpsc::channel(1);
    (
        ErrorSink {
            sender: tx,
            sent: Arc::new(AtomicBool::new(false)),
        },
        ErrorSource {
            receiver: Mutex::new(rx),
        },
    )
}

impl ErrorSink {
    /// Report a terminal error. Only the first call across all clones of
    /// this sink actually delivers; later calls are dropped.
    pub async fn send(&self, err: ServiceError) {
        if self.sent.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return;
        }
        let _ = self.sender.send(err).await;
    }

    /// Report clean exit — never delivered, but marks the slot spent so a
    /// racing real error from the same task is still dropped correctly if
    /// it arrives after this task already declared itself done.
    pub fn mark_done(&self) {
        self.sent.store(true, Ordering::SeqCst);
    }
}

impl ErrorSource {
    /// Wait for the first fatal error. Returns `None` if every sink was
    /// dropped without ever sending (all subsystems exited cleanly).
    pub async fn recv(&self) -> Option<ServiceError> {
        self.receiver.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_send_is_delivered() {
        let (sink, source) = error_sink();
        sink.send(ServiceError::Fatal("boom".to_string())).await;
        let err = source.recv().await.unwrap();
        assert!(matches!(err, ServiceError::Fatal(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn second_send_from_a_clone_is_silently_dropped() {
        let (sink, source) = error_sink();
        let other = sink.clone();
        sink.send(ServiceError::Fatal("first".to_string())).await;
        other.send(ServiceError::Fatal("second".to_string())).await;
        let err = source.recv().await.unwrap();
        assert!(matches!(err, ServiceError::Fatal(msg) if msg == "first"));
    }

    #[tokio::test]
    async fn concurrent_sends_after_stop_never_panic() {
        let (sink, source) = error_sink();
        sink.mark_done();
        sink.send(ServiceError::Fatal("late".to_string())).await;
        drop(sink);
        assert!(source.recv().await.is_none());
    }
}
