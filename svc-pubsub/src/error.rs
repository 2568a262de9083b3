/// Errors raised by the coordinator and its drivers.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("no publisher or subscriber registered under reference {0:?}")]
    NotRegistered(String),

    #[error("{0:?} is not initiated yet (Run has not opened it)")]
    Uninitiated(String),

    #[error("no driver registered for scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("invalid driver URL: {0}")]
    InvalidUrl(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("result channel closed")]
    Closed,
}
