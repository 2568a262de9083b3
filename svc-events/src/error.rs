/// Errors raised while decoding, validating, or executing an event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("no handler registered for event {0:?}")]
    UnknownEvent(String),

    #[error("message is missing the event_name metadata key")]
    MissingEventName,

    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("payload validation failed: {0}")]
    Validation(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    PubSub(#[from] svc_pubsub::PubSubError),

    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

impl From<EventError> for svc_pubsub::PubSubError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::PubSub(inner) => inner,
            other => svc_pubsub::PubSubError::Driver(other.to_string()),
        }
    }
}
