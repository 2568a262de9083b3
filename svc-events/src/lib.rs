//! Named event dispatch: a thin convention layered on `svc-pubsub`. Every
//! event is published to a single configured queue with an `event_name`
//! metadata header; the queue's subscriber is an [`EventRegistry`], which
//! decodes, validates, and executes by that name.

mod error;
mod handler;
mod registry;

pub use error::EventError;
pub use handler::EventHandler;
pub use registry::{emit, EventRegistry, EVENT_NAME_METADATA_KEY};
