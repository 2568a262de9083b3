//! Named publisher/subscriber coordination over a pluggable, URL-scheme
//! selected driver registry. `mem://` is built in and is the only driver
//! this crate ships; anything else implements [`driver::PubSubDriver`].

mod context;
mod coordinator;
mod driver;
mod error;
mod mem;
mod message;
mod publisher;
mod subscriber;

pub use context::{FnHandler, HandlerContext, MessageHandler};
pub use coordinator::{Cleanup, PubSubCoordinator};
pub use driver::{DriverRegistry, PubSubDriver, PublishHandle, SubscribeHandle};
pub use error::PubSubError;
pub use mem::MemDriver;
pub use message::{Envelope, Message, PublishPayload};
pub use publisher::Publisher;
pub use subscriber::{Subscriber, SubscriberState};
