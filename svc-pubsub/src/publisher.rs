use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use url::Url;

use crate::driver::PublishHandle;

/// A named outbound endpoint. Never publishable until the coordinator has
/// opened its topic (`Run` step 3); re-registering the same reference is
/// a no-op, enforced by the coordinator rather than here.
pub struct Publisher {
    pub reference: String,
    pub url: Url,
    handle: arc_swap_slot::Slot<dyn PublishHandle>,
    initiated: AtomicBool,
}

impl Publisher {
    pub fn new(reference: impl Into<String>, url: Url) -> Self {
        Self {
            reference: reference.into(),
            url,
            handle: arc_swap_slot::Slot::empty(),
            initiated: AtomicBool::new(false),
        }
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }

    pub(crate) fn set_handle(&self, handle: Arc<dyn PublishHandle>) {
        self.handle.set(handle);
        self.initiated.store(true, Ordering::Release);
    }

    pub(crate) fn handle(&self) -> Option<Arc<dyn PublishHandle>> {
        self.handle.get()
    }

    pub(crate) fn clear(&self) {
        self.initiated.store(false, Ordering::Release);
        self.handle.clear();
    }
}

/// A minimal single-slot `Option<Arc<T>>` guarded for concurrent
/// read/write without requiring callers to hold a lock across an await.
mod arc_swap_slot {
    use std::sync::{Arc, RwLock};

    pub struct Slot<T: ?Sized>(RwLock<Option<Arc<T>>>);

    impl<T: ?Sized> Slot<T> {
        pub fn empty() -> Self {
            Self(RwLock::new(None))
        }

        pub fn set(&self, value: Arc<T>) {
            *self.0.write().expect("slot poisoned") = Some(value);
        }

        pub fn get(&self) -> Option<Arc<T>> {
            self.0.read().expect("slot poisoned").clone()
        }

        pub fn clear(&self) {
            *self.0.write().expect("slot poisoned") = None;
        }
    }
}
