//! Message handler registry.
//!
//! Handlers are registered by consumers and invoked for every non-heartbeat
//! event, whether it arrived over the socket or from the fallback poller.
//! Iteration order across handlers is unspecified.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use opspulse_shared::ServerEvent;

type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;
type HandlerMap = Mutex<HashMap<u64, Handler>>;

/// Shared set of message handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<HandlerMap>,
    next_id: Arc<AtomicU64>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. The returned guard unsubscribes it on drop (or via
    /// [`HandlerGuard::unsubscribe`]); after that the handler is guaranteed to
    /// receive no further events.
    pub fn add(&self, handler: impl Fn(&ServerEvent) + Send + Sync + 'static) -> HandlerGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .expect("handler registry poisoned")
            .insert(id, Arc::new(handler));
        HandlerGuard {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Dispatch an event to every currently-registered handler.
    pub fn dispatch(&self, event: &ServerEvent) {
        // Clone out of the lock so a handler can (un)register without deadlock.
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .expect("handler registry poisoned")
            .values()
            .cloned()
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().expect("handler registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unsubscribe token for a registered handler.
pub struct HandlerGuard {
    id: u64,
    handlers: Weak<HandlerMap>,
}

impl HandlerGuard {
    /// Remove the handler now instead of waiting for drop.
    pub fn unsubscribe(self) {}
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers
                .lock()
                .expect("handler registry poisoned")
                .remove(&self.id);
        }
    }
}
