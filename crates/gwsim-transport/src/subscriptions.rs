//! Subscription table shared by the transports
//!
//! Holds every subscription made on a transport, connected or not, so the
//! set can be replayed when a session is (re)established.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use gwsim_core::{Message, MessageHandler, Topic, TransportError};
use parking_lot::RwLock;
use tracing::{debug, warn};

struct Subscription {
    filter: String,
    pattern: Topic,
    handler: MessageHandler,
}

#[derive(Default)]
pub(crate) struct SubscriptionTable {
    entries: RwLock<Vec<Subscription>>,
}

impl SubscriptionTable {
    /// Record a handler for `filter`; returns true if it replaced one
    pub fn insert(&self, filter: &str, handler: MessageHandler) -> Result<bool, TransportError> {
        let pattern = Topic::parse(filter)
            .map_err(|e| TransportError::SubscribeFailed(format!("{}: {}", filter, e)))?;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|s| s.filter == filter) {
            existing.handler = handler;
            return Ok(true);
        }
        entries.push(Subscription {
            filter: filter.to_string(),
            pattern,
            handler,
        });
        Ok(false)
    }

    pub fn remove(&self, filter: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|s| s.filter != filter);
        entries.len() != before
    }

    pub fn filters(&self) -> Vec<String> {
        self.entries.read().iter().map(|s| s.filter.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn handlers_for(&self, topic: &str) -> Vec<MessageHandler> {
        self.entries
            .read()
            .iter()
            .filter(|s| s.pattern.matches(topic))
            .map(|s| s.handler.clone())
            .collect()
    }

    /// Invoke every handler whose filter matches, in subscription order
    ///
    /// Returns the number of handlers invoked.
    pub async fn deliver(&self, message: Message) -> usize {
        let topic = message.topic().to_string();
        let handlers = self.handlers_for(&topic);
        if handlers.is_empty() {
            debug!(%topic, "No subscription matches inbound message");
        }

        for handler in &handlers {
            if AssertUnwindSafe(handler(message.clone()))
                .catch_unwind()
                .await
                .is_err()
            {
                warn!(%topic, "Message handler panicked");
            }
        }
        handlers.len()
    }
}
