//! Mock transport for testing
//!
//! Sessions are driven explicitly: `connect`/`simulate_disconnect` flip the
//! state and await the matching callback inline, and `inject` delivers a
//! message to matching subscriptions before returning. Outbound messages
//! are recorded for inspection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use gwsim_core::{
    GatewayConfiguration, LifecycleCallback, Message, MessageHandler, Topic, TopicContext,
    Transport, TransportError,
};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::callbacks::CallbackSlots;
use crate::config::MockConfig;
use crate::subscriptions::SubscriptionTable;

/// A message sent through the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl PublishedMessage {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// In-memory transport
pub struct MockTransport {
    context: Arc<TopicContext>,
    accept_connections: AtomicBool,
    connected: AtomicBool,
    connect_attempts: AtomicUsize,
    callbacks: CallbackSlots,
    subscriptions: SubscriptionTable,
    published: RwLock<Vec<PublishedMessage>>,
}

impl MockTransport {
    pub fn new(gateway: &GatewayConfiguration, config: &MockConfig) -> Self {
        Self::with_context(gateway.topic_context(), config)
    }

    pub fn with_context(context: TopicContext, config: &MockConfig) -> Self {
        Self {
            context: Arc::new(context),
            accept_connections: AtomicBool::new(config.accept_connections),
            connected: AtomicBool::new(false),
            connect_attempts: AtomicUsize::new(0),
            callbacks: CallbackSlots::default(),
            subscriptions: SubscriptionTable::default(),
            published: RwLock::new(Vec::new()),
        }
    }

    /// Make subsequent `connect` calls succeed or fail
    pub fn set_accept_connections(&self, accept: bool) {
        self.accept_connections.store(accept, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Establish a session, as if the broker acknowledged
    ///
    /// Returns false if a session was already up.
    pub async fn simulate_connect(&self) -> bool {
        if self.connected.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!("Mock transport: connected");
        self.callbacks.fire_connected().await;
        true
    }

    /// Drop the session, as if the network went away
    ///
    /// Returns false if no session was up.
    pub async fn simulate_disconnect(&self) -> bool {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return false;
        }
        debug!("Mock transport: disconnected");
        self.callbacks.fire_disconnected().await;
        true
    }

    /// Deliver an inbound message to every matching subscription
    ///
    /// Returns the number of handlers invoked; nothing is delivered while
    /// disconnected.
    pub async fn inject(&self, topic: &str, payload: impl Into<Bytes>) -> usize {
        if !self.connected.load(Ordering::SeqCst) {
            debug!(%topic, "Mock transport: not connected, dropping injected message");
            return 0;
        }
        let parsed = match Topic::parse(topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%topic, error = %e, "Mock transport: dropping injected message");
                return 0;
            }
        };
        let message = Message::new(parsed, payload, self.context.clone());
        self.subscriptions.deliver(message).await
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn clear_published(&self) {
        self.published.write().clear();
    }

    /// Rendered filters currently recorded
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.filters()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn topic_context(&self) -> Arc<TopicContext> {
        self.context.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.accept_connections.load(Ordering::SeqCst) {
            warn!("Mock transport: connection refused");
            return;
        }
        self.simulate_connect().await;
    }

    async fn disconnect(&self) {
        self.simulate_disconnect().await;
    }

    fn when_connected(&self, callback: LifecycleCallback) {
        self.callbacks.set_connected(callback);
    }

    fn when_disconnected(&self, callback: LifecycleCallback) {
        self.callbacks.set_disconnected(callback);
    }

    async fn try_subscribe(
        &self,
        filter: &str,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.subscriptions.insert(filter, handler)?;
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    async fn try_unsubscribe(&self, filter: &str) -> Result<(), TransportError> {
        self.subscriptions.remove(filter);
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    async fn try_publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        debug!(%topic, len = payload.len(), "Mock transport: published message");
        self.published.write().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
