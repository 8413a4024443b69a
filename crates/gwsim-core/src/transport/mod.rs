//! Transport capability
//!
//! A [`Transport`] is the simulator's only window onto the network: it
//! owns the pub/sub session, renders topics against its [`TopicContext`],
//! and reports session transitions through two single-slot callbacks.
//!
//! Raw operations (`try_*`) report failures as [`TransportError`]. The
//! contract operations built on top of them (`subscribe`, `unsubscribe`,
//! `send_message`) log transport failures and swallow them, so a simulated
//! device keeps running through network trouble. Only topic errors, which
//! are configuration mistakes, reach the caller.

mod error;

pub use error::TransportError;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::TopicError;
use crate::message::Message;
use crate::topic::{Topic, TopicContext};

/// Shared handle to a transport
pub type SharedTransport = Arc<dyn Transport>;

/// Callback fired on a session transition
pub type LifecycleCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback fired once per inbound message on a subscription
pub type MessageHandler = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`LifecycleCallback`]
pub fn lifecycle_callback<F, Fut>(f: F) -> LifecycleCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Wrap an async closure as a [`MessageHandler`]
pub fn message_handler<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |message| f(message).boxed())
}

/// Pub/sub session as seen by a simulated device
///
/// Callbacks and message handlers run on a task owned by the
/// implementation, concurrently with calls made from elsewhere.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bindings used to render every topic passed to this transport
    fn topic_context(&self) -> Arc<TopicContext>;

    /// Current network view; may be stale by the time it is used
    fn is_connected(&self) -> bool;

    /// Start a session
    ///
    /// On success the connected callback fires once. On failure the error
    /// is logged and no callback fires; calling `connect` again retries.
    async fn connect(&self);

    /// Tear the session down
    ///
    /// The disconnected callback fires once per established session,
    /// whether the teardown was requested or the connection was lost.
    async fn disconnect(&self);

    /// Disconnect and release whatever the session holds
    ///
    /// The transport may be connected again afterwards.
    async fn close(&self) {
        self.disconnect().await;
    }

    /// Register the connected callback, replacing any previous one
    fn when_connected(&self, callback: LifecycleCallback);

    /// Register the disconnected callback, replacing any previous one
    fn when_disconnected(&self, callback: LifecycleCallback);

    /// Record a subscription on a rendered filter and send it if connected
    ///
    /// The subscription is kept even when this returns
    /// [`TransportError::NotConnected`] and is applied on the next connect.
    async fn try_subscribe(&self, filter: &str, handler: MessageHandler)
        -> Result<(), TransportError>;

    /// Forget a subscription and send the unsubscribe if connected
    async fn try_unsubscribe(&self, filter: &str) -> Result<(), TransportError>;

    /// Publish on a rendered topic at most once
    async fn try_publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribe `handler` to `topic` rendered against this transport's context
    async fn subscribe(&self, topic: &Topic, handler: MessageHandler) -> Result<(), TopicError> {
        let filter = topic.render(&self.topic_context())?;
        match self.try_subscribe(&filter, handler).await {
            Ok(()) => debug!(%filter, "Subscribed"),
            Err(TransportError::NotConnected) => {
                debug!(%filter, "Not connected, subscription applies on connect")
            }
            Err(e) => warn!(%filter, error = %e, "Failed to subscribe"),
        }
        Ok(())
    }

    /// Best-effort unsubscribe
    async fn unsubscribe(&self, topic: &Topic) -> Result<(), TopicError> {
        let filter = topic.render(&self.topic_context())?;
        match self.try_unsubscribe(&filter).await {
            Ok(()) => debug!(%filter, "Unsubscribed"),
            Err(TransportError::NotConnected) => {}
            Err(e) => warn!(%filter, error = %e, "Failed to unsubscribe"),
        }
        Ok(())
    }

    /// Fire-and-forget publish; every failure is logged and dropped
    async fn send_message(&self, topic: &Topic, payload: Bytes) {
        let rendered = match topic.render(&self.topic_context()) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(%topic, error = %e, "Dropping message for unrenderable topic");
                return;
            }
        };
        debug!(topic = %rendered, len = payload.len(), "Sending message");
        if let Err(e) = self.try_publish(&rendered, payload).await {
            debug!(topic = %rendered, error = %e, "Failed to send message");
        }
    }
}
