//! Ordered delivery of session events
//!
//! Lifecycle transitions and inbound messages are queued to a single task
//! per transport, which awaits callbacks and handlers one at a time. That
//! keeps connected/disconnected notifications in the order the session
//! produced them and never runs user code on the network loop.

use std::sync::Arc;

use gwsim_core::Message;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::callbacks::CallbackSlots;
use crate::subscriptions::SubscriptionTable;

#[derive(Debug)]
pub(crate) enum Dispatch {
    Connected,
    Disconnected,
    Message(Message),
}

pub(crate) struct Dispatcher {
    tx: Mutex<Option<mpsc::UnboundedSender<Dispatch>>>,
    callbacks: Arc<CallbackSlots>,
    subscriptions: Arc<SubscriptionTable>,
}

impl Dispatcher {
    pub fn new(callbacks: Arc<CallbackSlots>, subscriptions: Arc<SubscriptionTable>) -> Self {
        Self {
            tx: Mutex::new(None),
            callbacks,
            subscriptions,
        }
    }

    /// Sender feeding the dispatch task, spawning the task if needed
    ///
    /// Must be called from within a Tokio runtime.
    pub fn sender(&self) -> mpsc::UnboundedSender<Dispatch> {
        let mut guard = self.tx.lock();
        if let Some(tx) = guard.as_ref().filter(|tx| !tx.is_closed()) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, self.callbacks.clone(), self.subscriptions.clone()));
        *guard = Some(tx.clone());
        tx
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Dispatch>,
    callbacks: Arc<CallbackSlots>,
    subscriptions: Arc<SubscriptionTable>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            Dispatch::Connected => callbacks.fire_connected().await,
            Dispatch::Disconnected => callbacks.fire_disconnected().await,
            Dispatch::Message(message) => {
                subscriptions.deliver(message).await;
            }
        }
    }
    debug!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwsim_core::{lifecycle_callback, message_handler, Topic, TopicContext};
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let callbacks = Arc::new(CallbackSlots::default());
        let subscriptions = Arc::new(SubscriptionTable::default());
        let (log_tx, mut log_rx) = unbounded_channel::<String>();

        let tx = log_tx.clone();
        callbacks.set_connected(lifecycle_callback(move || {
            let tx = tx.clone();
            async move {
                tokio::task::yield_now().await;
                let _ = tx.send("connected".to_string());
            }
        }));
        let tx = log_tx.clone();
        callbacks.set_disconnected(lifecycle_callback(move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send("disconnected".to_string());
            }
        }));
        let tx = log_tx.clone();
        subscriptions
            .insert(
                "a/#",
                message_handler(move |msg| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(format!("message {}", msg.topic()));
                    }
                }),
            )
            .unwrap();
        drop(log_tx);

        let dispatcher = Dispatcher::new(callbacks, subscriptions);
        let sender = dispatcher.sender();
        sender.send(Dispatch::Connected).unwrap();
        sender
            .send(Dispatch::Message(Message::new(
                Topic::parse("a/b").unwrap(),
                "payload",
                Arc::new(TopicContext::new()),
            )))
            .unwrap();
        sender.send(Dispatch::Disconnected).unwrap();
        drop(sender);
        drop(dispatcher);

        let mut seen = Vec::new();
        while let Some(entry) = log_rx.recv().await {
            seen.push(entry);
        }
        assert_eq!(seen, vec!["connected", "message a/b", "disconnected"]);
    }

    #[tokio::test]
    async fn test_sender_reuses_running_task() {
        let dispatcher = Dispatcher::new(
            Arc::new(CallbackSlots::default()),
            Arc::new(SubscriptionTable::default()),
        );
        let first = dispatcher.sender();
        let second = dispatcher.sender();
        assert!(first.same_channel(&second));
    }
}
