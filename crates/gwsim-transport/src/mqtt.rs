//! MQTT transport
//!
//! Each `connect` starts a fresh rumqttc client and spawns a session loop
//! that polls its event loop. The loop:
//! - replays recorded subscriptions and reports `Connected` on every ConnAck
//! - turns inbound publishes into [`Message`]s for the dispatcher
//! - reports `Disconnected` once per lost session and retries with
//!   exponential backoff until `disconnect` is called

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use gwsim_core::{
    GatewayConfiguration, LifecycleCallback, Message, MessageHandler, Topic, TopicContext,
    Transport, TransportError,
};
use parking_lot::RwLock;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::broker::BrokerAddress;
use crate::callbacks::CallbackSlots;
use crate::config::{MqttConfig, ReconnectConfig};
use crate::dispatch::{Dispatch, Dispatcher};
use crate::subscriptions::SubscriptionTable;

/// Transport backed by an MQTT 3.1.1 session
pub struct MqttTransport {
    config: MqttConfig,
    broker: BrokerAddress,
    client_id: String,
    context: Arc<TopicContext>,
    subscriptions: Arc<SubscriptionTable>,
    callbacks: Arc<CallbackSlots>,
    dispatcher: Dispatcher,
    connected: Arc<AtomicBool>,
    client: RwLock<Option<AsyncClient>>,
    session: Mutex<Option<SessionHandle>>,
}

struct SessionHandle {
    task: JoinHandle<()>,
    stop: Arc<Notify>,
    stopping: Arc<AtomicBool>,
}

impl MqttTransport {
    pub fn new(
        gateway: &GatewayConfiguration,
        config: &MqttConfig,
    ) -> Result<Self, TransportError> {
        let broker = BrokerAddress::parse(&gateway.broker_url)?;
        if gateway.client_id.is_empty() {
            return Err(TransportError::InvalidConfig(
                "client_id must not be empty".to_string(),
            ));
        }

        let callbacks = Arc::new(CallbackSlots::default());
        let subscriptions = Arc::new(SubscriptionTable::default());
        Ok(Self {
            config: config.clone(),
            broker,
            client_id: gateway.client_id.clone(),
            context: Arc::new(gateway.topic_context()),
            dispatcher: Dispatcher::new(callbacks.clone(), subscriptions.clone()),
            subscriptions,
            callbacks,
            connected: Arc::new(AtomicBool::new(false)),
            client: RwLock::new(None),
            session: Mutex::new(None),
        })
    }

    pub fn broker(&self) -> &BrokerAddress {
        &self.broker
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.broker.host, self.broker.port);
        options
            .set_keep_alive(self.config.keep_alive())
            .set_clean_session(self.config.clean_session);
        if let Some(username) = &self.broker.username {
            options.set_credentials(username, self.broker.password.as_deref().unwrap_or(""));
        }
        options
    }

    /// Kill a session task that missed its deadline
    ///
    /// The task may have reported the session just before it was killed,
    /// in which case the matching disconnect is reported here.
    fn abandon(&self, task: AbortHandle) {
        task.abort();
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.dispatcher.sender().send(Dispatch::Disconnected);
        }
    }

    fn connected_client(&self) -> Result<AsyncClient, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.client.read().clone().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn topic_context(&self) -> Arc<TopicContext> {
        self.context.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) {
        let mut session = self.session.lock().await;
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            debug!(broker = %self.broker, "MQTT session already running");
            return;
        }

        let (client, eventloop) =
            AsyncClient::new(self.mqtt_options(), self.config.request_capacity);
        *self.client.write() = Some(client.clone());

        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = Arc::new(Notify::new());
        let stopping = Arc::new(AtomicBool::new(false));
        let session_loop = SessionLoop {
            eventloop,
            client,
            events: self.dispatcher.sender(),
            connected: self.connected.clone(),
            stopping: stopping.clone(),
            stop: stop.clone(),
            subscriptions: self.subscriptions.clone(),
            context: self.context.clone(),
            reconnect: self.config.reconnect.clone(),
            ready: Some(ready_tx),
        };

        info!(broker = %self.broker, client_id = %self.client_id, "Connecting to MQTT broker");
        *session = Some(SessionHandle {
            task: tokio::spawn(session_loop.run()),
            stop,
            stopping,
        });
        drop(session);

        let outcome = match tokio::time::timeout(self.config.connect_timeout(), ready_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::ConnectionFailed(
                "session ended before acknowledgement".to_string(),
            )),
            Err(_) => {
                // A late ConnAck must not report a session for a failed connect
                if let Some(handle) = self.session.lock().await.take() {
                    self.abandon(handle.task.abort_handle());
                }
                Err(TransportError::Timeout(format!(
                    "no acknowledgement within {} ms",
                    self.config.connect_timeout_ms
                )))
            }
        };
        if let Err(e) = outcome {
            warn!(broker = %self.broker, error = %e, "Failed to connect to MQTT broker");
        }
    }

    async fn disconnect(&self) {
        let Some(handle) = self.session.lock().await.take() else {
            debug!("No MQTT session to disconnect");
            return;
        };

        handle.stopping.store(true, Ordering::SeqCst);
        handle.stop.notify_one();
        let client = self.client.read().clone();
        if let Some(client) = client {
            if let Err(e) = client.try_disconnect() {
                debug!(error = %e, "Failed to queue MQTT disconnect");
            }
        }

        let abort = handle.task.abort_handle();
        match tokio::time::timeout(self.config.disconnect_timeout(), handle.task).await {
            Ok(_) => info!(broker = %self.broker, "Disconnected from MQTT broker"),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.disconnect_timeout_ms,
                    "MQTT session did not stop in time, aborting"
                );
                self.abandon(abort);
            }
        }
    }

    async fn close(&self) {
        self.disconnect().await;
        self.client.write().take();
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
        let client = self.connected_client()?;
        client
            .subscribe(filter, QoS::AtMostOnce)
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))
    }

    async fn try_unsubscribe(&self, filter: &str) -> Result<(), TransportError> {
        self.subscriptions.remove(filter);
        let client = self.connected_client()?;
        client
            .unsubscribe(filter)
            .await
            .map_err(|e| TransportError::UnsubscribeFailed(e.to_string()))
    }

    async fn try_publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let client = self.connected_client()?;
        client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

/// Task driving one rumqttc event loop, across reconnects
struct SessionLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    events: mpsc::UnboundedSender<Dispatch>,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    stop: Arc<Notify>,
    subscriptions: Arc<SubscriptionTable>,
    context: Arc<TopicContext>,
    reconnect: ReconnectConfig,
    ready: Option<oneshot::Sender<Result<(), TransportError>>>,
}

impl SessionLoop {
    async fn run(mut self) {
        let mut delay = self.reconnect.initial_delay();
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    delay = self.reconnect.initial_delay();
                    self.established(ack.session_present);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.deliver(publish.topic, publish.payload);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.session_lost();
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    if let Some(ready) = self.ready.take() {
                        let failure = TransportError::ConnectionFailed(error.to_string());
                        let _ = ready.send(Err(failure));
                        break;
                    }
                    self.session_lost();
                    if self.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    if !self.reconnect.enabled {
                        warn!(error = %error, "MQTT connection lost, reconnect disabled");
                        break;
                    }
                    warn!(
                        error = %error,
                        retry_in_ms = delay.as_millis() as u64,
                        "MQTT connection lost"
                    );
                    if !backoff(self.stop.clone(), self.stopping.clone(), delay).await {
                        break;
                    }
                    delay = self.reconnect.next_delay(delay);
                }
            }
        }
        debug!("MQTT session loop finished");
    }

    fn established(&mut self, session_present: bool) {
        let filters = self.subscriptions.filters();
        for filter in &filters {
            if let Err(e) = self.client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
                warn!(%filter, error = %e, "Failed to restore subscription");
            }
        }

        if !self.connected.swap(true, Ordering::SeqCst) {
            info!(
                session_present,
                subscriptions = filters.len(),
                "MQTT session established"
            );
            let _ = self.events.send(Dispatch::Connected);
        }
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Ok(()));
        }
    }

    fn session_lost(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("MQTT session closed");
            let _ = self.events.send(Dispatch::Disconnected);
        }
    }

    fn deliver(&self, topic: String, payload: Bytes) {
        match Topic::parse(&topic) {
            Ok(parsed) => {
                debug!(%topic, len = payload.len(), "Received MQTT message");
                let message = Message::new(parsed, payload, self.context.clone());
                let _ = self.events.send(Dispatch::Message(message));
            }
            Err(e) => warn!(%topic, error = %e, "Dropping message with unusable topic"),
        }
    }
}

/// Sleep before the next attempt; false when asked to stop meanwhile
async fn backoff(stop: Arc<Notify>, stopping: Arc<AtomicBool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => !stopping.load(Ordering::SeqCst),
        _ = stop.notified() => false,
    }
}
