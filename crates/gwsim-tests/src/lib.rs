//! Scenario tests for the gateway simulator
//!
//! These tests drive a [`Simulator`](gwsim::Simulator) over the in-memory
//! [`MockTransport`] and check what the simulated device does on the wire:
//! - `lifecycle_test.rs` - connect/disconnect fan-out and isolation
//! - `routing_test.rs` - message ownership between applications
//! - `birth_test.rs` - birth certificate content
//!
//! The helpers below are shared by the test files.

use std::sync::Arc;

use async_trait::async_trait;
use gwsim::BirthCertificate;
use gwsim_core::{
    Application, GatewayConfiguration, Message, ModuleError, ModuleResult, SharedTransport, Topic,
};
use gwsim_transport::{MockConfig, MockTransport};
use parking_lot::Mutex;

pub const ACCOUNT: &str = "acme";
pub const CLIENT_ID: &str = "gw-1";
pub const BIRTH_TOPIC: &str = "$EDC/acme/gw-1/MQTT/BIRTH";

/// Shared, ordered log of hook invocations
#[derive(Default)]
pub struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// How a [`RecordingApp`] hook misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Error,
    Panic,
}

/// Application that records every hook call as `"<id> <hook>"`
/// and every message as `"<id> <- <topic>"`
pub struct RecordingApp {
    id: String,
    topics: Vec<Topic>,
    log: Arc<EventLog>,
    connected_fault: Fault,
}

impl RecordingApp {
    pub fn new(id: &str, topics: &[&str], log: &Arc<EventLog>) -> Self {
        Self {
            id: id.to_string(),
            topics: topics
                .iter()
                .map(|t| Topic::parse(t).expect("valid test topic"))
                .collect(),
            log: log.clone(),
            connected_fault: Fault::None,
        }
    }

    pub fn failing_on_connect(mut self, fault: Fault) -> Self {
        self.connected_fault = fault;
        self
    }

    pub fn shared(self) -> Arc<dyn Application> {
        Arc::new(self)
    }
}

#[async_trait]
impl Application for RecordingApp {
    fn id(&self) -> &str {
        &self.id
    }

    fn topics(&self) -> Vec<Topic> {
        self.topics.clone()
    }

    async fn connected(&self, _transport: &SharedTransport) -> ModuleResult {
        self.log.push(format!("{} connected", self.id));
        match self.connected_fault {
            Fault::None => Ok(()),
            Fault::Error => Err(ModuleError::Failed(format!("{} refused", self.id))),
            Fault::Panic => panic!("{} exploded", self.id),
        }
    }

    async fn disconnected(&self, _transport: &SharedTransport) -> ModuleResult {
        self.log.push(format!("{} disconnected", self.id));
        Ok(())
    }

    async fn process(&self, message: Message, _transport: &SharedTransport) -> ModuleResult {
        self.log.push(format!("{} <- {}", self.id, message.topic()));
        Ok(())
    }
}

pub fn gateway() -> GatewayConfiguration {
    GatewayConfiguration::new("tcp://localhost:1883", CLIENT_ID, ACCOUNT)
}

pub fn mock_transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(&gateway(), &MockConfig::default()))
}

/// Birth certificates published so far, decoded
pub fn births(transport: &MockTransport) -> Vec<BirthCertificate> {
    transport
        .published_on(BIRTH_TOPIC)
        .iter()
        .map(|m| serde_json::from_slice(&m.payload).expect("birth certificate is JSON"))
        .collect()
}
