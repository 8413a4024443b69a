//! Transport configuration
//!
//! Selects the transport implementation and tunes the MQTT session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// MQTT 3.1.1 over TCP
    Mqtt(MqttConfig),
    /// In-memory transport for tests and dry runs
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mqtt(MqttConfig::default())
    }
}

// =============================================================================
// MQTT Configuration
// =============================================================================

/// MQTT session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Keep-alive interval in seconds (0 disables keep-alive)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Capacity of the outgoing request queue
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
    /// How long `connect` waits for the broker to acknowledge
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How long `disconnect` waits for the session to wind down
    #[serde(default = "default_disconnect_timeout_ms")]
    pub disconnect_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub clean_session: bool,
    /// Automatic reconnect after a lost session
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_request_capacity() -> usize {
    64
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_disconnect_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: default_keep_alive_secs(),
            request_capacity: default_request_capacity(),
            connect_timeout_ms: default_connect_timeout_ms(),
            disconnect_timeout_ms: default_disconnect_timeout_ms(),
            clean_session: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}

/// Reconnect policy with exponential backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// No backoff delay is shorter than this, whatever the configuration says
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(1);

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms))
            .max(MIN_RECONNECT_DELAY)
    }

    /// Delay after `current`: doubled, capped at `max_delay_ms`
    pub fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .min(Duration::from_millis(self.max_delay_ms))
            .max(MIN_RECONNECT_DELAY)
    }
}

// =============================================================================
// Mock Configuration
// =============================================================================

/// Mock transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    /// When false, `connect` fails and no session is established
    #[serde(default = "default_true")]
    pub accept_connections: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            accept_connections: true,
        }
    }
}
