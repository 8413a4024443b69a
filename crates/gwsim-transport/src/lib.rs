//! gwsim-transport - Transports for the gateway simulator
//!
//! This crate provides the [`Transport`] implementations the simulator
//! runs on:
//! - [`MqttTransport`] - a real MQTT session (rumqttc) with reconnect
//! - [`MockTransport`] - an in-memory session for tests and dry runs
//!
//! # Example
//!
//! ```ignore
//! use gwsim_transport::{create_transport, TransportConfig};
//!
//! let transport = create_transport(&TransportConfig::default(), &gateway)?;
//! transport.connect().await;
//! ```

pub mod broker;
mod callbacks;
pub mod config;
mod dispatch;
pub mod mock;
pub mod mqtt;
mod subscriptions;

pub use broker::BrokerAddress;
pub use config::{MockConfig, MqttConfig, ReconnectConfig, TransportConfig};
pub use mock::{MockTransport, PublishedMessage};
pub use mqtt::MqttTransport;

pub use gwsim_core::{SharedTransport, Transport, TransportError};

use std::sync::Arc;

use gwsim_core::GatewayConfiguration;

/// Create a transport for `gateway` based on configuration
pub fn create_transport(
    config: &TransportConfig,
    gateway: &GatewayConfiguration,
) -> Result<SharedTransport, TransportError> {
    match config {
        TransportConfig::Mqtt(cfg) => {
            let transport = MqttTransport::new(gateway, cfg)?;
            Ok(Arc::new(transport))
        }
        TransportConfig::Mock(cfg) => {
            let transport = MockTransport::new(gateway, cfg);
            Ok(Arc::new(transport))
        }
    }
}
