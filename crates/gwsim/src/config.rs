//! Simulator configuration
//!
//! ```toml
//! [gateway]
//! broker_url = "tcp://localhost:1883"
//! client_id = "sim-1"
//!
//! [transport]
//! type = "mqtt"
//!
//! [applications]
//! clock = true
//!
//! [applications.inventory]
//! packages = [{ name = "agent", version = "1.0.0" }]
//! ```

use std::path::Path;

use gwsim_core::GatewayConfiguration;
use gwsim_transport::TransportConfig;
use serde::{Deserialize, Serialize};

use crate::apps::Package;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub gateway: GatewayConfiguration,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub applications: ApplicationsConfig,
}

impl SimulatorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Which demo applications to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationsConfig {
    #[serde(default = "default_true")]
    pub clock: bool,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

impl Default for ApplicationsConfig {
    fn default() -> Self {
        Self {
            clock: true,
            inventory: InventoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_packages")]
    pub packages: Vec<Package>,
}

fn default_true() -> bool {
    true
}

fn default_packages() -> Vec<Package> {
    vec![Package {
        name: "gwsim".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }]
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            packages: default_packages(),
        }
    }
}
