//! gwsim - Simulated IoT gateway runtime
//!
//! Runs a set of [`Application`](gwsim_core::Application)s on one
//! transport session:
//! - [`ApplicationController`] subscribes application topics on every
//!   connect and routes each inbound message to its owner
//! - [`BirthCertificateModule`] announces the gateway after every connect
//! - [`Simulator`] wires both to the transport's lifecycle callbacks

pub mod apps;
pub mod birth;
pub mod config;
pub mod controller;
pub mod error;
pub mod simulator;

pub use birth::{BirthCertificate, BirthCertificateModule, BirthMetrics};
pub use config::{ApplicationsConfig, InventoryConfig, SimulatorConfig};
pub use controller::{ApplicationController, ApplicationIds};
pub use error::{ConfigError, SimulatorError};
pub use simulator::Simulator;
