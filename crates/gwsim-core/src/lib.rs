//! gwsim-core - Core traits and types for the gateway simulation runtime
//!
//! This crate provides the abstractions shared by every layer of the
//! simulator: topic addressing, the transport capability, and the
//! module/application contracts that simulated device behavior implements.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Simulator                             │
//! │                                                             │
//! │  ┌─────────────────────┐      ┌─────────────────────────┐  │
//! │  │ApplicationController│      │ BirthCertificateModule  │  │
//! │  │ (Module + router)   │      │ (Module)                │  │
//! │  └──────────┬──────────┘      └─────────────────────────┘  │
//! │             │                                               │
//! │     ┌───────┴───────┐                                       │
//! │     │ Application*  │                                       │
//! │     └───────────────┘                                       │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │    Transport    │                         │
//! │                 │  (MQTT / mock)  │                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod module;
pub mod topic;
pub mod transport;

pub use config::GatewayConfiguration;
pub use error::{ModuleError, ModuleResult, TopicError};
pub use message::Message;
pub use module::{invoke_isolated, Application, Module};
pub use topic::{Segment, Topic, TopicContext};
pub use transport::{
    lifecycle_callback, message_handler, LifecycleCallback, MessageHandler, SharedTransport,
    Transport, TransportError,
};
