//! Error types for the simulator

use std::path::PathBuf;

use gwsim_core::TopicError;
use thiserror::Error;

/// Errors raised while assembling a simulator
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Two applications registered under the same id
    #[error("Duplicate application id: {0}")]
    DuplicateApplication(String),

    /// An application declared a topic that cannot be rendered for this gateway
    #[error("Invalid topic for application '{application}': {source}")]
    Topic {
        application: String,
        #[source]
        source: TopicError,
    },
}

/// Errors raised while loading the simulator configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
