//! Common error types for the simulation runtime

use thiserror::Error;

/// Result type returned by module and application hooks
pub type ModuleResult = Result<(), ModuleError>;

/// Errors raised while parsing or rendering a topic
///
/// These are configuration errors: they are returned synchronously to
/// whoever builds or renders the topic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Text could not be parsed into a topic
    #[error("Malformed topic '{topic}': {reason}")]
    Malformed { topic: String, reason: String },

    /// A placeholder has no binding in the topic context
    #[error("Unresolved placeholder: {{{0}}}")]
    UnresolvedPlaceholder(String),
}

impl TopicError {
    pub(crate) fn malformed(topic: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors a module or application hook may return
///
/// A hook error never stops lifecycle delivery to other modules; the
/// dispatcher logs it and moves on.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Topic could not be built or rendered
    #[error("Topic error: {0}")]
    Topic(#[from] TopicError),

    /// Payload could not be encoded or decoded
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Request addressed to a resource the application does not serve
    #[error("Unsupported request: {0}")]
    Unsupported(String),

    /// Any other hook failure
    #[error("{0}")]
    Failed(String),
}
