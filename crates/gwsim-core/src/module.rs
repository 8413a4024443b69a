//! Module and application contracts
//!
//! A [`Module`] only hears about session transitions. An [`Application`]
//! also owns a topic namespace and handles the messages addressed to it.
//! Both are driven through [`invoke_isolated`], which turns a failing or
//! panicking hook into a log line so one faulty unit never stops delivery
//! to its peers.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::warn;

use crate::error::ModuleResult;
use crate::message::Message;
use crate::topic::Topic;
use crate::transport::SharedTransport;

/// Receives connect/disconnect notifications only
#[async_trait]
pub trait Module: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn connected(&self, transport: &SharedTransport) -> ModuleResult;

    async fn disconnected(&self, transport: &SharedTransport) -> ModuleResult;
}

/// A pluggable unit of simulated device behavior
///
/// Registered once when the simulator is built and kept for the life of
/// the process.
#[async_trait]
pub trait Application: Send + Sync {
    /// Stable identifier, announced in the birth certificate
    fn id(&self) -> &str;

    /// Topic patterns this application wants to receive
    ///
    /// Read once at registration.
    fn topics(&self) -> Vec<Topic> {
        Vec::new()
    }

    async fn connected(&self, _transport: &SharedTransport) -> ModuleResult {
        Ok(())
    }

    async fn disconnected(&self, _transport: &SharedTransport) -> ModuleResult {
        Ok(())
    }

    /// Handle a message routed to this application
    async fn process(&self, message: Message, transport: &SharedTransport) -> ModuleResult;
}

/// Await a hook, containing both error returns and panics
///
/// Returns `true` when the hook completed successfully.
pub async fn invoke_isolated<F>(kind: &str, name: &str, hook: &str, future: F) -> bool
where
    F: Future<Output = ModuleResult> + Send,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            warn!(kind, module = name, hook, %error, "Failed to call {}", kind);
            false
        }
        Err(panic) => {
            warn!(
                kind,
                module = name,
                hook,
                panic = %panic_message(panic.as_ref()),
                "Panic while calling {}",
                kind
            );
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
