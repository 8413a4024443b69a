//! Clock application
//!
//! `GET` on `{account-name}/{client-id}/clock/GET` is answered on
//! `.../clock/REPLY` with the current UTC time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gwsim_core::{
    Application, Message, ModuleError, ModuleResult, SharedTransport, Topic, TopicError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CLOCK_APP_ID: &str = "clock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockReply {
    /// RFC 3339
    pub time: DateTime<Utc>,
}

pub struct ClockApplication {
    requests: Topic,
    reply: Topic,
}

impl ClockApplication {
    pub fn new() -> Result<Self, TopicError> {
        let base = Topic::application(CLOCK_APP_ID)?;
        Ok(Self {
            requests: base.join("#")?,
            reply: base.join("REPLY")?,
        })
    }
}

#[async_trait]
impl Application for ClockApplication {
    fn id(&self) -> &str {
        CLOCK_APP_ID
    }

    fn topics(&self) -> Vec<Topic> {
        vec![self.requests.clone()]
    }

    async fn process(&self, message: Message, transport: &SharedTransport) -> ModuleResult {
        match message.topic().last_literal() {
            Some("GET") => {
                let payload = serde_json::to_vec(&ClockReply { time: Utc::now() })?;
                transport.send_message(&self.reply, payload.into()).await;
                Ok(())
            }
            // Our own replies come back through the wildcard subscription
            Some("REPLY") => {
                debug!("Ignoring clock reply");
                Ok(())
            }
            _ => Err(ModuleError::Unsupported(message.topic().to_string())),
        }
    }
}
