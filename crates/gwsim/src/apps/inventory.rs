//! Inventory application
//!
//! Publishes the installed package list on every connect and answers
//! `GET` requests with it.

use async_trait::async_trait;
use bytes::Bytes;
use gwsim_core::{
    Application, Message, ModuleError, ModuleResult, SharedTransport, Topic, TopicError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const INVENTORY_APP_ID: &str = "inventory";

/// An installed software package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub packages: Vec<Package>,
}

pub struct InventoryApplication {
    packages: Vec<Package>,
    requests: Topic,
    packages_topic: Topic,
    reply: Topic,
}

impl InventoryApplication {
    pub fn new(packages: Vec<Package>) -> Result<Self, TopicError> {
        let base = Topic::application(INVENTORY_APP_ID)?;
        Ok(Self {
            packages,
            requests: base.join("#")?,
            packages_topic: base.join("PACKAGES")?,
            reply: base.join("REPLY")?,
        })
    }

    fn report(&self) -> Result<Bytes, serde_json::Error> {
        let report = InventoryReport {
            packages: self.packages.clone(),
        };
        Ok(serde_json::to_vec(&report)?.into())
    }
}

#[async_trait]
impl Application for InventoryApplication {
    fn id(&self) -> &str {
        INVENTORY_APP_ID
    }

    fn topics(&self) -> Vec<Topic> {
        vec![self.requests.clone()]
    }

    async fn connected(&self, transport: &SharedTransport) -> ModuleResult {
        transport
            .send_message(&self.packages_topic, self.report()?)
            .await;
        Ok(())
    }

    async fn process(&self, message: Message, transport: &SharedTransport) -> ModuleResult {
        match message.topic().last_literal() {
            Some("GET") => {
                transport.send_message(&self.reply, self.report()?).await;
                Ok(())
            }
            Some("PACKAGES") | Some("REPLY") => {
                debug!(topic = %message.topic(), "Ignoring own inventory publication");
                Ok(())
            }
            _ => Err(ModuleError::Unsupported(message.topic().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwsim_core::{GatewayConfiguration, Transport};
    use gwsim_transport::{MockConfig, MockTransport};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn packages() -> Vec<Package> {
        vec![Package {
            name: "gwsim-agent".to_string(),
            version: "1.2.0".to_string(),
        }]
    }

    #[tokio::test]
    async fn test_connected_publishes_packages() {
        let mock = Arc::new(MockTransport::new(
            &GatewayConfiguration::new("tcp://localhost:1883", "gw-1", "acme"),
            &MockConfig::default(),
        ));
        mock.connect().await;
        let transport: SharedTransport = mock.clone();
        let app = InventoryApplication::new(packages()).unwrap();

        app.connected(&transport).await.unwrap();
        let sent = mock.published_on("acme/gw-1/inventory/PACKAGES");
        assert_eq!(sent.len(), 1);
        let report: InventoryReport = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(report.packages, packages());

        let request = Message::new(
            Topic::parse("acme/gw-1/inventory/GET").unwrap(),
            "",
            mock.topic_context(),
        );
        app.process(request, &transport).await.unwrap();
        assert_eq!(mock.published_on("acme/gw-1/inventory/REPLY").len(), 1);
    }
}
