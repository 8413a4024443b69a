//! Birth certificate module
//!
//! Announces the gateway on every (re)connect with a JSON descriptor
//! published on `$EDC/{account-name}/{client-id}/MQTT/BIRTH`.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gwsim_core::{GatewayConfiguration, Module, ModuleResult, SharedTransport, Topic};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::controller::ApplicationIds;

/// Birth certificate as published on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthCertificate {
    pub timestamp: DateTime<Utc>,
    pub metrics: BirthMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthMetrics {
    pub display_name: String,
    pub model_name: String,
    pub model_id: String,
    pub firmware_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    pub client_id: String,
    pub account_name: String,
    pub uptime_ms: u64,
    /// Comma-separated, in registration order
    pub application_ids: String,
}

impl BirthCertificate {
    /// Application ids announced in this certificate
    pub fn application_ids(&self) -> Vec<&str> {
        self.metrics
            .application_ids
            .split(',')
            .filter(|id| !id.is_empty())
            .collect()
    }
}

pub struct BirthCertificateModule {
    configuration: GatewayConfiguration,
    application_ids: ApplicationIds,
    started: Instant,
}

impl BirthCertificateModule {
    pub fn new(configuration: GatewayConfiguration, application_ids: ApplicationIds) -> Self {
        Self {
            configuration,
            application_ids,
            started: Instant::now(),
        }
    }

    pub fn certificate(&self) -> BirthCertificate {
        let config = &self.configuration;
        BirthCertificate {
            timestamp: Utc::now(),
            metrics: BirthMetrics {
                display_name: config.display_name().to_string(),
                model_name: config.model_name.clone(),
                model_id: config.model_id.clone(),
                firmware_version: config.firmware_version.clone(),
                serial_number: config.serial_number.clone(),
                client_id: config.client_id.clone(),
                account_name: config.account_name.clone(),
                uptime_ms: self.started.elapsed().as_millis() as u64,
                application_ids: (self.application_ids)().join(","),
            },
        }
    }
}

#[async_trait]
impl Module for BirthCertificateModule {
    fn name(&self) -> &str {
        "birth-certificate"
    }

    async fn connected(&self, transport: &SharedTransport) -> ModuleResult {
        let certificate = self.certificate();
        let payload = serde_json::to_vec(&certificate)?;
        info!(
            applications = %certificate.metrics.application_ids,
            "Publishing birth certificate"
        );
        transport.send_message(&Topic::birth(), payload.into()).await;
        Ok(())
    }

    async fn disconnected(&self, _transport: &SharedTransport) -> ModuleResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwsim_core::Transport;
    use gwsim_transport::{MockConfig, MockTransport};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn module(ids: &[&str]) -> BirthCertificateModule {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        let mut config = GatewayConfiguration::new("tcp://localhost:1883", "gw-1", "acme");
        config.serial_number = Some("SN-0001".to_string());
        BirthCertificateModule::new(config, Arc::new(move || ids.clone()))
    }

    #[test]
    fn test_certificate_fields() {
        let cert = module(&["clock", "inventory"]).certificate();
        assert_eq!(cert.metrics.client_id, "gw-1");
        assert_eq!(cert.metrics.account_name, "acme");
        assert_eq!(cert.metrics.display_name, "gw-1");
        assert_eq!(cert.metrics.serial_number.as_deref(), Some("SN-0001"));
        assert_eq!(cert.metrics.application_ids, "clock,inventory");
        assert_eq!(cert.application_ids(), vec!["clock", "inventory"]);
    }

    #[test]
    fn test_no_applications() {
        let cert = module(&[]).certificate();
        assert_eq!(cert.metrics.application_ids, "");
        assert!(cert.application_ids().is_empty());
    }

    #[tokio::test]
    async fn test_published_on_birth_topic() {
        let mock = Arc::new(MockTransport::new(
            &GatewayConfiguration::new("tcp://localhost:1883", "gw-1", "acme"),
            &MockConfig::default(),
        ));
        mock.connect().await;
        let transport: SharedTransport = mock.clone();

        module(&["clock"]).connected(&transport).await.unwrap();

        let sent = mock.published_on("$EDC/acme/gw-1/MQTT/BIRTH");
        assert_eq!(sent.len(), 1);
        let cert: BirthCertificate = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(cert.application_ids(), vec!["clock"]);
        assert_eq!(cert.metrics.model_id, "gwsim");
    }
}
