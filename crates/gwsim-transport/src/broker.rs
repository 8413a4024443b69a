//! Broker URL parsing

use std::fmt;

use gwsim_core::TransportError;
use url::Url;

/// Default MQTT port for plain TCP
pub const DEFAULT_PORT: u16 = 1883;

/// Broker endpoint and credentials parsed from a URL
///
/// Accepts `tcp://` and `mqtt://` URLs; user info becomes the MQTT
/// username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BrokerAddress {
    pub fn parse(broker_url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(broker_url).map_err(|e| {
            TransportError::InvalidConfig(format!("Invalid broker URL '{}': {}", broker_url, e))
        })?;

        match url.scheme() {
            "tcp" | "mqtt" => {}
            "ssl" | "tls" | "mqtts" | "ws" | "wss" => {
                return Err(TransportError::Unsupported(format!(
                    "Broker scheme '{}' is not supported",
                    url.scheme()
                )))
            }
            other => {
                return Err(TransportError::InvalidConfig(format!(
                    "Unknown broker scheme '{}'",
                    other
                )))
            }
        }

        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                TransportError::InvalidConfig(format!("Broker URL '{}' has no host", broker_url))
            })?
            .to_string();

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            username,
            password: url.password().map(str::to_string),
        })
    }

    /// URL without credentials, safe for logs
    pub fn plain_url(&self) -> String {
        if self.host.contains(':') {
            format!("tcp://[{}]:{}", self.host, self.port)
        } else {
            format!("tcp://{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plain_url())
    }
}

impl fmt::Debug for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerAddress")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
