use std::time::Duration;

use serde::Deserialize;

use crate::message::DEFAULT_NAME;

/// Top-level configuration settings for the application.
#[derive(Debug, Clone)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

/// Where the broker binds its two sides.
///
/// Publishers connect to `inbound_port`, subscribers to `outbound_port`.
/// A port of `0` asks the OS for an ephemeral port.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub inbound_port: u16,
    pub outbound_port: u16,
}

/// Client identity and protocol budgets.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub name: String,
    pub handshake_attempts: u32,
    pub handshake_delay_ms: u64,
    pub default_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub client: Option<PartialClientSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub inbound_port: Option<u16>,
    pub outbound_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub name: Option<String>,
    pub handshake_attempts: Option<u32>,
    pub handshake_delay_ms: Option<u64>,
    pub default_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl BrokerSettings {
    pub fn inbound_addr(&self) -> String {
        format!("{}:{}", self.host, self.inbound_port)
    }

    pub fn outbound_addr(&self) -> String {
        format!("{}:{}", self.host, self.outbound_port)
    }

    /// Loopback on ephemeral ports, used by tests and embedded brokers.
    pub fn ephemeral() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            inbound_port: 0,
            outbound_port: 0,
        }
    }
}

impl ClientSettings {
    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            inbound_port: 5559,
            outbound_port: 5560,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            handshake_attempts: 20,
            handshake_delay_ms: 50,
            default_timeout_ms: 1000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            client: ClientSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
