mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, ClientSettings, LoggingSettings, Settings};

/// Loads the configuration from `config/default` and `PUBRELAY_*`
/// environment variables, then fills the gaps from `Settings::default()`.
///
/// Nested keys use a double underscore, e.g.
/// `PUBRELAY_BROKER__INBOUND_PORT=7001`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("PUBRELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    let broker = partial.broker.as_ref();
    let client = partial.client.as_ref();

    Ok(Settings {
        broker: BrokerSettings {
            host: broker
                .and_then(|b| b.host.clone())
                .unwrap_or(default.broker.host),
            inbound_port: broker
                .and_then(|b| b.inbound_port)
                .unwrap_or(default.broker.inbound_port),
            outbound_port: broker
                .and_then(|b| b.outbound_port)
                .unwrap_or(default.broker.outbound_port),
        },
        client: ClientSettings {
            name: client
                .and_then(|c| c.name.clone())
                .unwrap_or(default.client.name),
            handshake_attempts: client
                .and_then(|c| c.handshake_attempts)
                .unwrap_or(default.client.handshake_attempts),
            handshake_delay_ms: client
                .and_then(|c| c.handshake_delay_ms)
                .unwrap_or(default.client.handshake_delay_ms),
            default_timeout_ms: client
                .and_then(|c| c.default_timeout_ms)
                .unwrap_or(default.client.default_timeout_ms),
        },
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}

#[cfg(test)]
mod tests;
