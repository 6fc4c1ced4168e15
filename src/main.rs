//! CLI for pubrelay
//!
//! Subcommands:
//! - `broker`: run the relay until Ctrl-C
//! - `publish`: send one envelope on a topic
//! - `listen`: subscribe to a topic and print what arrives

use std::time::Duration;

use clap::{Parser, Subcommand};
use pubrelay::broker::{Broker, BrokerAddrs};
use pubrelay::client::Client;
use pubrelay::config::{Settings, load_config};
use pubrelay::message::Envelope;
use serde_json::Value;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pubrelay", about = "Pub/sub relay and client harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the broker relay
    Broker,
    /// Publish a single envelope
    Publish {
        #[arg(long)]
        topic: String,
        /// Envelope type
        #[arg(long = "type", default_value = "message")]
        kind: String,
        /// Payload fields as key=value; values that parse as JSON are kept typed
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    /// Subscribe to a topic and print received envelopes as JSON
    Listen {
        #[arg(long)]
        topic: String,
        /// Stop after this many messages
        #[arg(long)]
        count: Option<usize>,
        /// Per-message timeout; defaults to the configured client timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    pubrelay::utils::logging::init(&settings.logging.level);

    let result = match cli.command {
        Command::Broker => run_broker(&settings).await,
        Command::Publish {
            topic,
            kind,
            fields,
        } => run_publish(&settings, &topic, kind, fields).await,
        Command::Listen {
            topic,
            count,
            timeout_ms,
        } => run_listen(&settings, &topic, count, timeout_ms).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_broker(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let broker = Broker::start(&settings.broker).await?;
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");
    broker.stop().await;
    Ok(())
}

async fn run_publish(
    settings: &Settings,
    topic: &str,
    kind: String,
    fields: Vec<(String, Value)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = Client::new(
        BrokerAddrs::from_settings(&settings.broker),
        settings.client.clone(),
    );
    client.start().await?;

    let envelope = Envelope::new(kind)
        .with_name(client.name())
        .with_fields(fields.into_iter().collect());
    client.send(topic, envelope)?;
    info!("Published on {topic}");

    client.stop().await?;
    Ok(())
}

async fn run_listen(
    settings: &Settings,
    topic: &str,
    count: Option<usize>,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.client.default_timeout());

    let mut client = Client::new(
        BrokerAddrs::from_settings(&settings.broker),
        settings.client.clone(),
    );
    client.start().await?;
    client.subscribe([topic]).await?;
    info!("Listening on {topic}");

    let mut received = 0;
    while count.is_none_or(|limit| received < limit) {
        match client.wait_for_message_on_topic(topic, timeout).await {
            Ok(message) => {
                println!("{}", message.envelope.encode()?);
                received += 1;
            }
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    client.stop().await?;
    Ok(())
}
