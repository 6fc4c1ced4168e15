//! Broker relay
//!
//! The broker binds an inbound side for publishers and an outbound side for
//! subscribers and forwards every inbound frame to the outbound side,
//! unchanged and unfiltered. It keeps no topic, subscription or message
//! state of its own; per-topic delivery is the outbound socket's job.
//!
//! Shutdown: `stop` terminates the transport context. The relay loop sees
//! `ContextClosed`, treats it as a normal exit, closes both sockets and is
//! joined. Any other transport error also ends the relay, since a broker
//! that cannot relay has nothing useful left to do.

use std::net::SocketAddr;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrokerSettings;
use crate::transport::{Context, InboundSocket, OutboundSocket};
use crate::utils::error::TransportError;

/// The two addresses a client needs to reach a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddrs {
    /// Where publishers connect.
    pub inbound: String,
    /// Where subscribers connect.
    pub outbound: String,
}

impl BrokerAddrs {
    pub fn new(inbound: impl Into<String>, outbound: impl Into<String>) -> Self {
        Self {
            inbound: inbound.into(),
            outbound: outbound.into(),
        }
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self::new(settings.inbound_addr(), settings.outbound_addr())
    }
}

#[derive(Debug)]
pub struct Broker {
    context: Context,
    inbound_addr: SocketAddr,
    outbound_addr: SocketAddr,
    relay: JoinHandle<()>,
}

impl Broker {
    /// Bind both sides and spawn the relay loop.
    pub async fn start(settings: &BrokerSettings) -> Result<Self, TransportError> {
        let context = Context::new();
        let inbound = InboundSocket::bind(&settings.inbound_addr(), &context).await?;
        let outbound = OutboundSocket::bind(&settings.outbound_addr(), &context).await?;
        let inbound_addr = inbound.local_addr();
        let outbound_addr = outbound.local_addr();

        let relay = tokio::spawn(relay(inbound, outbound));
        info!("Broker relaying {inbound_addr} -> {outbound_addr}");

        Ok(Self {
            context,
            inbound_addr,
            outbound_addr,
            relay,
        })
    }

    pub fn inbound_addr(&self) -> SocketAddr {
        self.inbound_addr
    }

    pub fn outbound_addr(&self) -> SocketAddr {
        self.outbound_addr
    }

    pub fn addrs(&self) -> BrokerAddrs {
        BrokerAddrs::new(self.inbound_addr.to_string(), self.outbound_addr.to_string())
    }

    pub fn is_running(&self) -> bool {
        !self.relay.is_finished()
    }

    /// Tear down the context and wait for the relay loop to exit.
    pub async fn stop(self) {
        self.context.terminate();
        if let Err(e) = self.relay.await {
            warn!("Relay task ended abnormally: {e}");
        }
        info!("Broker stopped");
    }
}

async fn relay(mut inbound: InboundSocket, outbound: OutboundSocket) {
    loop {
        match inbound.receive().await {
            Ok(frame) => {
                let topic = frame.topic.clone();
                let delivered = outbound.send(frame);
                debug!("Relayed frame on {topic} to {delivered} subscriber(s)");
            }
            Err(TransportError::ContextClosed) => {
                debug!("Relay context closed");
                break;
            }
            Err(e) => {
                warn!("Relay stopping on transport error: {e}");
                break;
            }
        }
    }

    inbound.close();
    outbound.close();
}
