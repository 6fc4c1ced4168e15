//! # pubrelay
//!
//! `pubrelay` is a small publish/subscribe relay and a client harness built
//! on top of it, with tokio and WebSockets underneath.
//!
//! The broker is deliberately dumb: it forwards every frame published on its
//! inbound side to its outbound side, where the transport multicasts it to
//! the connections subscribed to that topic. All of the interesting
//! behaviour lives in the client:
//!
//! - subscriptions are confirmed with a probe handshake before `subscribe`
//!   returns, so nothing published afterwards can be lost to propagation lag
//! - received messages are consumed in arrival order by a single waiter,
//!   filtered by a predicate and bounded by a timeout
//! - request/response calls are correlated by id over a pair of topics
//!
//! ## Core Modules
//!
//! - `broker`: the stateless relay between the two transport sides.
//! - `client`: the harness: handshake, FIFO consumption and RPC.
//! - `config`: settings loaded from `config/default` and the environment.
//! - `message`: the `Envelope` and the shapes built around it.
//! - `transport`: WebSocket endpoints with topic-multicast semantics.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod message;
pub mod transport;
pub mod utils;

pub use broker::{Broker, BrokerAddrs};
pub use client::Client;
pub use message::{Envelope, Message, Payload};
pub use utils::error::{ClientError, TransportError};

#[cfg(test)]
mod tests;
