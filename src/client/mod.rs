//! The `client` module is the harness applications and tests use to talk to
//! a broker: subscribe with a confirmed handshake, publish, consume messages
//! in arrival order with a timeout, and make correlated RPC calls.

pub mod pubsub_client;
pub mod rpc;
mod state;

pub use pubsub_client::Client;
pub use rpc::{request_topic, response_topic};
pub use state::ConsumerSlot;
