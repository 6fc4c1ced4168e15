//! The `transport` module provides topic-multicast messaging over WebSockets.
//!
//! It is the only place that knows about sockets, subscriptions or the wire
//! format. The broker relays `Frame`s between an `InboundSocket` and an
//! `OutboundSocket`; clients talk to both through `connect`. Topic matching
//! is exact.

pub mod context;
pub mod fanout;
pub mod message;
pub mod topic;
pub mod websocket;

pub use context::Context;
pub use message::{Frame, WireMessage};
pub use websocket::{Connection, Inbox, InboundSocket, OutboundSocket, connect};
