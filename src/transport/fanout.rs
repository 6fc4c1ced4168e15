//! Outbound fan-out registry
//!
//! This is the topic filter behind `OutboundSocket`. It is responsible for:
//! - tracking which connected peer wants which exact topic
//! - multicasting each frame to every peer subscribed to its topic
//! - forgetting a peer everywhere once it disconnects
//!
//! Concurrency and usage notes:
//! - The API is synchronous and meant to be held behind a lock
//!   (`Arc<Mutex<Fanout>>`). Sending only enqueues onto each peer's
//!   unbounded channel, so no network I/O happens under the lock.

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::transport::message::{Frame, WireMessage};
use crate::transport::topic::{SubscriberId, Topic};

/// A connected subscriber-side peer of the outbound socket.
#[derive(Debug)]
pub struct Peer {
    pub id: SubscriberId,
    pub sender: UnboundedSender<WsMessage>,
}

impl Peer {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("peer-{}", Uuid::new_v4()),
            sender,
        }
    }
}

#[derive(Debug, Default)]
pub struct Fanout {
    pub topics: HashMap<String, Topic>,
    pub peers: HashMap<SubscriberId, Peer>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_peer(&mut self, peer: Peer) {
        self.peers.insert(peer.id.clone(), peer);
    }

    pub fn subscribe(&mut self, topic: &str, subscriber: SubscriberId) {
        let entry = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic));
        if !entry.add(subscriber) {
            trace!(topic, "peer already subscribed");
        }
    }

    pub fn unsubscribe(&mut self, topic: &str, subscriber: &SubscriberId) {
        if let Some(t) = self.topics.get_mut(topic) {
            t.remove(subscriber);
            if t.is_empty() {
                self.topics.remove(topic);
            }
        }
    }

    /// Deliver `frame` to every peer subscribed to its topic. Returns the
    /// number of peers it was queued for.
    pub fn publish(&self, frame: Frame) -> usize {
        let Some(topic) = self.topics.get(&frame.topic) else {
            trace!(topic = %frame.topic, "no subscribers, dropping frame");
            return 0;
        };

        let text = match serde_json::to_string(&WireMessage::Frame(frame)) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize frame: {e}");
                return 0;
            }
        };
        let ws_msg = WsMessage::text(text);

        let mut delivered = 0;
        for sub_id in topic.subscribers() {
            match self.peers.get(sub_id) {
                Some(peer) => {
                    if let Err(e) = peer.sender.send(ws_msg.clone()) {
                        warn!("Failed to send to {sub_id}: {e}");
                    } else {
                        delivered += 1;
                    }
                }
                None => warn!("No peer registered with id: {sub_id}"),
            }
        }
        delivered
    }

    /// Remove a peer and all of its subscriptions.
    pub fn cleanup_peer(&mut self, peer_id: &SubscriberId) {
        self.peers.remove(peer_id);
        for topic in self.topics.values_mut() {
            topic.remove(peer_id);
        }
        self.topics.retain(|_, topic| !topic.is_empty());
        debug!("Cleaned up peer {peer_id}");
    }

    /// Drop every peer, closing their send queues.
    pub fn clear(&mut self) {
        self.topics.clear();
        self.peers.clear();
    }
}
