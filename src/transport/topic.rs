//! Per-topic subscriber set of the outbound socket
//!
//! One `Topic` exists for each exact topic name that at least one outbound
//! peer has subscribed to. It holds peer ids only; the peers' send queues
//! live in the `Fanout` peer table. A `Topic` left with no subscribers is
//! removed by `Fanout`, so an unknown topic name means "nobody listening".

use std::collections::HashSet;

pub type SubscriberId = String;

#[derive(Debug, Default)]
pub struct Topic {
    name: String,
    subscribers: HashSet<SubscriberId>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns false if the peer was already subscribed.
    pub fn add(&mut self, id: SubscriberId) -> bool {
        self.subscribers.insert(id)
    }

    /// Returns false if the peer was not subscribed.
    pub fn remove(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains(id)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &SubscriberId> {
        self.subscribers.iter()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
