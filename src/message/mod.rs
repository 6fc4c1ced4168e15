//! The `message` module defines what travels between clients: the
//! [`Envelope`] itself, the [`Payload`] accepted by `Client::send`, and the
//! [`Message`] a consumer gets back from the receive buffer.

pub mod envelope;

pub use envelope::{DEFAULT_KIND, DEFAULT_NAME, EXIT, Envelope, HI};

use serde_json::Value;

/// A delivered envelope together with the topic it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub envelope: Envelope,
}

impl Message {
    pub fn new(topic: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            topic: topic.into(),
            envelope,
        }
    }
}

/// What a caller may hand to `Client::send`: a finished envelope, or a raw
/// JSON object of fields that still has to be wrapped.
#[derive(Debug, Clone)]
pub enum Payload {
    Envelope(Envelope),
    Fields(Value),
}

impl Payload {
    /// Wrap into an envelope. Raw fields without a `name` get `sender`.
    pub fn into_envelope(self, sender: &str) -> Result<Envelope, serde_json::Error> {
        match self {
            Payload::Envelope(envelope) => Ok(envelope),
            Payload::Fields(mut value) => {
                if let Value::Object(map) = &mut value {
                    map.entry("name")
                        .or_insert_with(|| Value::String(sender.to_string()));
                }
                Envelope::from_fields(value)
            }
        }
    }
}

impl From<Envelope> for Payload {
    fn from(envelope: Envelope) -> Self {
        Payload::Envelope(envelope)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Fields(value)
    }
}

#[cfg(test)]
mod tests;
