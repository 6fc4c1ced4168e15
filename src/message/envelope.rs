//! Envelope definitions
//!
//! `Envelope` is the unit every client publishes and consumes. On the wire it
//! is a JSON object with the metadata at top level and the business payload
//! nested under `fields`:
//!
//! ```json
//! {"name":"svc-a","type":"ping","timestamp":1725000000000,"correlation_id":"…","fields":{"count":3}}
//! ```
//!
//! Notes on fields:
//! - `name`: logical sender; decodes to `"anonymous"` when absent
//! - `type`: payload shape/intent; `"hi"` and `"exit"` are reserved for the
//!   client's own control traffic
//! - `timestamp`: milliseconds since UNIX epoch, set at construction
//! - `correlation_id`: only present on RPC traffic and handshake probes
//! - `fields`: business content; any key is allowed, including ones that
//!   shadow a metadata name such as `name`

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sender name used when none was given.
pub const DEFAULT_NAME: &str = "anonymous";

/// Envelope type used when a raw payload carries no `type`.
pub const DEFAULT_KIND: &str = "message";

/// Handshake probe published on a freshly subscribed topic.
pub const HI: &str = "hi";

/// Tells a client's receive loop to terminate.
pub const EXIT: &str = "exit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default = "now_millis")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

/// Keys of a raw payload object that are lifted into envelope metadata.
const METADATA_KEYS: [&str; 4] = ["name", "type", "timestamp", "correlation_id"];

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Envelope {
    /// Create an envelope of the given type, stamped with the current time.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            kind: kind.into(),
            timestamp: now_millis(),
            correlation_id: None,
            fields: Map::new(),
        }
    }

    /// Build an envelope from a raw JSON object such as
    /// `{"type": "ping", "count": 3}`. Metadata keys are lifted out, missing
    /// ones take their default, and every other key becomes a field.
    pub fn from_fields(value: Value) -> Result<Self, serde_json::Error> {
        let Value::Object(mut raw) = value else {
            return Err(serde::de::Error::custom("payload must be a JSON object"));
        };
        let metadata: Map<String, Value> = METADATA_KEYS
            .iter()
            .filter_map(|key| raw.remove_entry(*key))
            .collect();

        let mut envelope: Envelope = serde_json::from_value(Value::Object(metadata))?;
        envelope.fields.extend(raw);
        Ok(envelope)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A handshake probe owned by the client whose command topic is `owner`.
    pub(crate) fn probe(name: &str, owner: &str) -> Self {
        Self::new(HI).with_name(name).with_correlation_id(owner)
    }

    pub(crate) fn is_probe_from(&self, owner: &str) -> bool {
        self.kind == HI && self.correlation_id.as_deref() == Some(owner)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}
