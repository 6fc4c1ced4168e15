//! Request/response over pub/sub.
//!
//! A logical channel `c` uses two topics: requests go out on `rpc-req-c`,
//! replies come back on `rpc-rep-c`. Replies are matched to requests by a
//! fresh correlation id, so replies to other callers on the same response
//! topic are skipped rather than misattributed.
//!
//! Skipped replies are consumed from the receive buffer like any other
//! non-matching message. Only one RPC (or other consumer) per client should
//! be watching a response topic at a time.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::client::Client;
use crate::message::Envelope;
use crate::utils::error::ClientError;

pub fn request_topic(channel: &str) -> String {
    format!("rpc-req-{channel}")
}

pub fn response_topic(channel: &str) -> String {
    format!("rpc-rep-{channel}")
}

impl Client {
    /// Send a `kind` request on `channel` and wait for the reply carrying
    /// the same correlation id. Returns the reply's fields.
    ///
    /// The response topic must already be subscribed.
    pub async fn rpc(
        &self,
        channel: &str,
        kind: &str,
        request: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Map<String, Value>, ClientError> {
        let reply_topic = response_topic(channel);
        self.ensure_subscribed(&reply_topic)?;

        let id = Uuid::new_v4().simple().to_string();
        let envelope = Envelope::new(kind)
            .with_name(self.name())
            .with_correlation_id(id.as_str())
            .with_fields(request);
        self.send(&request_topic(channel), envelope)?;
        debug!("RPC {kind} sent on {channel} with id {id}");

        let reply = self
            .wait_for_message(
                |message| {
                    message.topic == reply_topic
                        && message.envelope.correlation_id.as_deref() == Some(id.as_str())
                },
                timeout,
            )
            .await?;
        Ok(reply.envelope.fields)
    }

    /// Answer `request` on `channel`, echoing its correlation id.
    pub fn reply(
        &self,
        channel: &str,
        request: &Envelope,
        kind: &str,
        fields: Map<String, Value>,
    ) -> Result<(), ClientError> {
        let id = request
            .correlation_id
            .as_deref()
            .ok_or(ClientError::MissingCorrelationId)?;
        let envelope = Envelope::new(kind)
            .with_name(self.name())
            .with_correlation_id(id)
            .with_fields(fields);
        self.send(&response_topic(channel), envelope)
    }
}
