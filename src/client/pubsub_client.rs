//! Client harness
//!
//! A `Client` connects to a broker twice: once as a publisher (inbound side)
//! and once as a subscriber (outbound side). A background receive loop owns
//! the subscriber connection and feeds a FIFO buffer that callers drain
//! through `wait_for_message`.
//!
//! Every client owns a private command topic, derived from a fresh UUID,
//! used only for its own control traffic: the startup handshake and the
//! `exit` envelope that ends the receive loop.
//!
//! Subscribing is synchronous from the caller's point of view. Because
//! subscriptions reach the broker's outbound side asynchronously, `subscribe`
//! keeps publishing `hi` probes on every unconfirmed topic until one comes
//! back through the broker. Only then can the caller trust that a message
//! published on that topic will reach this client.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::broker::BrokerAddrs;
use crate::client::state::{ConsumerGuard, ConsumerSlot, Route, Shared};
use crate::config::ClientSettings;
use crate::message::{EXIT, Envelope, Message, Payload};
use crate::transport::{Connection, Frame, Inbox, connect};
use crate::utils::error::ClientError;

#[derive(Debug)]
struct Running {
    publisher: Connection,
    subscriber: Connection,
    receiver: JoinHandle<()>,
}

#[derive(Debug)]
enum Lifecycle {
    Created,
    Started(Running),
    Stopped,
}

#[derive(Debug)]
pub struct Client {
    addrs: BrokerAddrs,
    settings: ClientSettings,
    command_topic: String,
    pub(super) shared: Arc<Shared>,
    lifecycle: Lifecycle,
}

impl Client {
    pub fn new(addrs: BrokerAddrs, settings: ClientSettings) -> Self {
        Self {
            addrs,
            settings,
            command_topic: format!("cmd-{}", Uuid::new_v4().simple()),
            shared: Arc::new(Shared::default()),
            lifecycle: Lifecycle::Created,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    /// True while the client is started and its receive loop is alive.
    pub fn is_running(&self) -> bool {
        match &self.lifecycle {
            Lifecycle::Started(running) => !running.receiver.is_finished(),
            _ => false,
        }
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.shared.lock().subscribed.contains(topic)
    }

    pub fn consumer(&self) -> ConsumerSlot {
        self.shared.lock().consumer
    }

    /// Number of received messages not consumed yet.
    pub fn buffered(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    fn running(&self) -> Result<&Running, ClientError> {
        match &self.lifecycle {
            Lifecycle::Started(running) => Ok(running),
            _ => Err(ClientError::NotRunning),
        }
    }

    /// Connect both sides, spawn the receive loop and complete the handshake
    /// on the command topic.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        if !matches!(self.lifecycle, Lifecycle::Created) {
            return Err(ClientError::AlreadyStarted);
        }

        let (publisher, _) = connect(&self.addrs.inbound).await?;
        let (subscriber, inbox) = connect(&self.addrs.outbound).await?;
        let receiver = tokio::spawn(receive_loop(
            inbox,
            self.shared.clone(),
            self.command_topic.clone(),
        ));
        self.lifecycle = Lifecycle::Started(Running {
            publisher,
            subscriber,
            receiver,
        });

        let command_topic = self.command_topic.clone();
        if let Err(e) = self.subscribe([command_topic]).await {
            self.shutdown();
            return Err(e);
        }
        info!("Client {} started ({})", self.settings.name, self.command_topic);
        Ok(())
    }

    /// Tear down without the `exit` round trip, for a client whose relay
    /// never confirmed its command topic.
    fn shutdown(&mut self) {
        if let Lifecycle::Started(running) =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped)
        {
            running.receiver.abort();
            running.publisher.close();
            running.subscriber.close();
            warn!("Client {} shut down after a failed start", self.settings.name);
        }
    }

    /// Send `exit` to the receive loop, wait for it and close both
    /// connections. Stopping a stopped client is a no-op.
    pub async fn stop(&mut self) -> Result<(), ClientError> {
        match self.lifecycle {
            Lifecycle::Created => return Err(ClientError::NotRunning),
            Lifecycle::Stopped => return Ok(()),
            Lifecycle::Started(_) => {}
        }
        let Lifecycle::Started(running) =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped)
        else {
            return Ok(());
        };

        let exit = Envelope::new(EXIT).with_name(&self.settings.name);
        if let Err(e) = publish(&running, &self.command_topic, &exit) {
            warn!("Client {} could not send exit: {e}", self.settings.name);
            running.receiver.abort();
        }

        if let Err(e) = running.receiver.await {
            if !e.is_cancelled() {
                warn!("Receive loop of {} ended abnormally: {e}", self.settings.name);
            }
        }

        running.publisher.close();
        running.subscriber.close();
        info!("Client {} stopped", self.settings.name);
        Ok(())
    }

    /// Subscribe to `topics` and block until each one is confirmed live, or
    /// fail with `HandshakeFailed` once the probe budget is spent.
    pub async fn subscribe<I, S>(&self, topics: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let running = self.running()?;
        let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
        if topics.iter().any(String::is_empty) {
            return Err(ClientError::EmptyTopic);
        }

        for topic in &topics {
            {
                let mut state = self.shared.lock();
                state.subscribed.insert(topic.clone());
                state.pending.insert(topic.clone());
            }
            running.subscriber.subscribe(topic)?;
        }

        let attempts = self.settings.handshake_attempts;
        for attempt in 0..attempts {
            let pending = self.shared.pending_topics();
            if pending.is_empty() {
                debug!("Subscribed to {topics:?} after {attempt} probe round(s)");
                return Ok(());
            }

            for topic in &pending {
                let probe = Envelope::probe(&self.settings.name, &self.command_topic);
                publish(running, topic, &probe)?;
            }
            trace!("Probe round {attempt} sent for {pending:?}");
            tokio::time::sleep(self.settings.handshake_delay()).await;
        }

        let remaining = self.shared.pending_topics();
        if remaining.is_empty() {
            return Ok(());
        }
        error!("Handshake failed for {remaining:?}; broker unreachable?");
        Err(ClientError::HandshakeFailed {
            topics: remaining,
            attempts,
        })
    }

    pub fn unsubscribe(&self, topic: &str) -> Result<(), ClientError> {
        let running = self.running()?;
        running.subscriber.unsubscribe(topic)?;
        let mut state = self.shared.lock();
        state.subscribed.remove(topic);
        state.pending.remove(topic);
        Ok(())
    }

    /// Publish on `topic`. Fire-and-forget: nothing is acknowledged.
    pub fn send(&self, topic: &str, payload: impl Into<Payload>) -> Result<(), ClientError> {
        let running = self.running()?;
        if topic.is_empty() {
            return Err(ClientError::EmptyTopic);
        }
        let payload: Payload = payload.into();
        let envelope = payload.into_envelope(&self.settings.name)?;
        publish(running, topic, &envelope)
    }

    /// Pop buffered messages in arrival order until one satisfies
    /// `predicate`. Non-matching messages are discarded for good.
    ///
    /// Only one call may wait at a time; a second concurrent call fails
    /// with `ConcurrentWait`.
    pub async fn wait_for_message<F>(
        &self,
        mut predicate: F,
        timeout: Duration,
    ) -> Result<Message, ClientError>
    where
        F: FnMut(&Message) -> bool,
    {
        let _consumer = ConsumerGuard::acquire(&self.shared)?;
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(message) = self.shared.pop() {
                if predicate(&message) {
                    return Ok(message);
                }
                trace!(
                    "Discarding unmatched {} message on {}",
                    message.envelope.kind, message.topic
                );
            }

            if tokio::time::timeout_at(deadline, self.shared.arrived.notified())
                .await
                .is_err()
            {
                return Err(ClientError::Timeout(timeout));
            }
        }
    }

    pub async fn wait_for_message_on_topic(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> Result<Message, ClientError> {
        self.ensure_subscribed(topic)?;
        self.wait_for_message(|message| message.topic == topic, timeout)
            .await
    }

    pub(crate) fn ensure_subscribed(&self, topic: &str) -> Result<(), ClientError> {
        if self.is_subscribed(topic) {
            Ok(())
        } else {
            Err(ClientError::NotSubscribed(topic.to_string()))
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Lifecycle::Started(running) = &self.lifecycle {
            running.receiver.abort();
            running.publisher.close();
            running.subscriber.close();
        }
    }
}

fn publish(running: &Running, topic: &str, envelope: &Envelope) -> Result<(), ClientError> {
    let body = envelope.encode()?;
    running.publisher.send(Frame::new(topic, body))?;
    Ok(())
}

async fn receive_loop(mut inbox: Inbox, shared: Arc<Shared>, command_topic: String) {
    loop {
        let frame = match inbox.receive().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Receive loop for {command_topic} stopping: {e}");
                break;
            }
        };

        let envelope = match Envelope::decode(&frame.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping undecodable envelope on {}: {e}", frame.topic);
                continue;
            }
        };

        match shared.route(frame.topic, envelope, &command_topic) {
            Route::Exit => {
                debug!("Exit received on {command_topic}");
                break;
            }
            Route::Confirmed(topic) => debug!("Subscription to {topic} confirmed"),
            Route::StrayProbe => trace!("Swallowed late probe echo"),
            Route::Buffered => {}
        }
    }
}
