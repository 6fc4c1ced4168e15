//! State shared between a client's receive loop and its callers.
//!
//! One mutex guards the subscription sets, the receive buffer and the
//! consumer slot; `arrived` wakes the (single) waiting consumer whenever the
//! receive loop appends to the buffer.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::message::{EXIT, Envelope, Message};
use crate::utils::error::ClientError;

/// Who currently owns the right to consume from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumerSlot {
    #[default]
    Idle,
    Waiting,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub subscribed: HashSet<String>,
    /// Subscribed topics whose probe has not echoed back yet.
    pub pending: HashSet<String>,
    pub buffer: VecDeque<Message>,
    pub consumer: ConsumerSlot,
}

/// What the receive loop did with an incoming envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    Exit,
    Confirmed(String),
    StrayProbe,
    Buffered,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: Mutex<State>,
    pub arrived: Notify,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Classify an incoming envelope and buffer it if it is application
    /// traffic. Anything arriving on a pending topic confirms that topic and
    /// is swallowed, as are late echoes of this client's own probes.
    pub fn route(&self, topic: String, envelope: Envelope, command_topic: &str) -> Route {
        if topic == command_topic && envelope.kind == EXIT {
            return Route::Exit;
        }

        {
            let mut state = self.lock();
            if state.pending.remove(&topic) {
                return Route::Confirmed(topic);
            }
            if envelope.is_probe_from(command_topic) {
                return Route::StrayProbe;
            }
            state.buffer.push_back(Message::new(topic, envelope));
        }

        self.arrived.notify_one();
        Route::Buffered
    }

    pub fn pop(&self) -> Option<Message> {
        self.lock().buffer.pop_front()
    }

    pub fn pending_topics(&self) -> Vec<String> {
        let mut pending: Vec<String> = self.lock().pending.iter().cloned().collect();
        pending.sort();
        pending
    }
}

/// Holds the consumer slot for the duration of one wait. Dropping it, on
/// return or on cancellation, puts the slot back to `Idle`.
#[derive(Debug)]
pub(crate) struct ConsumerGuard<'a> {
    shared: &'a Shared,
}

impl<'a> ConsumerGuard<'a> {
    pub fn acquire(shared: &'a Shared) -> Result<Self, ClientError> {
        let mut state = shared.lock();
        match state.consumer {
            ConsumerSlot::Waiting => Err(ClientError::ConcurrentWait),
            ConsumerSlot::Idle => {
                state.consumer = ConsumerSlot::Waiting;
                Ok(Self { shared })
            }
        }
    }
}

impl Drop for ConsumerGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock().consumer = ConsumerSlot::Idle;
    }
}
