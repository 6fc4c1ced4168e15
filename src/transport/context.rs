//! Transport context
//!
//! A `Context` owns the lifetime of the endpoints bound under it. Terminating
//! it wakes every task blocked on one of those endpoints, which then report
//! `TransportError::ContextClosed`.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Context {
    shutdown: Arc<watch::Sender<bool>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown: Arc::new(shutdown),
        }
    }

    /// Signal every endpoint of this context to shut down. Idempotent.
    pub fn terminate(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_terminated(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once `terminate` has been called.
    pub async fn closed(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|terminated| *terminated).await;
    }
}
