//! Server-wide shutdown signaling.
//!
//! The teacher's own `Shutdown` wraps a `broadcast::Receiver` so that many
//! in-flight connections can all observe one shutdown event and drain
//! gracefully. This service explicitly does not drain lease-holding
//! connections on shutdown (per spec), so there is only ever one listener
//! of the signal — the accept loop — and a plain `tokio::sync::Notify` is
//! the right-sized primitive instead of a broadcast channel.

use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Default)]
pub struct Shutdown {
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Arc<Shutdown> {
        Arc::new(Shutdown {
            notify: Notify::new(),
        })
    }

    /// Requests shutdown. Idempotent: triggering it more than once is
    /// harmless.
    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    /// Resolves once `trigger` has been called.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
