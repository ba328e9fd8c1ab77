//! Caller-driven cancellation for sessions and dispatch.

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal shared between a caller, the dispatcher and a session.
///
/// Clones observe the same signal. Cancelling is sticky: a token cancelled
/// before anyone waits on it still reports cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation has been triggered.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until cancellation is triggered.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
