//! Cooperative cancellation shared between the signal listener and the
//! lifecycle controller.
//!
//! The token is a one-way flag. Setting it never interrupts work in flight:
//! waits observe it and the controller checks it between steps.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable one-way cancellation flag.
#[derive(Clone, Debug)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set. Cancel-safe.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = rx.wait_for(|set| *set).await;
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}
