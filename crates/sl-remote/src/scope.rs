//! Relevance scopes for in-flight remote calls
//!
//! A store hands every mutation a [`CancelToken`] from its current
//! [`CancelScope`]. Once the scope is cancelled (the user navigated away, the
//! store was disposed) late responses are dropped instead of being applied.

use tokio::sync::watch;

/// Owner side of a cancellation scope
#[derive(Debug)]
pub struct CancelScope {
    tx: watch::Sender<bool>,
}

impl CancelScope {
    /// Fresh, uncancelled scope
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Token observing this scope
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Cancel every token handed out so far
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) was called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation scope
///
/// A token whose scope was dropped counts as cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether results guarded by this token should be discarded
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the scope is cancelled or dropped
    pub async fn cancelled(&mut self) {
        // Err means the scope was dropped, which counts as cancelled too
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}
