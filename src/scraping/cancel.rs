//! Cancellation signal shared between a caller and a running scrape.

use std::sync::Arc;

use tokio::sync::watch;

/// Caller side: flips the signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Sticky; later calls are no-ops.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Scrape side: observed at every suspension point.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    // Keeps the channel open for signals that can never fire.
    _keep_alive: Option<Arc<watch::Sender<bool>>>,
}

impl CancelSignal {
    /// Create a connected handle/signal pair.
    #[must_use]
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Self {
                rx,
                _keep_alive: None,
            },
        )
    }

    /// A signal that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keep_alive: Some(Arc::new(tx)),
        }
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// If the handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_resolves_waiter() {
        let (handle, signal) = CancelSignal::new();
        assert!(!signal.is_cancelled());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        handle.cancel();

        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_before_wait_is_sticky() {
        let (handle, signal) = CancelSignal::new();
        handle.cancel();
        let waited = tokio::time::timeout(Duration::from_millis(100), signal.cancelled()).await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let signal = CancelSignal::never();
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;
        assert!(waited.is_err());
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_fire() {
        let (handle, signal) = CancelSignal::new();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
