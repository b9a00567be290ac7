//! Server shutdown notification for connection tasks.

use tokio::sync::watch;

/// Listens for the server-wide shutdown signal.
///
/// The server holds the `watch::Sender`; sending `true` asks every
/// connection to finish. If the sender is dropped without ever sending
/// `true`, the signal never fires.
#[derive(Debug, Clone)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: watch::Receiver<bool>,
}

impl Shutdown {
    /// Wraps the receiving half of the server's shutdown channel.
    pub fn new(notify: watch::Receiver<bool>) -> Self {
        Self {
            is_shutdown: false,
            notify,
        }
    }

    /// A listener that is never signalled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx)
    }

    /// Returns true once the shutdown signal has been observed.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Waits until shutdown is requested. Cancel safe.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        loop {
            if *self.notify.borrow_and_update() {
                break;
            }
            if self.notify.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }

        self.is_shutdown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recv_after_signal() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);
        assert!(!shutdown.is_shutdown());

        tx.send(true).unwrap();
        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
    }

    #[tokio::test]
    async fn test_signal_sent_before_listener_created() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let mut shutdown = Shutdown::new(rx);
        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let mut shutdown = Shutdown::never();
        let result = tokio::time::timeout(Duration::from_millis(50), shutdown.recv()).await;
        assert!(result.is_err());
        assert!(!shutdown.is_shutdown());
    }
}
