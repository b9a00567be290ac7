//! TCP listener for MangoKV.
//!
//! The server owns the listening socket, spawns one task per accepted
//! connection and coordinates graceful shutdown: once the shutdown future
//! resolves it stops accepting, signals every connection task and waits
//! (bounded by `shutdown_timeout`) for them to finish.

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::{handle_connection, ConnectionStats, Shutdown};
use crate::storage::StorageEngine;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Pause after a failed `accept` before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised by the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound MangoKV server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    max_line_length: usize,
    shutdown_timeout: Duration,
}

impl Server {
    /// Binds the listening socket described by `config`.
    ///
    /// Failing to bind is the only startup error the server reports.
    pub async fn bind(config: &Config, storage: Arc<StorageEngine>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_address(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Listening");

        Ok(Self {
            listener,
            local_addr,
            storage,
            stats: Arc::new(ConnectionStats::new()),
            max_line_length: config.max_line_length,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Statistics shared by every connection of this server.
    pub fn connection_stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// The store served by this server.
    pub fn storage(&self) -> Arc<StorageEngine> {
        Arc::clone(&self.storage)
    }

    /// Accepts connections until `shutdown` completes, then drains.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let (notify_tx, notify_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            // Reap finished connection tasks so the set does not grow unbounded
            while connections.try_join_next().is_some() {}

            let accepted = tokio::select! {
                res = self.listener.accept() => res,
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            };

            match accepted {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let handler = CommandHandler::new(Arc::clone(&self.storage));
                    let stats = Arc::clone(&self.stats);
                    let conn_shutdown = Shutdown::new(notify_rx.clone());
                    let max_line_length = self.max_line_length;

                    connections.spawn(async move {
                        handle_connection(
                            stream,
                            addr,
                            handler,
                            stats,
                            max_line_length,
                            conn_shutdown,
                        )
                        .await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    if backoff(&mut shutdown, ACCEPT_BACKOFF).await {
                        info!("Shutdown signal received, stopping server...");
                        break;
                    }
                }
            }
        }

        drop(self.listener);
        // Receivers may all be gone already; nothing to signal then
        let _ = notify_tx.send(true);

        let open = connections.len();
        if open > 0 {
            info!(connections = open, "Waiting for open connections to close");
        }

        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                remaining = connections.len(),
                timeout = ?self.shutdown_timeout,
                "Shutdown timeout elapsed, aborting remaining connections"
            );
            connections.shutdown().await;
        }

        info!("Server shutdown complete");
    }
}

/// Sleeps for `delay` unless `shutdown` completes first.
///
/// Returns true if shutdown was requested during the pause.
async fn backoff<F>(shutdown: &mut F, delay: Duration) -> bool
where
    F: Future<Output = ()> + Unpin,
{
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn test_config() -> Config {
        Config {
            port: 0,
            ..Config::default()
        }
    }

    async fn roundtrip(addr: SocketAddr, line: &str) -> String {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(line.as_bytes()).await.unwrap();

        let mut reader = BufReader::new(read_half);
        let mut reply = String::new();
        reader.read_line(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(&test_config(), Arc::new(StorageEngine::new()))
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let first = Server::bind(&test_config(), Arc::new(StorageEngine::new()))
            .await
            .unwrap();

        let config = Config {
            port: first.local_addr().port(),
            ..Config::default()
        };
        let err = Server::bind(&config, Arc::new(StorageEngine::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_serves_and_shuts_down() {
        let storage = Arc::new(StorageEngine::new());
        let server = Server::bind(&test_config(), Arc::clone(&storage))
            .await
            .unwrap();
        let addr = server.local_addr();
        let stats = server.connection_stats();

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));

        assert_eq!(roundtrip(addr, "PUT a 1\n").await, "OK\n");
        assert_eq!(roundtrip(addr, "GET a\n").await, "1\n");
        assert_eq!(storage.get(b"a").unwrap().as_ref(), b"1");

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            stats
                .connections_accepted
                .load(std::sync::atomic::Ordering::Relaxed),
            2
        );
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_clients() {
        let server = Server::bind(&test_config(), Arc::new(StorageEngine::new()))
            .await
            .unwrap();
        let addr = server.local_addr();

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(b"PUT k v\n").await.unwrap();
        let mut reply = String::new();
        reader.read_line(&mut reply).await.unwrap();
        assert_eq!(reply, "OK\n");

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        reply.clear();
        let n = reader.read_line(&mut reply).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_connection_stuck_writing() {
        let storage = Arc::new(StorageEngine::new());
        storage
            .put(Bytes::from("big"), Bytes::from(vec![b'x'; 1024 * 1024]))
            .unwrap();

        let config = Config {
            shutdown_timeout: Duration::from_millis(200),
            ..test_config()
        };
        let server = Server::bind(&config, storage).await.unwrap();
        let addr = server.local_addr();
        let stats = server.connection_stats();

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));

        // Pipeline far more reply data than the socket buffers hold and never read it
        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all("GET big\n".repeat(256).as_bytes())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = std::time::Instant::now();
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server did not stop after the drain timeout")
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(stats.commands_processed.load(Ordering::Relaxed) < 256);
        drop(client);
    }

    #[tokio::test]
    async fn test_backoff_interrupted_by_shutdown() {
        let mut fired = std::future::ready(());
        let interrupted = tokio::time::timeout(
            Duration::from_secs(1),
            backoff(&mut fired, Duration::from_secs(60)),
        )
        .await
        .unwrap();
        assert!(interrupted);
    }

    #[tokio::test]
    async fn test_backoff_elapses_without_shutdown() {
        let mut never = std::future::pending::<()>();
        assert!(!backoff(&mut never, Duration::from_millis(10)).await);
    }
}
