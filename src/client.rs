//! Async client for a MangoKV server.
//!
//! ```no_run
//! # async fn demo() -> Result<(), mangokv::client::ClientError> {
//! use mangokv::client::Client;
//!
//! let mut client = Client::connect("127.0.0.1:8080").await?;
//! client.put("name", "mango").await?;
//! assert_eq!(client.get("name").await?, Some("mango".to_string()));
//! client.delete("name").await?;
//! # Ok(())
//! # }
//! ```

use crate::protocol::types::reply;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::trace;

/// Errors returned by [`Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The key does not exist
    #[error("key not found")]
    NotFound,

    /// The server refused to store a reserved value
    #[error("{0} is a reserved keyword")]
    ReservedKeyword(String),

    /// The server rejected the request line
    #[error("server rejected the request as invalid input")]
    InvalidInput,

    /// A key or value the protocol cannot carry
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server closed the connection before replying
    #[error("connection closed by server")]
    ConnectionClosed,

    /// A reply that does not fit the request
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A connection to a MangoKV server.
///
/// Requests are sent one at a time; each call waits for its reply.
#[derive(Debug)]
pub struct Client {
    stream: BufStream<TcpStream>,
    line: String,
}

impl Client {
    /// Connects to the server at `addr`.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream: BufStream::new(stream),
            line: String::with_capacity(64),
        })
    }

    /// Stores `value` under `key`.
    pub async fn put(&mut self, key: &str, value: &str) -> Result<(), ClientError> {
        check_token("key", key)?;
        check_token("value", value)?;

        let resp = self.send(&format!("PUT {key} {value}")).await?;
        match resp.as_bytes() {
            reply::OK => Ok(()),
            _ => Err(error_reply(resp)),
        }
    }

    /// Fetches the value stored under `key`, if any.
    pub async fn get(&mut self, key: &str) -> Result<Option<String>, ClientError> {
        check_token("key", key)?;

        let resp = self.send(&format!("GET {key}")).await?;
        match resp.as_bytes() {
            reply::NOT_FOUND => Ok(None),
            reply::INVALID_INPUT => Err(ClientError::InvalidInput),
            _ if resp.is_empty() || resp.contains(' ') => Err(ClientError::UnexpectedReply(resp)),
            _ => Ok(Some(resp)),
        }
    }

    /// Removes `key`; fails with [`ClientError::NotFound`] if it is absent.
    pub async fn delete(&mut self, key: &str) -> Result<(), ClientError> {
        check_token("key", key)?;

        let resp = self.send(&format!("DELETE {key}")).await?;
        match resp.as_bytes() {
            reply::OK => Ok(()),
            _ => Err(error_reply(resp)),
        }
    }

    /// Sends one raw request line and returns the reply without its newline.
    pub async fn send(&mut self, line: &str) -> Result<String, ClientError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        if line.contains('\n') {
            return Err(ClientError::InvalidArgument(
                "request must be a single line".to_string(),
            ));
        }

        trace!(request = line, "Sending request");
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;

        self.line.clear();
        if self.stream.read_line(&mut self.line).await? == 0 {
            return Err(ClientError::ConnectionClosed);
        }

        let resp = self.line.trim_end_matches(['\n', '\r']).to_string();
        trace!(reply = %resp, "Received reply");
        Ok(resp)
    }
}

/// Rejects keys and values that would change the shape of the request line.
fn check_token(what: &str, token: &str) -> Result<(), ClientError> {
    if token.is_empty() {
        return Err(ClientError::InvalidArgument(format!("{what} is empty")));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(ClientError::InvalidArgument(format!(
            "{what} contains whitespace"
        )));
    }
    Ok(())
}

/// Maps an error reply line to its typed error.
fn error_reply(line: String) -> ClientError {
    let bytes = line.as_bytes();
    if bytes == reply::NOT_FOUND {
        ClientError::NotFound
    } else if bytes == reply::INVALID_INPUT {
        ClientError::InvalidInput
    } else if let Some(value) = bytes
        .strip_prefix(reply::RESERVED_KEYWORD)
        .and_then(|rest| rest.strip_prefix(b" "))
    {
        ClientError::ReservedKeyword(String::from_utf8_lossy(value).into_owned())
    } else {
        ClientError::UnexpectedReply(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::Server;
    use crate::storage::StorageEngine;
    use std::net::SocketAddr;
    use std::sync::Arc;

    async fn start_server() -> SocketAddr {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        let server = Server::bind(&config, Arc::new(StorageEngine::new()))
            .await
            .unwrap();
        let addr = server.local_addr();
        tokio::spawn(server.run(std::future::pending()));
        addr
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let addr = start_server().await;
        let mut client = Client::connect(addr).await.unwrap();

        client.put("hi", "there").await.unwrap();
        assert_eq!(client.get("hi").await.unwrap(), Some("there".to_string()));

        client.delete("hi").await.unwrap();
        assert_eq!(client.get("hi").await.unwrap(), None);
        assert!(matches!(
            client.delete("hi").await,
            Err(ClientError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reserved_value() {
        let addr = start_server().await;
        let mut client = Client::connect(addr).await.unwrap();

        client.put("hi", "there").await.unwrap();
        match client.put("hi", "__TOMBSTONE__").await {
            Err(ClientError::ReservedKeyword(v)) => assert_eq!(v, "__TOMBSTONE__"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(client.get("hi").await.unwrap(), Some("there".to_string()));
    }

    #[tokio::test]
    async fn test_raw_send() {
        let addr = start_server().await;
        let mut client = Client::connect(addr).await.unwrap();

        assert_eq!(client.send("FLUSH").await.unwrap(), "INVALID INPUT");
        assert_eq!(client.send("GET nothing\n").await.unwrap(), "NOT FOUND");
        assert!(matches!(
            client.send("GET a\nGET b").await,
            Err(ClientError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_whitespace_arguments() {
        let addr = start_server().await;
        let mut client = Client::connect(addr).await.unwrap();

        assert!(matches!(
            client.put("two words", "v").await,
            Err(ClientError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.put("k", "").await,
            Err(ClientError::InvalidArgument(_))
        ));
        assert!(matches!(
            client.get("a\tb").await,
            Err(ClientError::InvalidArgument(_))
        ));

        // Nothing was sent, so the connection is still in step
        client.put("k", "v").await.unwrap();
        assert_eq!(client.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_error_reply_mapping() {
        assert!(matches!(
            error_reply("NOT FOUND".to_string()),
            ClientError::NotFound
        ));
        assert!(matches!(
            error_reply("INVALID INPUT".to_string()),
            ClientError::InvalidInput
        ));
        assert!(matches!(
            error_reply("RESERVED KEYWORD x".to_string()),
            ClientError::ReservedKeyword(ref v) if v == "x"
        ));
        assert!(matches!(
            error_reply("WHAT".to_string()),
            ClientError::UnexpectedReply(_)
        ));
    }
}
