//! Protocol Data Types
//!
//! MangoKV speaks a line-oriented UTF-8 text protocol. Every request is one
//! line terminated by `\n` and every request gets exactly one reply line.
//!
//! ## Requests
//!
//! ```text
//! PUT <key> <value>
//! GET <key>
//! DELETE <key>
//! ```
//!
//! ## Replies
//!
//! ```text
//! OK                      PUT or DELETE succeeded
//! <value>                 GET succeeded
//! NOT FOUND               GET or DELETE on an absent key
//! RESERVED KEYWORD <v>    PUT tried to store a reserved value
//! INVALID INPUT           the line was not a valid request
//! ```

use bytes::Bytes;
use std::fmt;

/// The line terminator used by the protocol
pub const NEWLINE: u8 = b'\n';

/// Reply bodies (without the trailing newline)
pub mod reply {
    pub const OK: &[u8] = b"OK";
    pub const NOT_FOUND: &[u8] = b"NOT FOUND";
    pub const RESERVED_KEYWORD: &[u8] = b"RESERVED KEYWORD";
    pub const INVALID_INPUT: &[u8] = b"INVALID INPUT";
}

/// A successfully parsed request line.
///
/// Keys and values are slices of the received line buffer, so building a
/// command never copies the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `PUT <key> <value>`
    Put { key: Bytes, value: Bytes },
    /// `GET <key>`
    Get { key: Bytes },
    /// `DELETE <key>`
    Delete { key: Bytes },
}

impl Command {
    /// The canonical verb of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Put { .. } => "PUT",
            Command::Get { .. } => "GET",
            Command::Delete { .. } => "DELETE",
        }
    }

    /// The key this command operates on.
    pub fn key(&self) -> &Bytes {
        match self {
            Command::Put { key, .. } | Command::Get { key } | Command::Delete { key } => key,
        }
    }
}

/// The outcome of executing one request, ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// PUT or DELETE succeeded
    Ok,
    /// GET found a value
    Value(Bytes),
    /// GET or DELETE on an absent key
    NotFound,
    /// PUT tried to store a reserved value; the value is echoed back
    ReservedKeyword(Bytes),
    /// The line did not match any request form
    InvalidInput,
}

impl Reply {
    /// Serializes the reply, including its trailing newline.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Ok => buf.extend_from_slice(reply::OK),
            Reply::Value(value) => buf.extend_from_slice(value),
            Reply::NotFound => buf.extend_from_slice(reply::NOT_FOUND),
            Reply::ReservedKeyword(value) => {
                buf.extend_from_slice(reply::RESERVED_KEYWORD);
                buf.push(b' ');
                buf.extend_from_slice(value);
            }
            Reply::InvalidInput => buf.extend_from_slice(reply::INVALID_INPUT),
        }
        buf.push(NEWLINE);
    }

    /// Returns true for replies that report a failed request.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Reply::NotFound | Reply::ReservedKeyword(_) | Reply::InvalidInput
        )
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.serialize();
        let body = &line[..line.len() - 1];
        f.write_str(&String::from_utf8_lossy(body))
    }
}
