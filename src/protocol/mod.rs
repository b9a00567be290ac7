//! Line Protocol Implementation
//!
//! This module implements the MangoKV wire protocol: newline-terminated
//! UTF-8 request lines, one reply line per request.
//!
//! ## Modules
//!
//! - `types`: the `Command` and `Reply` types and reply serialization
//! - `parser`: line framing and request parsing
//!
//! ## Example
//!
//! ```
//! use mangokv::protocol::{find_line_end, parse_command, Command, Reply};
//! use bytes::{Bytes, BytesMut};
//!
//! let mut buffer = BytesMut::from(&b"GET key1\nPUT"[..]);
//! let end = find_line_end(&buffer).unwrap();
//! let line = buffer.split_to(end + 1).freeze().slice(..end);
//!
//! let cmd = parse_command(&line).unwrap();
//! assert_eq!(cmd, Command::Get { key: Bytes::from("key1") });
//!
//! assert_eq!(Reply::NotFound.serialize(), b"NOT FOUND\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{find_line_end, parse_command, ParseError, ParseResult};
pub use types::{Command, Reply};
