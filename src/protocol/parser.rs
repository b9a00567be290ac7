//! Zero-Copy Line Parser
//!
//! This module turns one request line into a [`Command`].
//!
//! ## How the Parser Works
//!
//! The connection handler accumulates socket data in a buffer and uses
//! [`find_line_end`] to locate the next `\n`. The line before it is frozen
//! into `Bytes` and handed to [`parse_command`], which returns either:
//! - `Ok(command)` - the line is a well-formed `PUT`, `GET` or `DELETE`
//! - `Err(ParseError)` - anything else; the caller replies `INVALID INPUT`
//!
//! Tokens are split on whitespace, so a trailing `\r` from CRLF clients and
//! any leading or trailing blanks are ignored. Keys and values returned in the
//! command are slices of the input line; nothing is copied.

use crate::protocol::types::{Command, NEWLINE};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing a request line.
///
/// Every variant is reported to the client the same way; the detail is kept
/// for logging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line contained no tokens
    #[error("empty line")]
    EmptyLine,

    /// The line was not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The verb is not one of PUT, GET or DELETE
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The verb was recognized but had the wrong number of arguments
    #[error("wrong number of arguments for '{command}': expected {expected}, got {got}")]
    WrongArity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Returns the position of the first `\n` in `buf`, if any.
#[inline]
pub fn find_line_end(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == NEWLINE)
}

/// Parses one request line (without its trailing `\n`).
///
/// # Example
///
/// ```
/// use mangokv::protocol::{parse_command, Command};
/// use bytes::Bytes;
///
/// let cmd = parse_command(&Bytes::from("PUT key1 value1")).unwrap();
/// assert_eq!(
///     cmd,
///     Command::Put { key: Bytes::from("key1"), value: Bytes::from("value1") }
/// );
///
/// assert!(parse_command(&Bytes::from("GET hi here")).is_err());
/// ```
pub fn parse_command(line: &Bytes) -> ParseResult<Command> {
    let text = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

    let mut tokens = text.split_whitespace();
    let verb = tokens.next().ok_or(ParseError::EmptyLine)?;
    let args: Vec<Bytes> = tokens.map(|t| line.slice_ref(t.as_bytes())).collect();

    let wrong_arity = |command, expected| ParseError::WrongArity {
        command,
        expected,
        got: args.len(),
    };

    match (verb.to_ascii_uppercase().as_str(), args.as_slice()) {
        ("PUT", [key, value]) => Ok(Command::Put {
            key: key.clone(),
            value: value.clone(),
        }),
        ("GET", [key]) => Ok(Command::Get { key: key.clone() }),
        ("DELETE", [key]) => Ok(Command::Delete { key: key.clone() }),
        ("PUT", _) => Err(wrong_arity("PUT", 2)),
        ("GET", _) => Err(wrong_arity("GET", 1)),
        ("DELETE", _) => Err(wrong_arity("DELETE", 1)),
        _ => Err(ParseError::UnknownCommand(verb.to_string())),
    }
}
